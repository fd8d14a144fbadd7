//! Pixel capture for a region, delegated to an external screenshot tool.

use async_trait::async_trait;
use tokio::process::Command;
use tokio_util::sync::CancellationToken;

use super::RecognizeError;
use crate::select::Region;

/// Placeholder in the grab command replaced by `X,Y WxH`.
pub const GEOMETRY_PLACEHOLDER: &str = "{geometry}";

/// Produces encoded image bytes (PNG) for a region.
#[async_trait]
pub trait ScreenGrabber: Send + Sync {
    async fn grab(&self, cancel: &CancellationToken, region: &Region)
        -> Result<Vec<u8>, RecognizeError>;
}

/// Runs e.g. `grim -g {geometry} -` and reads the image from stdout.
#[derive(Debug, Clone)]
pub struct CommandGrabber {
    argv: Vec<String>,
}

impl CommandGrabber {
    pub fn new(argv: Vec<String>) -> Self {
        Self { argv }
    }

    /// The command line with `{geometry}` substituted.
    fn command_line(&self, region: &Region) -> Vec<String> {
        let geometry = region.geometry();
        self.argv
            .iter()
            .map(|arg| arg.replace(GEOMETRY_PLACEHOLDER, &geometry))
            .collect()
    }
}

#[async_trait]
impl ScreenGrabber for CommandGrabber {
    async fn grab(
        &self,
        cancel: &CancellationToken,
        region: &Region,
    ) -> Result<Vec<u8>, RecognizeError> {
        let argv = self.command_line(region);
        let (program, args) = argv
            .split_first()
            .ok_or_else(|| RecognizeError::Capture("grab_command is empty".into()))?;

        let mut command = Command::new(program);
        command.args(args).kill_on_drop(true);
        let child = command.output();
        let output = tokio::select! {
            out = child => out.map_err(|e| RecognizeError::Capture(format!("{program}: {e}")))?,
            _ = cancel.cancelled() => return Err(RecognizeError::Cancelled),
        };

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(RecognizeError::Capture(format!(
                "{program} exited with {}: {}",
                output.status,
                stderr.trim()
            )));
        }
        if output.stdout.is_empty() {
            return Err(RecognizeError::Capture(format!("{program} produced no image")));
        }

        log::debug!("grab: {} bytes for {region}", output.stdout.len());
        Ok(output.stdout)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn grabber(words: &[&str]) -> CommandGrabber {
        CommandGrabber::new(words.iter().map(|w| w.to_string()).collect())
    }

    #[test]
    fn geometry_is_substituted() {
        let g = grabber(&["grim", "-g", "{geometry}", "-"]);
        let region = Region::new(3, 4, 50, 60).unwrap();
        assert_eq!(g.command_line(&region), vec!["grim", "-g", "3,4 50x60", "-"]);
    }

    #[tokio::test]
    async fn empty_command_is_capture_error() {
        let g = grabber(&[]);
        let region = Region::new(0, 0, 1, 1).unwrap();
        let err = g.grab(&CancellationToken::new(), &region).await.unwrap_err();
        assert!(matches!(err, RecognizeError::Capture(_)));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn stdout_bytes_are_returned() {
        let g = grabber(&["sh", "-c", "printf 'PNG:%s' \"$0\"", "{geometry}"]);
        let region = Region::new(1, 2, 3, 4).unwrap();
        let bytes = g.grab(&CancellationToken::new(), &region).await.unwrap();
        assert_eq!(bytes, b"PNG:1,2 3x4");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn failing_tool_is_capture_error() {
        let g = grabber(&["sh", "-c", "echo boom >&2; exit 3"]);
        let region = Region::new(1, 2, 3, 4).unwrap();
        let err = g.grab(&CancellationToken::new(), &region).await.unwrap_err();
        assert!(err.to_string().contains("boom"));
    }
}
