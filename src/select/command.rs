//! Concrete selectors: an external picker process and a fixed region.

use async_trait::async_trait;
use tokio::process::Command;
use tokio_util::sync::CancellationToken;

use super::{parse_geometry, Region, RegionSelector, SelectError, Selection};

// ---------------------------------------------------------------------------
// CommandSelector
// ---------------------------------------------------------------------------

/// Runs an external region picker and parses its `X,Y WxH` output.
///
/// `slurp` is the reference picker: it prints the geometry and exits 0, or
/// exits non-zero with empty stdout when the user presses Escape.  The child
/// is killed if `cancel` fires first.
#[derive(Debug, Clone)]
pub struct CommandSelector {
    program: String,
    args: Vec<String>,
}

impl CommandSelector {
    /// Build from a command line split into words, e.g. `["slurp", "-d"]`.
    pub fn from_argv(argv: &[String]) -> Result<Self, SelectError> {
        let (program, args) = argv
            .split_first()
            .ok_or_else(|| SelectError::Unavailable("select_command is empty".into()))?;
        Ok(Self {
            program: program.clone(),
            args: args.to_vec(),
        })
    }
}

#[async_trait]
impl RegionSelector for CommandSelector {
    async fn select(&self, cancel: &CancellationToken) -> Result<Selection, SelectError> {
        let mut command = Command::new(&self.program);
        command.args(&self.args).kill_on_drop(true);
        let child = command.output();

        let output = tokio::select! {
            out = child => out.map_err(|e| SelectError::Launch(format!("{}: {e}", self.program)))?,
            _ = cancel.cancelled() => {
                log::debug!("select: cancelled while picker was open");
                return Ok(Selection::Cancelled);
            }
        };

        let stdout = String::from_utf8_lossy(&output.stdout);
        if !output.status.success() && stdout.trim().is_empty() {
            log::debug!("select: picker exited with {}; treating as cancel", output.status);
            return Ok(Selection::Cancelled);
        }

        let region = parse_geometry(&stdout)?;
        log::debug!("select: picked {region}");
        Ok(Selection::Region(region))
    }
}

// ---------------------------------------------------------------------------
// FixedSelector
// ---------------------------------------------------------------------------

/// Always selects the same region.  Used when `capture.region` is set.
#[derive(Debug, Clone)]
pub struct FixedSelector(pub Region);

#[async_trait]
impl RegionSelector for FixedSelector {
    async fn select(&self, cancel: &CancellationToken) -> Result<Selection, SelectError> {
        if cancel.is_cancelled() {
            return Ok(Selection::Cancelled);
        }
        Ok(Selection::Region(self.0.clone()))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn argv(words: &[&str]) -> Vec<String> {
        words.iter().map(|w| w.to_string()).collect()
    }

    #[test]
    fn empty_argv_is_unavailable() {
        assert!(matches!(
            CommandSelector::from_argv(&[]),
            Err(SelectError::Unavailable(_))
        ));
    }

    #[tokio::test]
    async fn fixed_selector_returns_its_region() {
        let region = Region::new(1, 2, 3, 4).unwrap();
        let sel = FixedSelector(region.clone());
        let out = sel.select(&CancellationToken::new()).await.unwrap();
        assert_eq!(out, Selection::Region(region));
    }

    #[tokio::test]
    async fn fixed_selector_honours_cancel() {
        let sel = FixedSelector(Region::new(1, 2, 3, 4).unwrap());
        let cancel = CancellationToken::new();
        cancel.cancel();
        assert_eq!(sel.select(&cancel).await.unwrap(), Selection::Cancelled);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn picker_output_is_parsed() {
        let sel = CommandSelector::from_argv(&argv(&["sh", "-c", "echo '5,6 70x80'"])).unwrap();
        let out = sel.select(&CancellationToken::new()).await.unwrap();
        assert_eq!(out, Selection::Region(Region::new(5, 6, 70, 80).unwrap()));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn picker_escape_is_cancel() {
        let sel = CommandSelector::from_argv(&argv(&["sh", "-c", "exit 1"])).unwrap();
        let out = sel.select(&CancellationToken::new()).await.unwrap();
        assert_eq!(out, Selection::Cancelled);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn picker_garbage_is_invalid() {
        let sel = CommandSelector::from_argv(&argv(&["sh", "-c", "echo nope"])).unwrap();
        let err = sel.select(&CancellationToken::new()).await.unwrap_err();
        assert!(matches!(err, SelectError::Invalid(_)));
    }

    #[tokio::test]
    async fn missing_picker_is_launch_error() {
        let sel = CommandSelector::from_argv(&argv(&["definitely-not-a-real-picker-xyz"])).unwrap();
        let err = sel.select(&CancellationToken::new()).await.unwrap_err();
        assert!(matches!(err, SelectError::Launch(_)));
    }
}
