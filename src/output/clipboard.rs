//! Clipboard writes backed by the `arboard` crate.
//!
//! Every write opens a short-lived [`arboard::Clipboard`] handle rather than
//! keeping one around, because the handle is not `Send` on all platforms.
//! Writes are serialised through a process-wide guard.

use std::sync::Mutex;

use super::OutputError;

/// Serialises clipboard writes across every [`SystemClipboard`] instance.
static CLIPBOARD_GUARD: Mutex<()> = Mutex::new(());

// ---------------------------------------------------------------------------
// Clipboard trait
// ---------------------------------------------------------------------------

/// Destination for recognized text on the clipboard paths.
pub trait Clipboard: Send + Sync {
    fn write(&self, text: &str) -> Result<(), OutputError>;
}

// ---------------------------------------------------------------------------
// SystemClipboard
// ---------------------------------------------------------------------------

/// The OS clipboard.
#[derive(Debug, Clone, Default)]
pub struct SystemClipboard;

impl SystemClipboard {
    pub fn new() -> Self {
        Self
    }
}

impl Clipboard for SystemClipboard {
    fn write(&self, text: &str) -> Result<(), OutputError> {
        // A poisoned guard only means another writer panicked; the clipboard
        // itself is still usable.
        let _guard = CLIPBOARD_GUARD
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        let mut clipboard = arboard::Clipboard::new()
            .map_err(|e| OutputError::ClipboardAccess(e.to_string()))?;
        clipboard
            .set_text(text)
            .map_err(|e| OutputError::ClipboardSet(e.to_string()))?;

        log::debug!("clipboard: wrote {} chars", text.chars().count());
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn system_clipboard_is_object_safe() {
        let _: Box<dyn Clipboard> = Box::new(SystemClipboard::new());
    }

    /// Headless CI has no clipboard; either outcome is acceptable as long as
    /// a failure maps onto an `OutputError` instead of panicking.
    #[test]
    fn write_reports_errors_instead_of_panicking() {
        match SystemClipboard::new().write("screen-to-text test") {
            Ok(()) => {}
            Err(OutputError::ClipboardAccess(_)) | Err(OutputError::ClipboardSet(_)) => {}
            Err(other) => panic!("unexpected error variant: {other}"),
        }
    }
}
