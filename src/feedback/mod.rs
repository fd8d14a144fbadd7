//! User-visible feedback: the countdown popup and the tray icon.
//!
//! Both are external UI collaborators; the core drives them through
//! [`PopupController`] and [`TrayStatus`].  The log-backed implementations
//! ([`LogPopup`], [`LogTray`]) are what the binary uses when no desktop
//! integration is wired in.

use std::time::Duration;

use thiserror::Error;

/// Tray tooltip while idle.
pub const TOOLTIP_IDLE: &str = "screen-to-text: ready";
/// Tray tooltip while a session is running.
pub const TOOLTIP_BUSY: &str = "screen-to-text: recognizing…";
/// Notice shown when a trigger arrives during a session.
pub const BUSY_NOTICE: &str = "A capture is already in progress";

// ---------------------------------------------------------------------------
// FeedbackError
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Error)]
pub enum FeedbackError {
    /// The popup or tray backend refused the update.
    #[error("feedback backend unavailable: {0}")]
    Unavailable(String),
}

// ---------------------------------------------------------------------------
// Traits
// ---------------------------------------------------------------------------

/// The countdown / result popup.
///
/// Calls arrive from the coordinator task or a session executor; the
/// implementation owns its own window and timers.
pub trait PopupController: Send + Sync {
    /// Show the popup with a countdown of `seconds`.
    fn start_countdown(&self, seconds: u32) -> Result<(), FeedbackError>;
    /// Replace the countdown with the recognized text.
    fn update_text(&self, text: &str) -> Result<(), FeedbackError>;
    /// Dismiss the popup.
    fn close(&self) -> Result<(), FeedbackError>;
}

/// The system-tray icon.
pub trait TrayStatus: Send + Sync {
    fn set_tooltip(&self, text: &str);
    /// Show a short, transient notice (balloon / toast).
    fn notify(&self, message: &str);
}

/// Countdown length for a deadline: whole seconds, rounded up, at least one.
///
/// ```
/// use std::time::Duration;
/// use screen_to_text::feedback::countdown_seconds;
///
/// assert_eq!(countdown_seconds(Duration::from_secs(20)), 20);
/// assert_eq!(countdown_seconds(Duration::from_millis(1_200)), 2);
/// assert_eq!(countdown_seconds(Duration::ZERO), 1);
/// ```
pub fn countdown_seconds(deadline: Duration) -> u32 {
    let secs = deadline.as_secs() + u64::from(deadline.subsec_nanos() > 0);
    u32::try_from(secs).unwrap_or(u32::MAX).max(1)
}

// ---------------------------------------------------------------------------
// Log-backed implementations
// ---------------------------------------------------------------------------

/// Popup that only writes log lines.
#[derive(Debug, Clone, Default)]
pub struct LogPopup;

impl PopupController for LogPopup {
    fn start_countdown(&self, seconds: u32) -> Result<(), FeedbackError> {
        log::info!("popup: recognizing ({seconds}s)");
        Ok(())
    }

    fn update_text(&self, text: &str) -> Result<(), FeedbackError> {
        log::info!("popup: {} chars recognized", text.chars().count());
        Ok(())
    }

    fn close(&self) -> Result<(), FeedbackError> {
        log::debug!("popup: closed");
        Ok(())
    }
}

/// Tray that only writes log lines.
#[derive(Debug, Clone, Default)]
pub struct LogTray;

impl TrayStatus for LogTray {
    fn set_tooltip(&self, text: &str) {
        log::debug!("tray: {text}");
    }

    fn notify(&self, message: &str) {
        log::info!("tray notice: {message}");
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn countdown_rounds_up() {
        assert_eq!(countdown_seconds(Duration::from_millis(1)), 1);
        assert_eq!(countdown_seconds(Duration::from_millis(999)), 1);
        assert_eq!(countdown_seconds(Duration::from_millis(1_000)), 1);
        assert_eq!(countdown_seconds(Duration::from_millis(1_001)), 2);
        assert_eq!(countdown_seconds(Duration::from_secs(20)), 20);
    }

    #[test]
    fn countdown_never_zero() {
        assert_eq!(countdown_seconds(Duration::ZERO), 1);
    }

    #[test]
    fn log_backends_never_fail() {
        let popup = LogPopup;
        assert!(popup.start_countdown(3).is_ok());
        assert!(popup.update_text("hello").is_ok());
        assert!(popup.close().is_ok());

        let tray = LogTray;
        tray.set_tooltip(TOOLTIP_BUSY);
        tray.notify(BUSY_NOTICE);
    }

    #[test]
    fn traits_are_object_safe() {
        let _: Box<dyn PopupController> = Box::new(LogPopup);
        let _: Box<dyn TrayStatus> = Box::new(LogTray);
    }
}
