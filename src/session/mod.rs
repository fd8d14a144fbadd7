//! One capture session: select, recognize, deliver.
//!
//! [`SessionExecutor`] runs the whole sequence for standalone invocations.
//! The resident coordinator splits the same sequence around the worker pool
//! but finishes every session through [`deliver`], so popup and target
//! ordering is defined here once.

pub mod executor;
pub mod target;

pub use executor::SessionExecutor;
pub use target::{ClipboardTarget, ConnectionTarget, ResultTarget, StdoutTarget};

use thiserror::Error;

use crate::feedback::PopupController;
use crate::output::OutputError;
use crate::recognize::RecognizeError;
use crate::select::SelectError;

#[derive(Debug, Error)]
pub enum SessionError {
    /// The user dismissed the region picker.
    #[error("selection cancelled")]
    Cancelled,

    #[error(transparent)]
    Select(#[from] SelectError),

    #[error(transparent)]
    Recognize(#[from] RecognizeError),

    /// Text was recognized but could not be delivered.
    #[error("recognized text was not delivered: {0}")]
    Deliver(#[from] OutputError),
}

impl SessionError {
    /// Cancellations and timeouts happen in normal use and are not logged
    /// as failures.
    pub fn is_expected(&self) -> bool {
        match self {
            SessionError::Cancelled => true,
            SessionError::Recognize(e) => e.is_expected(),
            _ => false,
        }
    }
}

/// Finish a session whose recognition step produced `outcome`.
///
/// On success the target gets the text first; only if that works does the
/// popup switch to the text.  Any failure closes the popup and is reported
/// to the target, then returned.
pub async fn deliver(
    outcome: Result<String, RecognizeError>,
    target: &mut dyn ResultTarget,
    popup: &dyn PopupController,
) -> Result<String, SessionError> {
    let error = match outcome {
        Ok(text) => match target.on_success(&text).await {
            Ok(()) => {
                if let Err(e) = popup.update_text(&text) {
                    log::warn!("session: popup update failed: {e}");
                }
                return Ok(text);
            }
            Err(e) => SessionError::Deliver(e),
        },
        Err(e) => SessionError::Recognize(e),
    };

    close_popup(popup);
    fail(target, error).await
}

/// Report `error` to the target and hand it back.
pub(crate) async fn fail(
    target: &mut dyn ResultTarget,
    error: SessionError,
) -> Result<String, SessionError> {
    if error.is_expected() {
        log::debug!("session: {error}");
    } else {
        log::warn!("session: {error}");
    }
    if let Err(e) = target.on_failure(&error).await {
        log::warn!("session: could not report failure: {e}");
    }
    Err(error)
}

pub(crate) fn close_popup(popup: &dyn PopupController) {
    if let Err(e) = popup.close() {
        log::warn!("session: popup close failed: {e}");
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
