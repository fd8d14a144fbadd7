//! Text recognition for a selected region.
//!
//! * [`Recognizer`]: async trait implemented by every backend.
//! * [`ApiRecognizer`]: OpenAI-compatible vision endpoint (`reqwest`).
//! * [`ScreenGrabber`] / [`CommandGrabber`]: where the region's pixels
//!   come from; capture is delegated to an external tool.
//! * [`RecognizeError`]: error variants, including the deadline outcome
//!   produced by [`crate::pool`].

pub mod api;
pub mod grab;

pub use api::ApiRecognizer;
pub use grab::{CommandGrabber, ScreenGrabber};

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

use crate::select::Region;

// ---------------------------------------------------------------------------
// RecognizeError
// ---------------------------------------------------------------------------

/// Everything that can go wrong between "region chosen" and "text ready".
#[derive(Debug, Clone, Error)]
pub enum RecognizeError {
    /// The deadline fired before the backend answered.  Expected and common;
    /// never surfaced as an alarming error.
    #[error("recognition timed out after {}s", .0.as_secs_f32())]
    DeadlineExceeded(Duration),

    /// The session was cancelled (shutdown) before the backend answered.
    #[error("recognition cancelled")]
    Cancelled,

    /// The region's pixels could not be captured.
    #[error("screen capture failed: {0}")]
    Capture(String),

    /// HTTP transport or connection error.
    #[error("recognition request failed: {0}")]
    Request(String),

    /// The HTTP client's own timeout fired.
    #[error("recognition request timed out")]
    Timeout,

    /// The response body was not the expected JSON.
    #[error("failed to parse recognition response: {0}")]
    Parse(String),

    /// The backend answered but found no text.
    #[error("no text detected")]
    EmptyResponse,

    /// The worker running the call went away without reporting.
    #[error("recognition worker stopped: {0}")]
    Internal(String),
}

impl RecognizeError {
    /// `true` for the outcomes that are routine rather than failures.
    pub fn is_expected(&self) -> bool {
        matches!(
            self,
            RecognizeError::DeadlineExceeded(_) | RecognizeError::Cancelled
        )
    }
}

impl From<reqwest::Error> for RecognizeError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            RecognizeError::Timeout
        } else {
            RecognizeError::Request(e.to_string())
        }
    }
}

// ---------------------------------------------------------------------------
// Recognizer trait
// ---------------------------------------------------------------------------

/// Turns a region into text.
///
/// `cancel` is the deadline-scoped token: it fires when the deadline passes
/// or the process shuts down.  Backends should stop early when it fires, but
/// callers never rely on that; [`crate::pool::recognize_within`] enforces
/// the deadline regardless.
#[async_trait]
pub trait Recognizer: Send + Sync {
    async fn recognize(
        &self,
        cancel: CancellationToken,
        region: Region,
    ) -> Result<String, RecognizeError>;
}

// Compile-time assertion: Box<dyn Recognizer> must be constructible.
const _: fn() = || {
    fn _assert_object_safe(_: Box<dyn Recognizer>) {}
};

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
