//! Deadline-scoped cancellation and the best-effort deadline race.
//!
//! Recognition backends may block on a network call with no cooperative
//! cancellation point.  [`recognize_within`] therefore never waits for the
//! backend past the deadline: the call runs in its own task and reports
//! through a oneshot "completion slot"; if the deadline wins, the task is
//! abandoned and whatever it eventually produces is dropped unread.
//!
//! This bounds caller-observed latency, not the resources of the abandoned
//! call.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::oneshot;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::recognize::{RecognizeError, Recognizer};
use crate::select::Region;

// ---------------------------------------------------------------------------
// Deadline
// ---------------------------------------------------------------------------

/// A cancellation token tied to a wall-clock limit.
///
/// The token is a child of the caller's token (usually the shutdown token),
/// so it fires on shutdown as well as on expiry.
#[derive(Debug, Clone)]
pub struct Deadline {
    token: CancellationToken,
    expires_at: Instant,
    budget: Duration,
}

/// Why a [`Deadline`] ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeadlineEnd {
    Expired,
    Cancelled,
}

impl Deadline {
    /// A deadline `budget` from now, scoped under `parent`.
    pub fn after(parent: &CancellationToken, budget: Duration) -> Self {
        Self {
            token: parent.child_token(),
            expires_at: Instant::now() + budget,
            budget,
        }
    }

    /// The token handed to the recognizer.
    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }

    pub fn budget(&self) -> Duration {
        self.budget
    }

    /// Resolve when the deadline expires or the parent is cancelled.
    ///
    /// On expiry the token is cancelled, so cooperative backends observe it.
    pub async fn ended(&self) -> DeadlineEnd {
        tokio::select! {
            _ = tokio::time::sleep_until(self.expires_at) => {
                self.token.cancel();
                DeadlineEnd::Expired
            }
            _ = self.token.cancelled() => DeadlineEnd::Cancelled,
        }
    }
}

// ---------------------------------------------------------------------------
// recognize_within
// ---------------------------------------------------------------------------

/// Run `recognizer` on `region`, returning no later than the deadline.
///
/// Returns [`RecognizeError::DeadlineExceeded`] on expiry and
/// [`RecognizeError::Cancelled`] if the parent token fired first.
pub async fn recognize_within(
    recognizer: Arc<dyn Recognizer>,
    region: Region,
    deadline: &Deadline,
) -> Result<String, RecognizeError> {
    let (slot_tx, slot_rx) = oneshot::channel();
    let token = deadline.token();

    tokio::spawn(async move {
        let outcome = recognizer.recognize(token, region).await;
        if slot_tx.send(outcome).is_err() {
            log::debug!("pool: abandoned recognition finished after its deadline");
        }
    });

    tokio::select! {
        outcome = slot_rx => outcome.unwrap_or_else(|_| {
            Err(RecognizeError::Internal("recognition task ended without a result".into()))
        }),
        end = deadline.ended() => match end {
            DeadlineEnd::Expired => Err(RecognizeError::DeadlineExceeded(deadline.budget())),
            DeadlineEnd::Cancelled => Err(RecognizeError::Cancelled),
        },
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
