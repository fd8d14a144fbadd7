//! Standalone session runner.
//!
//! ```text
//! select ──cancelled──▶ target.on_failure(Cancelled)        (no countdown)
//!   │
//!   ▼
//! start_countdown(ceil(deadline))
//!   │
//! recognize_within(deadline) ──err──▶ close, target.on_failure
//!   │
//! target.on_success ──err──▶ close, target.on_failure(Deliver)
//!   │
//! update_text(text), hold, return text
//! ```

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use super::{deliver, fail, ResultTarget, SessionError};
use crate::feedback::{countdown_seconds, PopupController};
use crate::pool::{recognize_within, Deadline};
use crate::recognize::Recognizer;
use crate::select::{RegionSelector, Selection};

pub struct SessionExecutor {
    selector: Arc<dyn RegionSelector>,
    recognizer: Arc<dyn Recognizer>,
    popup: Arc<dyn PopupController>,
    deadline: Duration,
    hold: Duration,
}

impl SessionExecutor {
    pub fn new(
        selector: Arc<dyn RegionSelector>,
        recognizer: Arc<dyn Recognizer>,
        popup: Arc<dyn PopupController>,
        deadline: Duration,
        hold: Duration,
    ) -> Self {
        Self {
            selector,
            recognizer,
            popup,
            deadline,
            hold,
        }
    }

    /// Run one session, delivering to `target`.
    ///
    /// Recognition is bounded by the deadline even if the recognizer never
    /// returns.  After a success the popup is held for the configured
    /// duration before returning, unless `cancel` fires first.
    pub async fn execute(
        &self,
        cancel: &CancellationToken,
        target: &mut dyn ResultTarget,
    ) -> Result<String, SessionError> {
        let region = match self.selector.select(cancel).await {
            Ok(Selection::Region(region)) => region,
            Ok(Selection::Cancelled) => return fail(target, SessionError::Cancelled).await,
            Err(e) => return fail(target, SessionError::Select(e)).await,
        };
        log::info!("session: recognizing {region}");

        if let Err(e) = self.popup.start_countdown(countdown_seconds(self.deadline)) {
            log::warn!("session: countdown failed: {e}");
        }

        let deadline = Deadline::after(cancel, self.deadline);
        let outcome = recognize_within(Arc::clone(&self.recognizer), region, &deadline).await;
        let text = deliver(outcome, target, self.popup.as_ref()).await?;

        if !self.hold.is_zero() {
            tokio::select! {
                _ = tokio::time::sleep(self.hold) => {}
                _ = cancel.cancelled() => {}
            }
        }
        Ok(text)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
