//! Coordinator state machine and the externally visible busy flag.
//!
//! [`CoordinatorState`] is owned and mutated only by the coordinator task.
//! [`BusyIndicator`] mirrors "a session is outstanding" for readers on other
//! threads (tray, diagnostics); they never write it.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

// ---------------------------------------------------------------------------
// CoordinatorState
// ---------------------------------------------------------------------------

/// Per-session phases.
///
/// ```text
/// Idle ──trigger──▶ Selecting ──region──▶ Recognizing ──result──▶ Idle
///                       └──cancel / error────────────────────────▶ Idle
/// ```
///
/// Triggers that arrive outside `Idle` are rejected without a transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CoordinatorState {
    #[default]
    Idle,
    /// The region picker is open.
    Selecting,
    /// A job is in the pool.
    Recognizing,
}

impl CoordinatorState {
    /// `true` in every state that rejects new triggers.
    ///
    /// ```
    /// use screen_to_text::coordinator::CoordinatorState;
    ///
    /// assert!(!CoordinatorState::Idle.is_busy());
    /// assert!(CoordinatorState::Selecting.is_busy());
    /// assert!(CoordinatorState::Recognizing.is_busy());
    /// ```
    pub fn is_busy(&self) -> bool {
        !matches!(self, CoordinatorState::Idle)
    }

    pub fn label(&self) -> &'static str {
        match self {
            CoordinatorState::Idle => "Idle",
            CoordinatorState::Selecting => "Selecting",
            CoordinatorState::Recognizing => "Recognizing",
        }
    }
}

// ---------------------------------------------------------------------------
// BusyIndicator
// ---------------------------------------------------------------------------

/// Cheap-to-clone, read-mostly busy flag.
#[derive(Debug, Clone, Default)]
pub struct BusyIndicator(Arc<AtomicBool>);

impl BusyIndicator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_busy(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }

    pub(crate) fn set(&self, busy: bool) {
        self.0.store(busy, Ordering::Release);
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
