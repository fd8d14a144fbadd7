//! Interactive region selection: the first step of every capture session.
//!
//! The selection UI itself lives outside this crate.  The coordinator and
//! session executor only see the [`RegionSelector`] trait:
//!
//! * [`CommandSelector`]: shells out to an external picker such as `slurp`.
//! * [`FixedSelector`]: always yields one configured region (headless use).
//!
//! A user pressing Escape is not an error: it is reported as
//! [`Selection::Cancelled`].

pub mod command;
pub mod region;

pub use command::{CommandSelector, FixedSelector};
pub use region::{parse_geometry, Point, Region, RegionError};

use async_trait::async_trait;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

// ---------------------------------------------------------------------------
// Selection / SelectError
// ---------------------------------------------------------------------------

/// Outcome of one selection attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selection {
    /// The user picked an area.
    Region(Region),
    /// The user aborted.  Silent on the hotkey path.
    Cancelled,
}

/// Selection failures other than a user cancel.
#[derive(Debug, Error)]
pub enum SelectError {
    /// The picker could not be started.
    #[error("cannot launch region picker: {0}")]
    Launch(String),

    /// The picker printed something that is not a usable region.
    #[error("region picker returned an invalid region: {0}")]
    Invalid(#[from] RegionError),

    /// No selector is configured.
    #[error("no region selector available: {0}")]
    Unavailable(String),
}

// ---------------------------------------------------------------------------
// RegionSelector
// ---------------------------------------------------------------------------

/// Blocks (from the caller's point of view) until the user picks a region or
/// cancels.
///
/// Implementations must return promptly with [`Selection::Cancelled`] once
/// `cancel` fires.
#[async_trait]
pub trait RegionSelector: Send + Sync {
    async fn select(&self, cancel: &CancellationToken) -> Result<Selection, SelectError>;
}
