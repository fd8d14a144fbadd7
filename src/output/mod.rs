//! Result delivery primitives.
//!
//! The clipboard is the only shared destination; stdout and network peers
//! are handled by the result targets in [`crate::session`].

pub mod clipboard;

pub use clipboard::{Clipboard, SystemClipboard};

use thiserror::Error;

/// Failures while delivering recognized text.
#[derive(Debug, Clone, Error)]
pub enum OutputError {
    /// Could not open the system clipboard.
    #[error("cannot access clipboard: {0}")]
    ClipboardAccess(String),

    /// Could not write text to the system clipboard.
    #[error("cannot set clipboard text: {0}")]
    ClipboardSet(String),

    /// Writing to stdout failed (closed pipe, etc.).
    #[error("cannot write to stdout: {0}")]
    Stdout(String),

    /// The delegated peer could not be answered.
    #[error("cannot answer delegated request: {0}")]
    Peer(String),
}
