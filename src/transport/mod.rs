//! Loopback transport between the resident and short-lived invocations.
//!
//! # Roles
//!
//! ```text
//!  once ──▶ DelegationClient ── probe 49500..=49550 ──▶ ResidentServer (binds 49500 only)
//!                              └─ STDOUT / CLIPBOARD ─▶   └─ Connection ─▶ coordinator
//! ```
//!
//! The server owns exactly one well-known port, which makes it the
//! single-instance lock.  The client scans the whole range so a resident
//! started with a different range start is still found.

pub mod client;
pub mod port;
pub mod protocol;
pub mod server;

pub use client::{Delegation, DelegationClient};
pub use port::{probe, PortRange};
pub use protocol::{parse_request, OutputMode, Request};
pub use server::{Connection, ResidentServer};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("port {port} is already in use; is another resident running?")]
    AddressInUse {
        port: u16,
        #[source]
        source: std::io::Error,
    },

    #[error("transport I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("timed out waiting for the request line")]
    ReadTimeout,

    #[error("line exceeds {} bytes", protocol::MAX_LINE_LEN)]
    LineTooLong,

    #[error("unknown request {0:?}")]
    UnknownRequest(String),

    #[error("unexpected status line {0:?}")]
    UnexpectedStatus(String),

    /// An `ERROR` response; displays as the peer's message verbatim.
    #[error("{0}")]
    Remote(String),

    #[error("connection closed by peer")]
    Closed,

    #[error("cancelled")]
    Cancelled,
}
