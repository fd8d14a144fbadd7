//! Result destinations.
//!
//! | target              | on success                               | on failure          |
//! |---------------------|------------------------------------------|---------------------|
//! | [`ClipboardTarget`] | write clipboard                          | nothing (silent)    |
//! | [`StdoutTarget`]    | print text, no trailing newline          | nothing             |
//! | [`ConnectionTarget`]| clipboard mode: write clipboard, then    | `ERROR\n<message>`  |
//! |                     | `SUCCESS\n`; stdout mode: `SUCCESS\ntext`|                     |
//!
//! Local targets leave failure reporting to the caller (the binary prints
//! it to stderr, the hotkey path stays silent).

use std::io::Write;
use std::sync::Arc;

use async_trait::async_trait;

use super::SessionError;
use crate::output::{Clipboard, OutputError};
use crate::transport::{Connection, OutputMode};

#[async_trait]
pub trait ResultTarget: Send {
    async fn on_success(&mut self, text: &str) -> Result<(), OutputError>;

    async fn on_failure(&mut self, error: &SessionError) -> Result<(), OutputError>;
}

// ---------------------------------------------------------------------------
// ClipboardTarget
// ---------------------------------------------------------------------------

pub struct ClipboardTarget {
    clipboard: Arc<dyn Clipboard>,
}

impl ClipboardTarget {
    pub fn new(clipboard: Arc<dyn Clipboard>) -> Self {
        Self { clipboard }
    }
}

#[async_trait]
impl ResultTarget for ClipboardTarget {
    async fn on_success(&mut self, text: &str) -> Result<(), OutputError> {
        self.clipboard.write(text)?;
        log::info!("session: copied {} char(s) to the clipboard", text.chars().count());
        Ok(())
    }

    async fn on_failure(&mut self, _error: &SessionError) -> Result<(), OutputError> {
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// StdoutTarget
// ---------------------------------------------------------------------------

/// Prints the text as-is.  Generic over the writer for tests.
pub struct StdoutTarget<W = std::io::Stdout> {
    out: W,
}

impl StdoutTarget {
    pub fn new() -> Self {
        Self {
            out: std::io::stdout(),
        }
    }
}

impl Default for StdoutTarget {
    fn default() -> Self {
        Self::new()
    }
}

impl<W: Write + Send> StdoutTarget<W> {
    pub fn with_writer(out: W) -> Self {
        Self { out }
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

#[async_trait]
impl<W: Write + Send> ResultTarget for StdoutTarget<W> {
    async fn on_success(&mut self, text: &str) -> Result<(), OutputError> {
        self.out
            .write_all(text.as_bytes())
            .and_then(|()| self.out.flush())
            .map_err(|e| OutputError::Stdout(e.to_string()))
    }

    async fn on_failure(&mut self, _error: &SessionError) -> Result<(), OutputError> {
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// ConnectionTarget
// ---------------------------------------------------------------------------

/// Answers a delegated request.  The connection is consumed by the first
/// response; later calls are no-ops.
pub struct ConnectionTarget {
    conn: Option<Connection>,
    clipboard: Arc<dyn Clipboard>,
}

impl ConnectionTarget {
    pub fn new(conn: Connection, clipboard: Arc<dyn Clipboard>) -> Self {
        Self {
            conn: Some(conn),
            clipboard,
        }
    }
}

#[async_trait]
impl ResultTarget for ConnectionTarget {
    async fn on_success(&mut self, text: &str) -> Result<(), OutputError> {
        let Some(mode) = self.conn.as_ref().map(Connection::mode) else {
            return Ok(());
        };

        // A clipboard failure leaves the connection in place for on_failure.
        let payload = match mode {
            OutputMode::Stdout => text,
            OutputMode::Clipboard => {
                self.clipboard.write(text)?;
                ""
            }
        };

        if let Some(conn) = self.conn.take() {
            conn.respond_success(payload)
                .await
                .map_err(|e| OutputError::Peer(e.to_string()))?;
        }
        Ok(())
    }

    async fn on_failure(&mut self, error: &SessionError) -> Result<(), OutputError> {
        match self.conn.take() {
            Some(conn) => conn
                .respond_error(&error.to_string())
                .await
                .map_err(|e| OutputError::Peer(e.to_string())),
            None => Ok(()),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
