//! Line protocol spoken over the loopback socket.
//!
//! ```text
//! client → server   PING\n                 liveness probe
//! server → client   PONG\n
//! client → server   STDOUT\n | CLIPBOARD\n request, one per connection
//! server → client   SUCCESS\n<text>        text may be empty, no terminator
//! server → client   ERROR\n<message>
//! ```
//!
//! The server closes the socket after its single response, so the client
//! reads the payload to EOF.

use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt};

use super::TransportError;

pub const PING: &str = "PING";
pub const PONG: &str = "PONG";
pub const STDOUT: &str = "STDOUT";
pub const CLIPBOARD: &str = "CLIPBOARD";
pub const SUCCESS: &str = "SUCCESS";
pub const ERROR: &str = "ERROR";

/// `ERROR` payload for requests the resident will never serve because it
/// is stopping.
pub const SHUTTING_DOWN: &str = "resident shutting down";

/// Longest request or status line accepted, excluding the newline.
pub const MAX_LINE_LEN: usize = 64;

// ---------------------------------------------------------------------------
// OutputMode / Request
// ---------------------------------------------------------------------------

/// Where a delegated request wants its text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    /// Send the text back to the peer, which prints it.
    Stdout,
    /// The resident writes the clipboard; the peer gets an empty success.
    Clipboard,
}

impl OutputMode {
    pub fn from_stdout_flag(want_stdout: bool) -> Self {
        if want_stdout {
            OutputMode::Stdout
        } else {
            OutputMode::Clipboard
        }
    }

    /// The request keyword, without newline.
    pub fn keyword(self) -> &'static str {
        match self {
            OutputMode::Stdout => STDOUT,
            OutputMode::Clipboard => CLIPBOARD,
        }
    }
}

/// A parsed first line from a client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Request {
    Ping,
    Capture(OutputMode),
}

/// Parse a request line (already stripped of its newline).
///
/// ```
/// use screen_to_text::transport::{parse_request, OutputMode, Request};
///
/// assert_eq!(parse_request("PING").unwrap(), Request::Ping);
/// assert_eq!(parse_request("STDOUT").unwrap(), Request::Capture(OutputMode::Stdout));
/// assert!(parse_request("HELLO").is_err());
/// ```
pub fn parse_request(line: &str) -> Result<Request, TransportError> {
    match line.trim() {
        PING => Ok(Request::Ping),
        STDOUT => Ok(Request::Capture(OutputMode::Stdout)),
        CLIPBOARD => Ok(Request::Capture(OutputMode::Clipboard)),
        other => Err(TransportError::UnknownRequest(other.to_string())),
    }
}

// ---------------------------------------------------------------------------
// Line I/O
// ---------------------------------------------------------------------------

/// Read one `\n`-terminated line of at most [`MAX_LINE_LEN`] bytes.
///
/// The newline (and a preceding `\r`) is stripped.  EOF before any byte is
/// [`TransportError::Closed`]; a final unterminated line is accepted.
pub async fn read_line<R>(reader: &mut R) -> Result<String, TransportError>
where
    R: AsyncBufRead + Unpin,
{
    let mut buf = String::new();
    let limit = (MAX_LINE_LEN + 2) as u64;
    let n = (&mut *reader).take(limit).read_line(&mut buf).await?;

    if n == 0 {
        return Err(TransportError::Closed);
    }
    if !buf.ends_with('\n') && n as u64 >= limit {
        return Err(TransportError::LineTooLong);
    }

    let line = buf.trim_end_matches('\n').trim_end_matches('\r');
    if line.len() > MAX_LINE_LEN {
        return Err(TransportError::LineTooLong);
    }
    Ok(line.to_string())
}

/// Serialise a status line plus payload into one buffer.
pub fn frame(status: &str, payload: &str) -> Vec<u8> {
    let mut out = Vec::with_capacity(status.len() + 1 + payload.len());
    out.extend_from_slice(status.as_bytes());
    out.push(b'\n');
    out.extend_from_slice(payload.as_bytes());
    out
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
