//! Delegation client used by `once` invocations.

use std::net::SocketAddr;
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio_util::sync::CancellationToken;

use super::port::{loopback, probe, PortRange};
use super::protocol::{self, read_line, OutputMode};
use super::TransportError;
use crate::config::TransportConfig;

/// Result of [`DelegationClient::try_run_once`].
#[derive(Debug)]
pub enum Delegation {
    /// Nothing in the range answered the probe; run standalone.
    NoResident,
    /// The caller cancelled before any resident was found.  Nothing was
    /// delegated, but the caller should not start a session either.
    Cancelled,
    /// The resident succeeded.  Empty in clipboard mode.
    Delivered(String),
    /// A resident was found but the request failed, either with an `ERROR`
    /// response ([`TransportError::Remote`]) or mid-exchange.  The caller
    /// must not fall back to standalone.
    Failed(TransportError),
}

impl Delegation {
    /// `true` once a resident was found and handed the request.
    pub fn is_delegated(&self) -> bool {
        matches!(self, Delegation::Delivered(_) | Delegation::Failed(_))
    }
}

pub struct DelegationClient {
    range: PortRange,
    probe_timeout: Duration,
}

impl DelegationClient {
    pub fn new(range: PortRange, probe_timeout: Duration) -> Self {
        Self {
            range,
            probe_timeout,
        }
    }

    pub fn from_config(config: &TransportConfig) -> Self {
        Self::new(PortRange::from_config(config), config.probe_timeout())
    }

    /// First port in the range, ascending, whose listener answers `PONG`.
    pub async fn find_resident(
        &self,
        cancel: &CancellationToken,
    ) -> Result<Option<SocketAddr>, TransportError> {
        for port in self.range.ports() {
            let addr = loopback(port);
            let alive = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(TransportError::Cancelled),
                alive = probe(addr, self.probe_timeout) => alive,
            };
            if alive {
                log::debug!("transport: resident found on port {port}");
                return Ok(Some(addr));
            }
        }
        Ok(None)
    }

    /// Hand one capture request to a running resident, if any.
    pub async fn try_run_once(&self, cancel: &CancellationToken, want_stdout: bool) -> Delegation {
        let addr = match self.find_resident(cancel).await {
            Ok(Some(addr)) => addr,
            Ok(None) => {
                log::debug!(
                    "transport: no resident on ports {}..={}",
                    self.range.start(),
                    self.range.end()
                );
                return Delegation::NoResident;
            }
            Err(TransportError::Cancelled) => return Delegation::Cancelled,
            Err(e) => return Delegation::Failed(e),
        };

        let mode = OutputMode::from_stdout_flag(want_stdout);
        match self.exchange(addr, mode, cancel).await {
            Ok(text) => Delegation::Delivered(text),
            Err(e) => {
                log::debug!("transport: delegated request failed: {e}");
                Delegation::Failed(e)
            }
        }
    }

    async fn exchange(
        &self,
        addr: SocketAddr,
        mode: OutputMode,
        cancel: &CancellationToken,
    ) -> Result<String, TransportError> {
        let stream = tokio::time::timeout(self.probe_timeout, TcpStream::connect(addr))
            .await
            .map_err(|_| {
                TransportError::Io(std::io::Error::new(
                    std::io::ErrorKind::TimedOut,
                    format!("connect to {addr} timed out"),
                ))
            })??;

        let mut reader = BufReader::new(stream);
        let request = format!("{}\n", mode.keyword());
        reader.get_mut().write_all(request.as_bytes()).await?;

        // The resident answers only after its session ends, so no timeout
        // here; the caller's token is the only way out.
        tokio::select! {
            _ = cancel.cancelled() => Err(TransportError::Cancelled),
            outcome = read_response(&mut reader) => outcome,
        }
    }
}

async fn read_response(reader: &mut BufReader<TcpStream>) -> Result<String, TransportError> {
    let status = read_line(reader).await?;

    let mut raw = Vec::new();
    reader.read_to_end(&mut raw).await?;
    let payload = String::from_utf8_lossy(&raw).into_owned();

    match status.as_str() {
        protocol::SUCCESS => Ok(payload),
        protocol::ERROR => Err(TransportError::Remote(payload)),
        _ => Err(TransportError::UnexpectedStatus(status)),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
