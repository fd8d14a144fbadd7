//! Port range arithmetic and the liveness probe.

use std::net::{Ipv4Addr, SocketAddr};
use std::ops::RangeInclusive;
use std::time::Duration;

use tokio::io::{AsyncWriteExt, BufReader};
use tokio::net::TcpStream;

use super::protocol::{read_line, PING, PONG};
use crate::config::TransportConfig;

pub const DEFAULT_PORT_START: u16 = 49_500;
pub const DEFAULT_PORT_END: u16 = 49_550;
pub const MIN_PORT: u16 = 1_024;
pub const MAX_PORT: u16 = u16::MAX;

// ---------------------------------------------------------------------------
// PortRange
// ---------------------------------------------------------------------------

/// Inclusive loopback port interval.
///
/// The resident binds only [`start`](Self::start); clients probe every port
/// from `start` to `end` in ascending order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PortRange {
    start: u16,
    end: u16,
}

impl Default for PortRange {
    fn default() -> Self {
        Self {
            start: DEFAULT_PORT_START,
            end: DEFAULT_PORT_END,
        }
    }
}

impl PortRange {
    /// Clamp both ends into `[1024, 65535]`; an end below the start is
    /// raised to the start.
    ///
    /// ```
    /// use screen_to_text::transport::PortRange;
    ///
    /// let r = PortRange::clamped(80, 70_000);
    /// assert_eq!((r.start(), r.end()), (1024, 65535));
    ///
    /// let r = PortRange::clamped(50_000, 40_000);
    /// assert_eq!((r.start(), r.end()), (50_000, 50_000));
    /// ```
    pub fn clamped(start: i64, end: i64) -> Self {
        let clamp = |p: i64| p.clamp(i64::from(MIN_PORT), i64::from(MAX_PORT)) as u16;
        let start = clamp(start);
        let end = clamp(end).max(start);
        Self { start, end }
    }

    pub fn from_config(config: &TransportConfig) -> Self {
        Self::clamped(config.port_start, config.port_end)
    }

    pub fn start(&self) -> u16 {
        self.start
    }

    pub fn end(&self) -> u16 {
        self.end
    }

    pub fn len(&self) -> usize {
        usize::from(self.end - self.start) + 1
    }

    /// Never true; a range always holds at least its start port.
    pub fn is_empty(&self) -> bool {
        false
    }

    pub fn ports(&self) -> RangeInclusive<u16> {
        self.start..=self.end
    }

    /// Loopback address of the start port, the resident's only address.
    pub fn resident_addr(&self) -> SocketAddr {
        loopback(self.start)
    }
}

pub fn loopback(port: u16) -> SocketAddr {
    SocketAddr::from((Ipv4Addr::LOCALHOST, port))
}

// ---------------------------------------------------------------------------
// probe
// ---------------------------------------------------------------------------

/// `true` iff something at `addr` answers `PING` with `PONG` within
/// `timeout` (connect, write and read together).
pub async fn probe(addr: SocketAddr, timeout: Duration) -> bool {
    match tokio::time::timeout(timeout, probe_inner(addr)).await {
        Ok(Ok(alive)) => alive,
        Ok(Err(e)) => {
            log::trace!("transport: probe {addr} failed: {e}");
            false
        }
        Err(_) => {
            log::trace!("transport: probe {addr} timed out");
            false
        }
    }
}

async fn probe_inner(addr: SocketAddr) -> Result<bool, super::TransportError> {
    let mut stream = TcpStream::connect(addr).await?;
    stream.write_all(format!("{PING}\n").as_bytes()).await?;

    let mut reader = BufReader::new(stream);
    let line = read_line(&mut reader).await?;
    Ok(line == PONG)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
