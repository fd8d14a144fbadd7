//! Resident side of the transport.

use std::io::ErrorKind;
use std::net::SocketAddr;
use std::time::Duration;

use tokio::io::{AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use super::port::{loopback, PortRange};
use super::protocol::{self, frame, parse_request, read_line, OutputMode, Request};
use super::TransportError;

/// Depth of the handoff between handshake tasks and [`ResidentServer::next`].
const HANDOFF_DEPTH: usize = 4;

/// Pause after a failed `accept` (e.g. descriptor exhaustion).
const ACCEPT_BACKOFF: Duration = Duration::from_millis(100);

// ---------------------------------------------------------------------------
// ResidentServer
// ---------------------------------------------------------------------------

/// Owner of the resident port.
///
/// The accept loop and the per-connection handshakes run as background
/// tasks; liveness probes are answered there and never reach the owner.
/// Dropping the server stops the accept loop and releases the port;
/// [`shutdown`](Self::shutdown) also answers requests nobody took.
pub struct ResidentServer {
    port: u16,
    incoming: mpsc::Receiver<Connection>,
    stop: CancellationToken,
}

impl ResidentServer {
    /// Bind the first port of `range` and start accepting.
    ///
    /// Never falls back to another port: if the start port is taken this
    /// fails with [`TransportError::AddressInUse`].
    pub async fn start(
        range: &PortRange,
        read_timeout: Duration,
        cancel: &CancellationToken,
    ) -> Result<Self, TransportError> {
        let port = range.start();
        let listener = TcpListener::bind(loopback(port))
            .await
            .map_err(|source| match source.kind() {
                ErrorKind::AddrInUse => TransportError::AddressInUse { port, source },
                _ => TransportError::Io(source),
            })?;
        let port = listener.local_addr()?.port();

        let stop = cancel.child_token();
        let (tx, incoming) = mpsc::channel(HANDOFF_DEPTH);
        tokio::spawn(accept_loop(listener, tx, read_timeout, stop.clone()));

        log::info!("transport: resident listening on 127.0.0.1:{port}");
        Ok(Self {
            port,
            incoming,
            stop,
        })
    }

    /// The bound port.
    pub fn port(&self) -> u16 {
        self.port
    }

    /// Wait for the next capture request.
    ///
    /// [`TransportError::Closed`] once the accept loop has stopped and every
    /// pending handshake has finished.
    pub async fn next(&mut self, cancel: &CancellationToken) -> Result<Connection, TransportError> {
        tokio::select! {
            conn = self.incoming.recv() => conn.ok_or(TransportError::Closed),
            _ = cancel.cancelled() => Err(TransportError::Cancelled),
        }
    }
}

impl ResidentServer {
    /// Stop accepting and answer every request that was accepted but never
    /// taken with `ERROR\nresident shutting down`.
    ///
    /// Handshakes still in flight find the handoff closed and answer their
    /// own connection the same way.
    pub async fn shutdown(mut self) {
        self.stop.cancel();
        self.incoming.close();
        let mut refused = 0usize;
        while let Some(conn) = self.incoming.recv().await {
            refuse(conn).await;
            refused += 1;
        }
        log::debug!("transport: server stopped, {refused} queued request(s) refused");
    }
}

impl Drop for ResidentServer {
    fn drop(&mut self) {
        self.stop.cancel();
    }
}

async fn accept_loop(
    listener: TcpListener,
    handoff: mpsc::Sender<Connection>,
    read_timeout: Duration,
    stop: CancellationToken,
) {
    loop {
        let accepted = tokio::select! {
            _ = stop.cancelled() => break,
            accepted = listener.accept() => accepted,
        };

        match accepted {
            Ok((stream, peer)) => {
                tokio::spawn(handshake(stream, peer, handoff.clone(), read_timeout));
            }
            Err(e) => {
                log::warn!("transport: accept failed: {e}");
                tokio::time::sleep(ACCEPT_BACKOFF).await;
            }
        }
    }
    log::debug!("transport: accept loop stopped");
}

async fn handshake(
    stream: TcpStream,
    peer: SocketAddr,
    handoff: mpsc::Sender<Connection>,
    read_timeout: Duration,
) {
    let mut reader = BufReader::new(stream);

    let line = match tokio::time::timeout(read_timeout, read_line(&mut reader)).await {
        Ok(Ok(line)) => line,
        Ok(Err(e)) => {
            log::debug!("transport: {peer}: dropped before request: {e}");
            return;
        }
        Err(_) => {
            log::debug!("transport: {peer}: {}", TransportError::ReadTimeout);
            return;
        }
    };

    match parse_request(&line) {
        Ok(Request::Ping) => {
            let mut stream = reader.into_inner();
            let reply = format!("{}\n", protocol::PONG);
            if let Err(e) = write_and_close(&mut stream, reply.as_bytes()).await {
                log::debug!("transport: {peer}: pong failed: {e}");
            }
        }
        Ok(Request::Capture(mode)) => {
            log::debug!("transport: {peer}: {} request", mode.keyword());
            let conn = Connection {
                stream: reader.into_inner(),
                mode,
                peer,
            };
            if let Err(mpsc::error::SendError(conn)) = handoff.send(conn).await {
                log::debug!("transport: {peer}: resident stopped before the request was taken");
                refuse(conn).await;
            }
        }
        Err(e) => {
            log::warn!("transport: {peer}: {e}");
            let mut stream = reader.into_inner();
            let reply = frame(protocol::ERROR, "unknown request");
            let _ = write_and_close(&mut stream, &reply).await;
        }
    }
}

/// Answer a request that arrived too late to be served.
async fn refuse(conn: Connection) {
    let peer = conn.peer;
    if let Err(e) = conn.respond_error(protocol::SHUTTING_DOWN).await {
        log::debug!("transport: {peer}: shutdown reply failed: {e}");
    }
}

async fn write_and_close(stream: &mut TcpStream, bytes: &[u8]) -> std::io::Result<()> {
    stream.write_all(bytes).await?;
    stream.flush().await?;
    stream.shutdown().await
}

// ---------------------------------------------------------------------------
// Connection
// ---------------------------------------------------------------------------

/// One accepted capture request.
///
/// Both response methods consume the connection, write the status line and
/// payload, then close the socket, so exactly one response is ever sent.
/// A connection dropped without a response is closed with no bytes written.
#[derive(Debug)]
pub struct Connection {
    stream: TcpStream,
    mode: OutputMode,
    peer: SocketAddr,
}

impl Connection {
    pub fn mode(&self) -> OutputMode {
        self.mode
    }

    pub fn peer(&self) -> SocketAddr {
        self.peer
    }

    /// `SUCCESS\n` followed by `text` (possibly empty).
    pub async fn respond_success(self, text: &str) -> Result<(), TransportError> {
        self.respond(protocol::SUCCESS, text).await
    }

    /// `ERROR\n` followed by `message`.
    pub async fn respond_error(self, message: &str) -> Result<(), TransportError> {
        self.respond(protocol::ERROR, message).await
    }

    async fn respond(mut self, status: &str, payload: &str) -> Result<(), TransportError> {
        log::debug!("transport: {}: responding {status}", self.peer);
        write_and_close(&mut self.stream, &frame(status, payload)).await?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
