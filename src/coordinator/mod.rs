//! The resident's event coordinator.
//!
//! # Architecture
//!
//! ```text
//!  shutdown token ───────────┐
//!  HotkeyListener ──mpsc────┐│
//!  accept task ──mpsc(4)───┐││
//!  pool callback ─mpsc(1)─┐│││
//!                         ▼▼▼▼
//!               Coordinator::run  (one task, one event at a time)
//!                  │ select region (awaited in place)
//!                  │ WorkerPool::submit
//!                  └ route result ▶ clipboard / peer / popup
//! ```
//!
//! All session state lives in the coordinator task.  A trigger is handled
//! to completion (including the region picker) before the next event is
//! looked at, so at most one job is ever outstanding.  Once the loop
//! stops, every peer still queued is answered with [`SHUTDOWN_MESSAGE`].

mod handlers;
pub mod state;

pub use handlers::{SessionResult, SHUTDOWN_MESSAGE};
pub use state::{BusyIndicator, CoordinatorState};

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use handlers::CoordinatorCore;
use crate::config::AppConfig;
use crate::feedback::{PopupController, TrayStatus, TOOLTIP_IDLE};
use crate::hotkey::HotkeyEvent;
use crate::output::Clipboard;
use crate::recognize::Recognizer;
use crate::select::RegionSelector;
use crate::transport::{Connection, PortRange, ResidentServer, TransportError};

/// Depth of the accepted-connection mailbox.
const CONNECTION_MAILBOX: usize = 4;

/// Depth of the result mailbox.  One session is outstanding at most.
const RESULT_MAILBOX: usize = 1;

#[derive(Debug, Error)]
pub enum CoordinatorError {
    #[error(transparent)]
    Transport(#[from] TransportError),
}

// ---------------------------------------------------------------------------
// Settings / collaborators
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct CoordinatorSettings {
    pub ports: PortRange,
    pub read_timeout: Duration,
    pub deadline: Duration,
    pub workers: usize,
}

impl Default for CoordinatorSettings {
    fn default() -> Self {
        Self::from_config(&AppConfig::default())
    }
}

impl CoordinatorSettings {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            ports: PortRange::from_config(&config.transport),
            read_timeout: config.transport.read_timeout(),
            deadline: config.recognition.deadline(),
            workers: config.recognition.worker_count(),
        }
    }
}

/// The outside world as the coordinator sees it.
pub struct Collaborators {
    pub selector: Arc<dyn RegionSelector>,
    pub recognizer: Arc<dyn Recognizer>,
    pub clipboard: Arc<dyn Clipboard>,
    pub popup: Arc<dyn PopupController>,
    pub tray: Arc<dyn TrayStatus>,
}

// ---------------------------------------------------------------------------
// Coordinator
// ---------------------------------------------------------------------------

pub struct Coordinator {
    core: CoordinatorCore,
    results: mpsc::Receiver<SessionResult>,
    settings: CoordinatorSettings,
}

impl Coordinator {
    /// Build the coordinator and its worker pool.  Must be called inside a
    /// tokio runtime.
    pub fn new(settings: CoordinatorSettings, collaborators: Collaborators) -> Self {
        let (tx, results) = mpsc::channel(RESULT_MAILBOX);
        let core = CoordinatorCore::new(&settings, collaborators, tx);
        Self {
            core,
            results,
            settings,
        }
    }

    /// Read-only busy flag for other threads.
    pub fn status(&self) -> BusyIndicator {
        self.core.busy()
    }

    /// Serve until `shutdown` fires or the accept loop ends.
    ///
    /// Fails only if the resident port cannot be bound.
    pub async fn run(
        self,
        shutdown: CancellationToken,
        mut hotkeys: mpsc::Receiver<HotkeyEvent>,
    ) -> Result<(), CoordinatorError> {
        let Coordinator {
            mut core,
            mut results,
            settings,
        } = self;

        let server =
            ResidentServer::start(&settings.ports, settings.read_timeout, &shutdown).await?;
        let (conn_tx, mut connections) = mpsc::channel(CONNECTION_MAILBOX);
        let accept = tokio::spawn(forward_connections(server, conn_tx, shutdown.clone()));

        core.tray().set_tooltip(TOOLTIP_IDLE);
        log::info!("coordinator: ready");

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    log::info!("coordinator: shutdown requested");
                    break;
                }
                Some(HotkeyEvent::Capture) = hotkeys.recv() => {
                    core.handle_hotkey(&shutdown).await;
                }
                conn = connections.recv() => match conn {
                    Some(conn) => core.handle_connection(conn, &shutdown).await,
                    None => {
                        log::warn!("coordinator: accept loop ended");
                        break;
                    }
                },
                Some(result) = results.recv() => {
                    core.handle_result(result).await;
                }
            }
        }

        core.shutdown().await;

        // Every queued peer gets an answer before its socket closes.
        connections.close();
        while let Some(conn) = connections.recv().await {
            handlers::respond_error(conn, SHUTDOWN_MESSAGE).await;
        }
        if let Err(e) = accept.await {
            log::warn!("coordinator: accept task ended abnormally: {e}");
        }
        log::info!("coordinator: stopped");
        Ok(())
    }
}

/// Move accepted connections from the server into the coordinator mailbox,
/// then shut the server down so nothing it accepted goes unanswered.
async fn forward_connections(
    mut server: ResidentServer,
    mailbox: mpsc::Sender<Connection>,
    shutdown: CancellationToken,
) {
    loop {
        match server.next(&shutdown).await {
            Ok(conn) => {
                if let Err(mpsc::error::SendError(conn)) = mailbox.send(conn).await {
                    handlers::respond_error(conn, SHUTDOWN_MESSAGE).await;
                    break;
                }
            }
            Err(TransportError::Cancelled) => break,
            Err(e) => {
                log::warn!("coordinator: accept loop failed: {e}");
                break;
            }
        }
    }
    server.shutdown().await;
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
