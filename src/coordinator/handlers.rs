//! Trigger and result handlers.  Everything here runs on the coordinator
//! task; nothing is shared except through the result mailbox.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use super::state::{BusyIndicator, CoordinatorState};
use super::{Collaborators, CoordinatorSettings};
use crate::feedback::{countdown_seconds, PopupController, TrayStatus, BUSY_NOTICE, TOOLTIP_BUSY, TOOLTIP_IDLE};
use crate::output::Clipboard;
use crate::pool::{Deadline, JobOutcome, WorkerPool};
use crate::select::{Region, RegionSelector, SelectError, Selection};
use crate::session::{self, ClipboardTarget, ConnectionTarget, ResultTarget, SessionError};
use crate::transport::{protocol, Connection};

/// Sent to every peer still waiting when the resident stops.
pub const SHUTDOWN_MESSAGE: &str = protocol::SHUTTING_DOWN;

/// A finished job, as posted by the worker callback.
#[derive(Debug)]
pub struct SessionResult {
    pub id: u64,
    pub outcome: JobOutcome,
}

/// Who is waiting for the session's result.
#[derive(Debug)]
enum Requester {
    Hotkey,
    Peer(Connection),
}

#[derive(Debug)]
struct Pending {
    id: u64,
    requester: Requester,
}

pub(super) struct CoordinatorCore {
    state: CoordinatorState,
    busy: BusyIndicator,
    pending: Option<Pending>,
    next_id: u64,
    pool: Option<WorkerPool>,
    results: mpsc::Sender<SessionResult>,
    deadline: Duration,
    selector: Arc<dyn RegionSelector>,
    clipboard: Arc<dyn Clipboard>,
    popup: Arc<dyn PopupController>,
    tray: Arc<dyn TrayStatus>,
}

impl CoordinatorCore {
    pub(super) fn new(
        settings: &CoordinatorSettings,
        collaborators: Collaborators,
        results: mpsc::Sender<SessionResult>,
    ) -> Self {
        let Collaborators {
            selector,
            recognizer,
            clipboard,
            popup,
            tray,
        } = collaborators;

        Self {
            state: CoordinatorState::Idle,
            busy: BusyIndicator::new(),
            pending: None,
            next_id: 1,
            pool: Some(WorkerPool::new(settings.workers, recognizer)),
            results,
            deadline: settings.deadline,
            selector,
            clipboard,
            popup,
            tray,
        }
    }

    pub(super) fn busy(&self) -> BusyIndicator {
        self.busy.clone()
    }

    pub(super) fn state(&self) -> CoordinatorState {
        self.state
    }

    pub(super) fn tray(&self) -> &dyn TrayStatus {
        self.tray.as_ref()
    }

    // -----------------------------------------------------------------------
    // Triggers
    // -----------------------------------------------------------------------

    pub(super) async fn handle_hotkey(&mut self, shutdown: &CancellationToken) {
        if self.state.is_busy() {
            log::info!("coordinator: hotkey while {}, rejected", self.state.label());
            self.tray.notify(BUSY_NOTICE);
            return;
        }

        match self.select_region(shutdown).await {
            Ok(Some(region)) => self.begin(region, Requester::Hotkey, shutdown).await,
            Ok(None) => log::debug!("coordinator: selection cancelled"),
            Err(e) => {
                log::warn!("coordinator: {e}");
                self.tray.notify(&e.to_string());
            }
        }
    }

    pub(super) async fn handle_connection(&mut self, conn: Connection, shutdown: &CancellationToken) {
        if self.state.is_busy() {
            log::info!("coordinator: request from {} while busy, rejected", conn.peer());
            respond_error(conn, BUSY_NOTICE).await;
            return;
        }

        match self.select_region(shutdown).await {
            Ok(Some(region)) => self.begin(region, Requester::Peer(conn), shutdown).await,
            Ok(None) => respond_error(conn, &SessionError::Cancelled.to_string()).await,
            Err(e) => {
                log::warn!("coordinator: {e}");
                respond_error(conn, &SessionError::Select(e).to_string()).await;
            }
        }
    }

    /// Run the picker.  `Ok(None)` is a user cancel.  Leaves the state at
    /// `Idle`; [`begin`](Self::begin) moves it on.
    async fn select_region(
        &mut self,
        shutdown: &CancellationToken,
    ) -> Result<Option<Region>, SelectError> {
        self.state = CoordinatorState::Selecting;
        let selection = self.selector.select(shutdown).await;
        self.state = CoordinatorState::Idle;

        Ok(match selection? {
            Selection::Region(region) => Some(region),
            Selection::Cancelled => None,
        })
    }

    async fn begin(&mut self, region: Region, requester: Requester, shutdown: &CancellationToken) {
        let id = self.next_id;
        self.next_id += 1;

        let deadline = Deadline::after(shutdown, self.deadline);
        let results = self.results.clone();
        let callback = move |outcome| {
            if let Err(e) = results.try_send(SessionResult { id, outcome }) {
                log::error!("coordinator: result of session {id} lost: {e}");
            }
        };

        let accepted = match &self.pool {
            Some(pool) => pool.submit(deadline, region.clone(), callback),
            None => false,
        };
        if !accepted {
            log::warn!("coordinator: pool refused session {id}");
            match requester {
                Requester::Hotkey => self.tray.notify(BUSY_NOTICE),
                Requester::Peer(conn) => respond_error(conn, BUSY_NOTICE).await,
            }
            return;
        }

        log::info!("coordinator: session {id} recognizing {region}");
        self.state = CoordinatorState::Recognizing;
        self.busy.set(true);
        self.tray.set_tooltip(TOOLTIP_BUSY);
        if let Err(e) = self.popup.start_countdown(countdown_seconds(self.deadline)) {
            log::warn!("coordinator: countdown failed: {e}");
        }
        self.pending = Some(Pending { id, requester });
    }

    // -----------------------------------------------------------------------
    // Results
    // -----------------------------------------------------------------------

    /// Route a finished job, then return to `Idle` whatever the outcome.
    pub(super) async fn handle_result(&mut self, result: SessionResult) {
        let pending = match self.pending.take() {
            Some(p) if p.id == result.id => p,
            other => {
                log::warn!("coordinator: result for unknown session {} dropped", result.id);
                self.pending = other;
                return;
            }
        };

        self.route(pending, result.outcome).await;
        self.finish_session();
    }

    async fn route(&self, pending: Pending, outcome: JobOutcome) {
        let id = pending.id;
        let from_hotkey = matches!(pending.requester, Requester::Hotkey);
        let mut target: Box<dyn ResultTarget> = match pending.requester {
            Requester::Hotkey => Box::new(ClipboardTarget::new(Arc::clone(&self.clipboard))),
            Requester::Peer(conn) => {
                Box::new(ConnectionTarget::new(conn, Arc::clone(&self.clipboard)))
            }
        };

        match session::deliver(outcome, target.as_mut(), self.popup.as_ref()).await {
            Ok(text) => {
                log::info!("coordinator: session {id} done ({} chars)", text.chars().count())
            }
            Err(e @ SessionError::Deliver(_)) if from_hotkey => self.tray.notify(&e.to_string()),
            Err(_) => {}
        }
    }

    fn finish_session(&mut self) {
        self.state = CoordinatorState::Idle;
        self.busy.set(false);
        self.tray.set_tooltip(TOOLTIP_IDLE);
    }

    /// Answer a waiting peer, stop the popup and abandon the pool.
    pub(super) async fn shutdown(&mut self) {
        if let Some(pending) = self.pending.take() {
            log::info!("coordinator: abandoning session {}", pending.id);
            if let Requester::Peer(conn) = pending.requester {
                respond_error(conn, SHUTDOWN_MESSAGE).await;
            }
            session::close_popup(self.popup.as_ref());
        }
        if let Some(pool) = self.pool.take() {
            pool.abandon();
        }
        self.state = CoordinatorState::Idle;
        self.busy.set(false);
    }
}

pub(super) async fn respond_error(conn: Connection, message: &str) {
    let peer = conn.peer();
    if let Err(e) = conn.respond_error(message).await {
        log::debug!("coordinator: could not answer {peer}: {e}");
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    use crate::recognize::{RecognizeError, Recognizer};
    use crate::testing::{
        loopback_connection, MemoryClipboard, PopupEvent, RecordingPopup, RecordingTray, Script,
        ScriptedSelector, SlowRecognizer,
    };

    struct Harness {
        core: CoordinatorCore,
        results: mpsc::Receiver<SessionResult>,
        selector: Arc<ScriptedSelector>,
        clipboard: Arc<MemoryClipboard>,
        popup: Arc<RecordingPopup>,
        tray: Arc<RecordingTray>,
        shutdown: CancellationToken,
    }

    impl Harness {
        fn new(script: Script, recognizer: Arc<dyn Recognizer>, clipboard: MemoryClipboard) -> Self {
            let selector = Arc::new(ScriptedSelector::new(script));
            let clipboard = Arc::new(clipboard);
            let popup = Arc::new(RecordingPopup::default());
            let tray = Arc::new(RecordingTray::default());
            let (tx, results) = mpsc::channel(1);

            let settings = CoordinatorSettings {
                deadline: Duration::from_secs(5),
                workers: 1,
                ..CoordinatorSettings::default()
            };
            let core = CoordinatorCore::new(
                &settings,
                Collaborators {
                    selector: selector.clone(),
                    recognizer,
                    clipboard: clipboard.clone(),
                    popup: popup.clone(),
                    tray: tray.clone(),
                },
                tx,
            );

            Self {
                core,
                results,
                selector,
                clipboard,
                popup,
                tray,
                shutdown: CancellationToken::new(),
            }
        }

        fn replying(text: Result<String, RecognizeError>) -> Self {
            let rec = Arc::new(SlowRecognizer::new(Duration::from_millis(20), text));
            Self::new(Script::Pick(Region::new(1, 2, 30, 40).unwrap()), rec, MemoryClipboard::default())
        }

        /// Wait for the pool's result and hand it to the core.
        async fn complete(&mut self) {
            let result = self.results.recv().await.unwrap();
            self.core.handle_result(result).await;
        }

        fn assert_idle(&self) {
            assert_eq!(self.core.state(), CoordinatorState::Idle);
            assert!(!self.core.busy().is_busy());
            assert_eq!(self.tray.tooltips().last().map(String::as_str), Some(TOOLTIP_IDLE));
        }
    }

    #[tokio::test]
    async fn hotkey_success_copies_and_shows_text() {
        let mut h = Harness::replying(Ok("Hello World".into()));

        h.core.handle_hotkey(&h.shutdown).await;
        assert_eq!(h.core.state(), CoordinatorState::Recognizing);
        assert!(h.core.busy().is_busy());

        h.complete().await;

        h.assert_idle();
        assert_eq!(h.clipboard.writes(), vec!["Hello World".to_string()]);
        assert_eq!(
            h.popup.events(),
            vec![PopupEvent::Countdown(5), PopupEvent::Text("Hello World".into())]
        );
        assert_eq!(h.tray.tooltips(), vec![TOOLTIP_BUSY.to_string(), TOOLTIP_IDLE.to_string()]);
    }

    #[tokio::test]
    async fn hotkey_failure_is_silent() {
        let mut h = Harness::replying(Err(RecognizeError::DeadlineExceeded(Duration::from_secs(5))));

        h.core.handle_hotkey(&h.shutdown).await;
        h.complete().await;

        h.assert_idle();
        assert!(h.clipboard.writes().is_empty());
        assert!(h.tray.notices().is_empty());
        assert_eq!(h.popup.events(), vec![PopupEvent::Countdown(5), PopupEvent::Closed]);
    }

    #[tokio::test]
    async fn hotkey_clipboard_failure_is_surfaced() {
        let rec = Arc::new(SlowRecognizer::new(Duration::ZERO, Ok("x".into())));
        let mut h = Harness::new(
            Script::Pick(Region::new(0, 0, 4, 4).unwrap()),
            rec,
            MemoryClipboard::failing(),
        );

        h.core.handle_hotkey(&h.shutdown).await;
        h.complete().await;

        h.assert_idle();
        assert_eq!(h.tray.notices().len(), 1);
        assert!(h.tray.notices()[0].contains("not delivered"));
    }

    #[tokio::test]
    async fn stdout_connection_gets_text() {
        let mut h = Harness::replying(Ok("Hello World".into()));
        let (conn, client) = loopback_connection("STDOUT\n").await;

        h.core.handle_connection(conn, &h.shutdown).await;
        h.complete().await;

        h.assert_idle();
        assert_eq!(client.await.unwrap(), "SUCCESS\nHello World");
        assert!(h.clipboard.writes().is_empty());
    }

    #[tokio::test]
    async fn clipboard_connection_gets_empty_success() {
        let mut h = Harness::replying(Ok("Hello World".into()));
        let (conn, client) = loopback_connection("CLIPBOARD\n").await;

        h.core.handle_connection(conn, &h.shutdown).await;
        h.complete().await;

        h.assert_idle();
        assert_eq!(client.await.unwrap(), "SUCCESS\n");
        assert_eq!(h.clipboard.writes(), vec!["Hello World".to_string()]);
        assert_eq!(h.popup.events().last(), Some(&PopupEvent::Text("Hello World".into())));
    }

    #[tokio::test]
    async fn clipboard_connection_write_failure_is_error() {
        let rec = Arc::new(SlowRecognizer::new(Duration::ZERO, Ok("x".into())));
        let mut h = Harness::new(
            Script::Pick(Region::new(0, 0, 4, 4).unwrap()),
            rec,
            MemoryClipboard::failing(),
        );
        let (conn, client) = loopback_connection("CLIPBOARD\n").await;

        h.core.handle_connection(conn, &h.shutdown).await;
        h.complete().await;

        h.assert_idle();
        assert!(client.await.unwrap().starts_with("ERROR\n"));
        assert_eq!(h.popup.events().last(), Some(&PopupEvent::Closed));
    }

    #[tokio::test]
    async fn connection_recognition_error_is_forwarded() {
        let mut h = Harness::replying(Err(RecognizeError::EmptyResponse));
        let (conn, client) = loopback_connection("STDOUT\n").await;

        h.core.handle_connection(conn, &h.shutdown).await;
        h.complete().await;

        h.assert_idle();
        assert_eq!(client.await.unwrap(), "ERROR\nno text detected");
    }

    #[tokio::test]
    async fn cancelled_selection_answers_peer_without_going_busy() {
        let rec = Arc::new(SlowRecognizer::new(Duration::ZERO, Ok("unused".into())));
        let mut h = Harness::new(Script::Cancel, rec, MemoryClipboard::default());
        let (conn, client) = loopback_connection("CLIPBOARD\n").await;

        h.core.handle_connection(conn, &h.shutdown).await;

        assert_eq!(client.await.unwrap(), "ERROR\nselection cancelled");
        assert_eq!(h.core.state(), CoordinatorState::Idle);
        assert!(h.tray.tooltips().is_empty(), "never became busy");
        assert!(h.popup.events().is_empty());
    }

    #[tokio::test]
    async fn cancelled_selection_on_hotkey_is_silent() {
        let rec = Arc::new(SlowRecognizer::new(Duration::ZERO, Ok("unused".into())));
        let mut h = Harness::new(Script::Cancel, rec, MemoryClipboard::default());

        h.core.handle_hotkey(&h.shutdown).await;

        assert_eq!(h.core.state(), CoordinatorState::Idle);
        assert!(h.tray.notices().is_empty());
        assert!(h.tray.tooltips().is_empty());
    }

    #[tokio::test]
    async fn triggers_while_recognizing_are_rejected() {
        let mut h = Harness::replying(Ok("first".into()));

        h.core.handle_hotkey(&h.shutdown).await;
        assert_eq!(h.selector.calls(), 1);

        h.core.handle_hotkey(&h.shutdown).await;
        assert_eq!(h.tray.notices(), vec![BUSY_NOTICE.to_string()]);

        let (conn, client) = loopback_connection("STDOUT\n").await;
        h.core.handle_connection(conn, &h.shutdown).await;
        assert_eq!(client.await.unwrap(), format!("ERROR\n{BUSY_NOTICE}"));

        // Rejections never reach the picker.
        assert_eq!(h.selector.calls(), 1);

        h.complete().await;
        h.assert_idle();
        assert_eq!(h.clipboard.writes(), vec!["first".to_string()]);
    }

    #[tokio::test]
    async fn stale_result_is_ignored() {
        let mut h = Harness::replying(Ok("x".into()));
        h.core.handle_hotkey(&h.shutdown).await;

        h.core
            .handle_result(SessionResult {
                id: 999,
                outcome: Ok("stale".into()),
            })
            .await;
        assert_eq!(h.core.state(), CoordinatorState::Recognizing);

        h.complete().await;
        h.assert_idle();
        assert_eq!(h.clipboard.writes(), vec!["x".to_string()]);
    }

    #[tokio::test]
    async fn shutdown_answers_waiting_peer() {
        let rec = Arc::new(crate::testing::NeverRecognizer);
        let mut h = Harness::new(
            Script::Pick(Region::new(0, 0, 4, 4).unwrap()),
            rec,
            MemoryClipboard::default(),
        );
        let (conn, client) = loopback_connection("STDOUT\n").await;

        h.core.handle_connection(conn, &h.shutdown).await;
        assert!(h.core.busy().is_busy());

        h.core.shutdown().await;

        assert_eq!(client.await.unwrap(), format!("ERROR\n{SHUTDOWN_MESSAGE}"));
        assert!(!h.core.busy().is_busy());
        assert_eq!(h.popup.events().last(), Some(&PopupEvent::Closed));
    }
}
