//! Test doubles shared by the unit tests of several modules.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::feedback::{FeedbackError, PopupController, TrayStatus};
use crate::output::{Clipboard, OutputError};
use crate::recognize::{RecognizeError, Recognizer};
use crate::select::{Region, RegionSelector, SelectError, Selection};
use crate::transport::{Connection, PortRange, ResidentServer};

// ---------------------------------------------------------------------------
// Recognizers
// ---------------------------------------------------------------------------

/// Never answers and ignores its token, like a hung blocking request.
pub struct NeverRecognizer;

#[async_trait]
impl Recognizer for NeverRecognizer {
    async fn recognize(&self, _c: CancellationToken, _r: Region) -> Result<String, RecognizeError> {
        std::future::pending().await
    }
}

/// Sleeps, then returns a fixed outcome.
pub struct SlowRecognizer {
    delay: Duration,
    outcome: Result<String, RecognizeError>,
}

impl SlowRecognizer {
    pub fn new(delay: Duration, outcome: Result<String, RecognizeError>) -> Self {
        Self { delay, outcome }
    }
}

#[async_trait]
impl Recognizer for SlowRecognizer {
    async fn recognize(&self, _c: CancellationToken, _r: Region) -> Result<String, RecognizeError> {
        tokio::time::sleep(self.delay).await;
        self.outcome.clone()
    }
}

/// Counts calls and the peak number of calls running at once.
pub struct ConcurrencyCounter {
    delay: Duration,
    calls: AtomicUsize,
    running: AtomicUsize,
    peak: AtomicUsize,
}

impl ConcurrencyCounter {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            calls: AtomicUsize::new(0),
            running: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn max_concurrent(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Recognizer for ConcurrencyCounter {
    async fn recognize(&self, _c: CancellationToken, _r: Region) -> Result<String, RecognizeError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let now = self.running.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        tokio::time::sleep(self.delay).await;
        self.running.fetch_sub(1, Ordering::SeqCst);
        Ok("counted".into())
    }
}

// ---------------------------------------------------------------------------
// Selector
// ---------------------------------------------------------------------------

/// What a [`ScriptedSelector`] does on every call.
#[derive(Debug, Clone)]
pub enum Script {
    Pick(Region),
    Cancel,
    Fail,
    /// Keep the picker open until the token fires, then report a cancel.
    HoldUntilCancelled,
}

pub struct ScriptedSelector {
    script: Script,
    calls: AtomicUsize,
}

impl ScriptedSelector {
    pub fn new(script: Script) -> Self {
        Self {
            script,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RegionSelector for ScriptedSelector {
    async fn select(&self, cancel: &CancellationToken) -> Result<Selection, SelectError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match &self.script {
            Script::Pick(region) => Ok(Selection::Region(region.clone())),
            Script::Cancel => Ok(Selection::Cancelled),
            Script::Fail => Err(SelectError::Unavailable("scripted failure".into())),
            Script::HoldUntilCancelled => {
                cancel.cancelled().await;
                Ok(Selection::Cancelled)
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Feedback / output
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PopupEvent {
    Countdown(u32),
    Text(String),
    Closed,
}

#[derive(Default)]
pub struct RecordingPopup {
    events: Mutex<Vec<PopupEvent>>,
}

impl RecordingPopup {
    pub fn events(&self) -> Vec<PopupEvent> {
        self.events.lock().unwrap().clone()
    }

    fn push(&self, event: PopupEvent) -> Result<(), FeedbackError> {
        self.events.lock().unwrap().push(event);
        Ok(())
    }
}

impl PopupController for RecordingPopup {
    fn start_countdown(&self, seconds: u32) -> Result<(), FeedbackError> {
        self.push(PopupEvent::Countdown(seconds))
    }

    fn update_text(&self, text: &str) -> Result<(), FeedbackError> {
        self.push(PopupEvent::Text(text.to_string()))
    }

    fn close(&self) -> Result<(), FeedbackError> {
        self.push(PopupEvent::Closed)
    }
}

#[derive(Default)]
pub struct RecordingTray {
    tooltips: Mutex<Vec<String>>,
    notices: Mutex<Vec<String>>,
}

impl RecordingTray {
    pub fn tooltips(&self) -> Vec<String> {
        self.tooltips.lock().unwrap().clone()
    }

    pub fn notices(&self) -> Vec<String> {
        self.notices.lock().unwrap().clone()
    }
}

impl TrayStatus for RecordingTray {
    fn set_tooltip(&self, text: &str) {
        self.tooltips.lock().unwrap().push(text.to_string());
    }

    fn notify(&self, message: &str) {
        self.notices.lock().unwrap().push(message.to_string());
    }
}

/// In-memory clipboard that can be told to fail.
#[derive(Default)]
pub struct MemoryClipboard {
    contents: Mutex<Vec<String>>,
    fail: bool,
}

impl MemoryClipboard {
    pub fn failing() -> Self {
        Self {
            contents: Mutex::default(),
            fail: true,
        }
    }

    pub fn writes(&self) -> Vec<String> {
        self.contents.lock().unwrap().clone()
    }
}

impl Clipboard for MemoryClipboard {
    fn write(&self, text: &str) -> Result<(), OutputError> {
        if self.fail {
            return Err(OutputError::ClipboardSet("clipboard locked".into()));
        }
        self.contents.lock().unwrap().push(text.to_string());
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Network helpers
// ---------------------------------------------------------------------------

/// A loopback port that was free a moment ago.
pub fn free_port() -> u16 {
    std::net::TcpListener::bind("127.0.0.1:0")
        .and_then(|l| l.local_addr())
        .map(|a| a.port())
        .expect("ephemeral port")
}

/// A resident-side [`Connection`] for `request`, plus a task that yields
/// everything the client side receives before the socket closes.
pub async fn loopback_connection(
    request: &'static str,
) -> (Connection, tokio::task::JoinHandle<String>) {
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    let port = free_port();
    let cancel = CancellationToken::new();
    let range = PortRange::clamped(i64::from(port), i64::from(port));
    let mut server = ResidentServer::start(&range, Duration::from_secs(1), &cancel)
        .await
        .expect("test server");

    let client = tokio::spawn(async move {
        let mut stream = tokio::net::TcpStream::connect(range.resident_addr())
            .await
            .expect("connect");
        stream.write_all(request.as_bytes()).await.expect("request");
        let mut out = String::new();
        stream.read_to_string(&mut out).await.expect("response");
        out
    });

    let conn = server.next(&cancel).await.expect("connection");
    (conn, client)
}
