//! Dedicated OS-thread listener using `rdev::listen`.
//!
//! `rdev::listen` blocks forever and has no shutdown API.  Dropping
//! [`HotkeyListener`] sets a stop flag so the callback forwards nothing
//! more; the thread itself stays parked in rdev until the process exits.

use std::cell::RefCell;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use rdev::EventType;
use tokio::sync::mpsc;

use super::{Hotkey, HotkeyError, HotkeyEvent, Modifiers};

// ---------------------------------------------------------------------------
// HotkeyMatcher
// ---------------------------------------------------------------------------

/// Turns a raw key event stream into capture triggers.
///
/// Fires once per physical press: OS auto-repeat of the held key is ignored
/// until the key is released.
#[derive(Debug)]
pub struct HotkeyMatcher {
    hotkey: Hotkey,
    held: Modifiers,
    latched: bool,
}

impl HotkeyMatcher {
    pub fn new(hotkey: Hotkey) -> Self {
        Self {
            hotkey,
            held: Modifiers::default(),
            latched: false,
        }
    }

    /// Feed one event; `true` when the hotkey fires.
    pub fn on_event(&mut self, event: &EventType) -> bool {
        match *event {
            EventType::KeyPress(key) => {
                if self.held.update(key, true) {
                    return false;
                }
                if key != self.hotkey.key || self.held != self.hotkey.modifiers || self.latched {
                    return false;
                }
                self.latched = true;
                true
            }
            EventType::KeyRelease(key) => {
                self.held.update(key, false);
                if key == self.hotkey.key {
                    self.latched = false;
                }
                false
            }
            _ => false,
        }
    }
}

// ---------------------------------------------------------------------------
// HotkeyListener
// ---------------------------------------------------------------------------

/// Handle to the listener thread.  Drop it to stop forwarding events.
pub struct HotkeyListener {
    stop: Arc<AtomicBool>,
    _thread: std::thread::JoinHandle<()>,
}

impl HotkeyListener {
    /// Spawn the listener thread, forwarding [`HotkeyEvent::Capture`] on `tx`
    /// each time `hotkey` is pressed.
    pub fn start(hotkey: Hotkey, tx: mpsc::Sender<HotkeyEvent>) -> Result<Self, HotkeyError> {
        let stop = Arc::new(AtomicBool::new(false));
        let stop_flag = Arc::clone(&stop);

        let thread = std::thread::Builder::new()
            .name("hotkey-listener".into())
            .spawn(move || {
                let matcher = RefCell::new(HotkeyMatcher::new(hotkey));
                let result = rdev::listen(move |event| {
                    if stop_flag.load(Ordering::Relaxed) {
                        return;
                    }
                    if matcher.borrow_mut().on_event(&event.event_type) {
                        log::debug!("hotkey: {hotkey} pressed");
                        // A full mailbox means a trigger is already queued.
                        if let Err(e) = tx.try_send(HotkeyEvent::Capture) {
                            log::debug!("hotkey: trigger dropped: {e}");
                        }
                    }
                });

                if let Err(e) = result {
                    log::error!("hotkey: rdev::listen exited with error: {e:?}");
                }
            })?;

        log::info!("hotkey: listening for {hotkey}");
        Ok(Self {
            stop,
            _thread: thread,
        })
    }
}

impl Drop for HotkeyListener {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::Relaxed);
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
