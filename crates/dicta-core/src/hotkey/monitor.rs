//! Global keyboard listener feeding the chord tracker.
//!
//! Uses rdev::listen() on a dedicated thread. The OS delivers key
//! events on that thread, so edge callbacks are dispatched onto
//! short-lived worker threads and never block event delivery.
//!
//! rdev::listen() has no clean shutdown; `stop()` makes the callback
//! inert and the listener thread runs until process exit.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, mpsc};
use std::time::Duration;

use rdev::EventType;

use super::{Chord, ChordEdge, ChordTracker};
use crate::error::DictationError;

type EdgeCallback = Box<dyn Fn() + Send + Sync>;

struct MonitorInner {
    tracker: Mutex<ChordTracker>,
    enabled: AtomicBool,
    on_press: EdgeCallback,
    on_release: EdgeCallback,
}

/// Owns the rdev listener thread and the chord state.
pub struct HotkeyMonitor {
    inner: Arc<MonitorInner>,
    thread: Mutex<Option<std::thread::JoinHandle<()>>>,
}

impl HotkeyMonitor {
    pub fn new(
        chord: Chord,
        on_press: impl Fn() + Send + Sync + 'static,
        on_release: impl Fn() + Send + Sync + 'static,
    ) -> Self {
        Self {
            inner: Arc::new(MonitorInner {
                tracker: Mutex::new(ChordTracker::new(chord)),
                enabled: AtomicBool::new(false),
                on_press: Box::new(on_press),
                on_release: Box::new(on_release),
            }),
            thread: Mutex::new(None),
        }
    }

    /// Install the global keyboard hook.
    ///
    /// rdev::listen() blocks its thread forever on success, so startup
    /// failure is detected by waiting briefly for an error on a
    /// channel: no error within the timeout means the hook is live.
    pub fn start(&self) -> Result<(), DictationError> {
        self.inner.enabled.store(true, Ordering::SeqCst);

        let inner = Arc::clone(&self.inner);
        let (startup_tx, startup_rx) = mpsc::channel::<String>();

        let handle = std::thread::spawn(move || {
            let result = rdev::listen(move |event| {
                if !inner.enabled.load(Ordering::SeqCst) {
                    return;
                }
                let edge = {
                    let mut tracker = inner.tracker.lock().unwrap();
                    match event.event_type {
                        EventType::KeyPress(key) => tracker.key_down(key),
                        EventType::KeyRelease(key) => tracker.key_up(key),
                        _ => None,
                    }
                };
                // Fire-and-forget so the OS input pipeline is never
                // blocked by application logic.
                match edge {
                    Some(ChordEdge::Pressed) => {
                        let inner = Arc::clone(&inner);
                        std::thread::spawn(move || (inner.on_press)());
                    }
                    Some(ChordEdge::Released) => {
                        let inner = Arc::clone(&inner);
                        std::thread::spawn(move || (inner.on_release)());
                    }
                    None => {}
                }
            });
            if let Err(e) = result {
                let _ = startup_tx.send(format!("{e:?}"));
            }
        });

        match startup_rx.recv_timeout(Duration::from_millis(500)) {
            Ok(e) => Err(DictationError::HotkeyHookFailed(e)),
            Err(mpsc::RecvTimeoutError::Timeout) => {
                // No error received = the hook is running
                *self.thread.lock().unwrap() = Some(handle);
                Ok(())
            }
            Err(mpsc::RecvTimeoutError::Disconnected) => Err(DictationError::HotkeyHookFailed(
                "hotkey thread terminated unexpectedly".to_string(),
            )),
        }
    }

    /// Stop reacting to key events. The listener thread itself cannot
    /// be unhooked and lives until process exit.
    pub fn stop(&self) {
        self.inner.enabled.store(false, Ordering::SeqCst);
    }

    /// Clear pressed-key state and the chord-active flag without
    /// emitting edges. Must run before a synthetic paste keystroke.
    pub fn reset(&self) {
        self.inner.tracker.lock().unwrap().reset();
    }

    /// A cloneable handle to `reset()` for wiring into the session
    /// orchestrator without sharing the whole monitor.
    pub fn reset_hook(&self) -> Arc<dyn Fn() + Send + Sync> {
        let inner = Arc::clone(&self.inner);
        Arc::new(move || inner.tracker.lock().unwrap().reset())
    }
}
