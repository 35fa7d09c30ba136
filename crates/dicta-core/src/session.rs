//! Session orchestration: the push-to-talk state machine.
//!
//! One hotkey press-to-paste cycle is a session. At most one session
//! exists at a time, enforced by a compare-exchange gate rather than
//! the state machine alone: a press while the gate is held is a
//! silent no-op, never queued. The full sequence from capture stop
//! onward runs on a worker thread distinct from the hotkey-delivery
//! thread.
//!
//! Every `Error` transition auto-clears back to `Idle` after a
//! per-cause delay; that timer captures the session epoch so a timer
//! left over from an old session can never clobber state owned by a
//! newer one.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crossbeam_channel::{Receiver, Sender, unbounded};

use crate::audio::CaptureSource;
use crate::error::DictationError;
use crate::formatting::TranscriptFormatter;
use crate::output::{FocusController, TextOutput, WindowHandle};
use crate::settings::Settings;
use crate::state::{AppState, StateUpdate};
use crate::transcription::Transcriber;

/// Timing and threshold knobs for the orchestrator, derived from
/// `Settings`.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub sample_rate: u32,
    /// Captures shorter than this never reach the transcription
    /// gateway; they surface as "no speech detected".
    pub min_capture_samples: usize,
    pub mic_error_reset: Duration,
    pub no_speech_reset: Duration,
    pub paste_error_reset: Duration,
    /// Pause after a successful paste before returning to idle.
    pub idle_settle: Duration,
}

impl SessionConfig {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            sample_rate: settings.audio.sample_rate,
            min_capture_samples: settings.audio.min_capture_samples,
            mic_error_reset: Duration::from_millis(settings.error_reset.mic_error_ms),
            no_speech_reset: Duration::from_millis(settings.error_reset.no_speech_ms),
            paste_error_reset: Duration::from_millis(settings.error_reset.paste_error_ms),
            idle_settle: Duration::from_millis(settings.output.idle_settle_ms),
        }
    }

    fn reset_delay(&self, err: &DictationError) -> Duration {
        match err {
            DictationError::MicrophoneUnavailable(_) => self.mic_error_reset,
            DictationError::PasteFailed => self.paste_error_reset,
            _ => self.no_speech_reset,
        }
    }
}

type ChordResetHook = Arc<dyn Fn() + Send + Sync>;

struct Inner {
    state: Mutex<AppState>,
    /// Session-wide mutual-exclusion gate. Held from hotkey press
    /// until the state returns to `Idle`.
    session_active: AtomicBool,
    /// Armed at press, claimed exactly once by the release edge.
    /// A duplicate release must never spawn a second worker.
    capture_pending: AtomicBool,
    /// Bumped when a session starts; stale error-reset timers compare
    /// against it and stand down.
    epoch: AtomicU64,
    /// Monotonic session identity, never reused.
    next_session_id: AtomicU64,
    /// Foreground window snapshotted at press time, read exactly once
    /// per session and never refreshed.
    target: Mutex<Option<WindowHandle>>,
    capture: Arc<dyn CaptureSource>,
    transcriber: Arc<dyn Transcriber>,
    formatter: Arc<dyn TranscriptFormatter>,
    output: Arc<dyn TextOutput>,
    focus: Arc<dyn FocusController>,
    chord_reset: Mutex<Option<ChordResetHook>>,
    updates: Sender<StateUpdate>,
    config: SessionConfig,
}

impl Inner {
    fn state(&self) -> AppState {
        *self.state.lock().unwrap()
    }

    /// Commit a transition and publish it. The lock is held only for
    /// the write; the indicator hand-off is an unbounded channel so
    /// this never blocks on rendering.
    fn set_state(&self, state: AppState, message: Option<&str>) {
        *self.state.lock().unwrap() = state;
        crate::verbose!(
            "State: {state}{}",
            message.map(|m| format!(" - {m}")).unwrap_or_default()
        );
        let _ = self.updates.send(StateUpdate {
            state,
            message: message.map(str::to_string),
        });
    }

    fn finish_idle(&self) {
        self.set_state(AppState::Idle, None);
        self.session_active.store(false, Ordering::SeqCst);
    }

    /// Enter `Error` and schedule the unconditional return to `Idle`.
    /// This is the system's only recovery mechanism.
    fn fail(self: Arc<Self>, err: DictationError) {
        self.set_state(AppState::Error, Some(err.user_message()));

        let delay = self.config.reset_delay(&err);
        let epoch = self.epoch.load(Ordering::SeqCst);
        let inner = Arc::clone(&self);
        std::thread::spawn(move || {
            std::thread::sleep(delay);
            if inner.epoch.load(Ordering::SeqCst) != epoch {
                // A newer session owns the state now; leave it alone.
                return;
            }
            inner.finish_idle();
        });
    }

    /// Worker-thread body: everything from capture stop to paste.
    fn process_capture(self: Arc<Self>) {
        let audio = match self.capture.stop() {
            Some(audio) if audio.len() >= self.config.min_capture_samples => audio,
            Some(audio) => {
                crate::verbose!("Capture too short ({} samples)", audio.len());
                return self.fail(DictationError::NoSpeechDetected);
            }
            None => return self.fail(DictationError::NoSpeechDetected),
        };

        self.set_state(AppState::Transcribing, None);
        let text = match self
            .transcriber
            .transcribe(&audio, self.config.sample_rate)
        {
            Ok(Some(text)) => text,
            Ok(None) => return self.fail(DictationError::NoSpeechDetected),
            Err(e) => {
                crate::verbose!("Transcription error: {e:#}");
                return self.fail(DictationError::TranscriptionFailed(format!("{e:#}")));
            }
        };
        crate::verbose!("Transcribed: {text}");

        let formatted = if self.formatter.is_available() {
            self.set_state(AppState::Formatting, None);
            self.formatter.format(&text)
        } else {
            text
        };

        self.set_state(AppState::Pasting, None);

        // Forget held-key state before injecting Ctrl+V, so the
        // synthetic modifier events cannot re-trigger the chord.
        let hook = self.chord_reset.lock().unwrap().clone();
        if let Some(reset) = hook {
            reset();
        }

        let target = *self.target.lock().unwrap();
        if self.output.copy_and_paste(&formatted, target.as_ref()) {
            // Let the simulated key events drain before going idle.
            std::thread::sleep(self.config.idle_settle);
            self.finish_idle();
        } else {
            self.fail(DictationError::PasteFailed);
        }
    }
}

/// The central coordinator: owns `AppState`, serializes hotkey events
/// against the in-flight session, and drives capture, transcription,
/// formatting and paste in sequence.
pub struct SessionOrchestrator {
    inner: Arc<Inner>,
}

impl SessionOrchestrator {
    /// Build an orchestrator over the given collaborators. Returns
    /// the receiving end of the order-preserving state-update channel
    /// for the status indicator.
    pub fn new(
        capture: Arc<dyn CaptureSource>,
        transcriber: Arc<dyn Transcriber>,
        formatter: Arc<dyn TranscriptFormatter>,
        output: Arc<dyn TextOutput>,
        focus: Arc<dyn FocusController>,
        config: SessionConfig,
    ) -> (Self, Receiver<StateUpdate>) {
        let (tx, rx) = unbounded();
        let orchestrator = Self {
            inner: Arc::new(Inner {
                state: Mutex::new(AppState::Idle),
                session_active: AtomicBool::new(false),
                capture_pending: AtomicBool::new(false),
                epoch: AtomicU64::new(0),
                next_session_id: AtomicU64::new(0),
                target: Mutex::new(None),
                capture,
                transcriber,
                formatter,
                output,
                focus,
                chord_reset: Mutex::new(None),
                updates: tx,
                config,
            }),
        };
        (orchestrator, rx)
    }

    /// Wire in the hotkey monitor's reset, invoked right before the
    /// paste keystroke is sent.
    pub fn set_chord_reset(&self, hook: ChordResetHook) {
        *self.inner.chord_reset.lock().unwrap() = Some(hook);
    }

    pub fn state(&self) -> AppState {
        self.inner.state()
    }

    /// Hotkey press: begin a session unless one is already in flight.
    ///
    /// Runs on a hotkey dispatch thread; everything here is quick
    /// (focus snapshot, stream start), no remote calls.
    pub fn on_hotkey_press(&self) {
        let inner = &self.inner;
        if inner
            .session_active
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            // Backpressure is drop, not queue.
            crate::verbose!("Hotkey press ignored: session already active");
            return;
        }

        inner.epoch.fetch_add(1, Ordering::SeqCst);
        let id = inner.next_session_id.fetch_add(1, Ordering::SeqCst) + 1;
        crate::verbose!("Session {id} started");

        // Snapshot the foreground window now; it is not refreshed
        // even if focus changes during recording.
        *inner.target.lock().unwrap() = inner.focus.foreground_window();

        inner.set_state(AppState::Recording, None);
        inner.capture_pending.store(true, Ordering::SeqCst);
        if let Err(e) = inner.capture.start() {
            inner.capture_pending.store(false, Ordering::SeqCst);
            crate::verbose!("Failed to start recording: {e:#}");
            Arc::clone(inner).fail(DictationError::MicrophoneUnavailable(format!("{e:#}")));
        }
    }

    /// Hotkey release: hand the capture to a worker for the rest of
    /// the press-to-paste sequence.
    ///
    /// The release edge is consumed by compare-exchange, so a
    /// duplicate release (or one without a live capture) is dropped
    /// rather than spawning a second worker against the same buffer.
    pub fn on_hotkey_release(&self) {
        if self
            .inner
            .capture_pending
            .compare_exchange(true, false, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            crate::verbose!("Hotkey release ignored: no capture in flight");
            return;
        }
        let inner = Arc::clone(&self.inner);
        std::thread::spawn(move || inner.process_capture());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;
    use std::sync::atomic::AtomicU32;

    struct MockCapture {
        samples: Mutex<Option<Vec<f32>>>,
        fail_start: bool,
        // When set, stop() parks until the channel yields, simulating
        // slow stream teardown.
        stop_gate: Option<Receiver<()>>,
    }

    impl MockCapture {
        fn with_samples(n: usize) -> Arc<Self> {
            Arc::new(Self {
                samples: Mutex::new(Some(vec![0.1; n])),
                fail_start: false,
                stop_gate: None,
            })
        }

        fn failing() -> Arc<Self> {
            Arc::new(Self {
                samples: Mutex::new(None),
                fail_start: true,
                stop_gate: None,
            })
        }
    }

    impl CaptureSource for MockCapture {
        fn start(&self) -> Result<()> {
            if self.fail_start {
                anyhow::bail!("no device");
            }
            Ok(())
        }

        fn stop(&self) -> Option<Vec<f32>> {
            if let Some(gate) = &self.stop_gate {
                let _ = gate.recv();
            }
            self.samples.lock().unwrap().take()
        }
    }

    struct MockTranscriber {
        result: Mutex<Option<String>>,
        calls: AtomicU32,
        // When set, transcribe blocks until the channel yields.
        block_on: Option<Receiver<()>>,
    }

    impl MockTranscriber {
        fn returning(text: &str) -> Arc<Self> {
            Arc::new(Self {
                result: Mutex::new(Some(text.to_string())),
                calls: AtomicU32::new(0),
                block_on: None,
            })
        }

        fn empty() -> Arc<Self> {
            Arc::new(Self {
                result: Mutex::new(None),
                calls: AtomicU32::new(0),
                block_on: None,
            })
        }
    }

    impl Transcriber for MockTranscriber {
        fn transcribe(&self, _samples: &[f32], _rate: u32) -> Result<Option<String>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if let Some(rx) = &self.block_on {
                let _ = rx.recv();
            }
            Ok(self.result.lock().unwrap().clone())
        }
    }

    struct MockFormatter {
        available: bool,
        degraded: bool,
    }

    impl TranscriptFormatter for MockFormatter {
        fn is_available(&self) -> bool {
            self.available
        }

        fn format(&self, text: &str) -> String {
            if self.degraded {
                // Exhausted retries fall back to the input.
                text.to_string()
            } else {
                text.to_uppercase()
            }
        }
    }

    struct MockOutput {
        succeed: bool,
        pasted: Mutex<Option<String>>,
        target_seen: Mutex<Option<WindowHandle>>,
    }

    impl MockOutput {
        fn new(succeed: bool) -> Arc<Self> {
            Arc::new(Self {
                succeed,
                pasted: Mutex::new(None),
                target_seen: Mutex::new(None),
            })
        }
    }

    impl TextOutput for MockOutput {
        fn copy_and_paste(&self, text: &str, target: Option<&WindowHandle>) -> bool {
            *self.pasted.lock().unwrap() = Some(text.to_string());
            *self.target_seen.lock().unwrap() = target.copied();
            self.succeed
        }
    }

    struct MockFocus;

    impl FocusController for MockFocus {
        fn foreground_window(&self) -> Option<WindowHandle> {
            Some(WindowHandle(7))
        }

        fn restore_focus(&self, _target: &WindowHandle) -> bool {
            true
        }

        fn send_paste(&self) -> Result<()> {
            Ok(())
        }
    }

    fn fast_config() -> SessionConfig {
        SessionConfig {
            sample_rate: 16_000,
            min_capture_samples: 1_600,
            mic_error_reset: Duration::from_millis(10),
            no_speech_reset: Duration::from_millis(10),
            paste_error_reset: Duration::from_millis(10),
            idle_settle: Duration::ZERO,
        }
    }

    fn orchestrator(
        capture: Arc<dyn CaptureSource>,
        transcriber: Arc<dyn Transcriber>,
        formatter: MockFormatter,
        output: Arc<MockOutput>,
    ) -> (SessionOrchestrator, Receiver<StateUpdate>) {
        SessionOrchestrator::new(
            capture,
            transcriber,
            Arc::new(formatter),
            output,
            Arc::new(MockFocus),
            fast_config(),
        )
    }

    /// Drain updates until `Idle` is observed (or time out).
    fn collect_until_idle(rx: &Receiver<StateUpdate>) -> Vec<StateUpdate> {
        let mut updates = Vec::new();
        loop {
            let update = rx
                .recv_timeout(Duration::from_secs(2))
                .expect("timed out waiting for state updates");
            let done = update.state == AppState::Idle;
            updates.push(update);
            if done {
                return updates;
            }
        }
    }

    fn states(updates: &[StateUpdate]) -> Vec<AppState> {
        updates.iter().map(|u| u.state).collect()
    }

    #[test]
    fn full_success_visits_every_state_in_order() {
        let output = MockOutput::new(true);
        let (orch, rx) = orchestrator(
            MockCapture::with_samples(32_000), // 2s of audio
            MockTranscriber::returning("hello world"),
            MockFormatter {
                available: true,
                degraded: false,
            },
            Arc::clone(&output),
        );

        orch.on_hotkey_press();
        orch.on_hotkey_release();

        let updates = collect_until_idle(&rx);
        assert_eq!(
            states(&updates),
            vec![
                AppState::Recording,
                AppState::Transcribing,
                AppState::Formatting,
                AppState::Pasting,
                AppState::Idle,
            ]
        );
        assert_eq!(
            output.pasted.lock().unwrap().as_deref(),
            Some("HELLO WORLD")
        );
        // The press-time snapshot was handed through to the paste.
        assert_eq!(*output.target_seen.lock().unwrap(), Some(WindowHandle(7)));
    }

    #[test]
    fn short_capture_never_reaches_the_gateway() {
        let transcriber = MockTranscriber::returning("should not be called");
        let output = MockOutput::new(true);
        let (orch, rx) = orchestrator(
            MockCapture::with_samples(100), // well under 0.1s
            Arc::clone(&transcriber) as Arc<dyn Transcriber>,
            MockFormatter {
                available: true,
                degraded: false,
            },
            output,
        );

        orch.on_hotkey_press();
        orch.on_hotkey_release();

        let updates = collect_until_idle(&rx);
        assert_eq!(
            states(&updates),
            vec![AppState::Recording, AppState::Error, AppState::Idle]
        );
        assert_eq!(updates[1].message.as_deref(), Some("No speech detected"));
        assert_eq!(transcriber.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn empty_transcript_reports_no_speech() {
        let output = MockOutput::new(true);
        let (orch, rx) = orchestrator(
            MockCapture::with_samples(32_000),
            MockTranscriber::empty(),
            MockFormatter {
                available: true,
                degraded: false,
            },
            Arc::clone(&output),
        );

        orch.on_hotkey_press();
        orch.on_hotkey_release();

        let updates = collect_until_idle(&rx);
        assert_eq!(
            states(&updates),
            vec![
                AppState::Recording,
                AppState::Transcribing,
                AppState::Error,
                AppState::Idle,
            ]
        );
        assert!(output.pasted.lock().unwrap().is_none());
    }

    #[test]
    fn unavailable_formatter_is_skipped() {
        let output = MockOutput::new(true);
        let (orch, rx) = orchestrator(
            MockCapture::with_samples(32_000),
            MockTranscriber::returning("raw transcript"),
            MockFormatter {
                available: false,
                degraded: false,
            },
            Arc::clone(&output),
        );

        orch.on_hotkey_press();
        orch.on_hotkey_release();

        let updates = collect_until_idle(&rx);
        assert!(!states(&updates).contains(&AppState::Formatting));
        assert_eq!(
            output.pasted.lock().unwrap().as_deref(),
            Some("raw transcript")
        );
    }

    #[test]
    fn degraded_formatter_falls_back_to_transcript() {
        let output = MockOutput::new(true);
        let (orch, rx) = orchestrator(
            MockCapture::with_samples(32_000),
            MockTranscriber::returning("raw transcript"),
            MockFormatter {
                available: true,
                degraded: true,
            },
            Arc::clone(&output),
        );

        orch.on_hotkey_press();
        orch.on_hotkey_release();

        let updates = collect_until_idle(&rx);
        // Formatting failure is never an error state.
        assert_eq!(
            states(&updates),
            vec![
                AppState::Recording,
                AppState::Transcribing,
                AppState::Formatting,
                AppState::Pasting,
                AppState::Idle,
            ]
        );
        assert_eq!(
            output.pasted.lock().unwrap().as_deref(),
            Some("raw transcript")
        );
    }

    #[test]
    fn paste_failure_recovers_through_error() {
        let output = MockOutput::new(false);
        let (orch, rx) = orchestrator(
            MockCapture::with_samples(32_000),
            MockTranscriber::returning("hello"),
            MockFormatter {
                available: false,
                degraded: false,
            },
            output,
        );

        orch.on_hotkey_press();
        orch.on_hotkey_release();

        let updates = collect_until_idle(&rx);
        let error = updates
            .iter()
            .find(|u| u.state == AppState::Error)
            .expect("expected an error state");
        assert_eq!(error.message.as_deref(), Some("Paste failed"));
        assert_eq!(updates.last().unwrap().state, AppState::Idle);
    }

    #[test]
    fn mic_failure_auto_clears_and_allows_a_new_session() {
        let output = MockOutput::new(true);
        let (orch, rx) = orchestrator(
            MockCapture::failing(),
            MockTranscriber::returning("unused"),
            MockFormatter {
                available: false,
                degraded: false,
            },
            output,
        );

        orch.on_hotkey_press();
        let updates = collect_until_idle(&rx);
        assert_eq!(
            states(&updates),
            vec![AppState::Recording, AppState::Error, AppState::Idle]
        );
        assert_eq!(updates[1].message.as_deref(), Some("Microphone error"));

        // The gate was released by the auto-reset; a new press is
        // accepted again.
        orch.on_hotkey_press();
        assert_eq!(
            rx.recv_timeout(Duration::from_secs(2)).unwrap().state,
            AppState::Recording
        );
    }

    #[test]
    fn second_press_during_in_flight_session_is_dropped() {
        let (unblock_tx, unblock_rx) = unbounded();
        let transcriber = Arc::new(MockTranscriber {
            result: Mutex::new(Some("hello".to_string())),
            calls: AtomicU32::new(0),
            block_on: Some(unblock_rx),
        });
        let output = MockOutput::new(true);
        let (orch, rx) = orchestrator(
            MockCapture::with_samples(32_000),
            Arc::clone(&transcriber) as Arc<dyn Transcriber>,
            MockFormatter {
                available: false,
                degraded: false,
            },
            Arc::clone(&output),
        );

        orch.on_hotkey_press();
        orch.on_hotkey_release();

        // Wait until the worker is parked inside the gateway call.
        assert_eq!(
            rx.recv_timeout(Duration::from_secs(2)).unwrap().state,
            AppState::Recording
        );
        assert_eq!(
            rx.recv_timeout(Duration::from_secs(2)).unwrap().state,
            AppState::Transcribing
        );

        // A press mid-session must not create a second session.
        orch.on_hotkey_press();
        assert_eq!(orch.state(), AppState::Transcribing);

        unblock_tx.send(()).unwrap();
        let updates = collect_until_idle(&rx);
        // No Recording update from the dropped press; the in-flight
        // session proceeded unaffected.
        assert_eq!(states(&updates), vec![AppState::Pasting, AppState::Idle]);
        assert_eq!(transcriber.calls.load(Ordering::SeqCst), 1);
        assert_eq!(output.pasted.lock().unwrap().as_deref(), Some("hello"));
    }

    #[test]
    fn duplicate_release_during_stream_teardown_is_dropped() {
        let (unblock_tx, unblock_rx) = unbounded();
        let capture = Arc::new(MockCapture {
            samples: Mutex::new(Some(vec![0.1; 32_000])),
            fail_start: false,
            stop_gate: Some(unblock_rx),
        });
        let transcriber = MockTranscriber::returning("hello");
        let output = MockOutput::new(true);
        let (orch, rx) = orchestrator(
            capture,
            Arc::clone(&transcriber) as Arc<dyn Transcriber>,
            MockFormatter {
                available: false,
                degraded: false,
            },
            Arc::clone(&output),
        );

        orch.on_hotkey_press();
        orch.on_hotkey_release();
        // Second release while the first worker is parked inside
        // stop(). If it spawned its own worker, that worker would
        // drain an empty buffer and inject a spurious error whose
        // reset would reopen the gate mid-session.
        orch.on_hotkey_release();

        unblock_tx.send(()).unwrap();
        unblock_tx.send(()).unwrap();

        let updates = collect_until_idle(&rx);
        assert_eq!(
            states(&updates),
            vec![
                AppState::Recording,
                AppState::Transcribing,
                AppState::Pasting,
                AppState::Idle,
            ]
        );
        assert_eq!(transcriber.calls.load(Ordering::SeqCst), 1);
        assert_eq!(output.pasted.lock().unwrap().as_deref(), Some("hello"));

        // The gate stayed closed for the whole session and reopens
        // cleanly afterwards.
        orch.on_hotkey_press();
        assert_eq!(
            rx.recv_timeout(Duration::from_secs(2)).unwrap().state,
            AppState::Recording
        );
    }

    #[test]
    fn release_without_recording_is_ignored() {
        let transcriber = MockTranscriber::returning("unused");
        let output = MockOutput::new(true);
        let (orch, rx) = orchestrator(
            MockCapture::with_samples(32_000),
            Arc::clone(&transcriber) as Arc<dyn Transcriber>,
            MockFormatter {
                available: false,
                degraded: false,
            },
            output,
        );

        orch.on_hotkey_release();
        assert!(rx.recv_timeout(Duration::from_millis(50)).is_err());
        assert_eq!(transcriber.calls.load(Ordering::SeqCst), 0);
        assert_eq!(orch.state(), AppState::Idle);
    }

    #[test]
    fn chord_reset_runs_before_paste() {
        let reset_count = Arc::new(AtomicU32::new(0));
        let output = MockOutput::new(true);
        let (orch, rx) = orchestrator(
            MockCapture::with_samples(32_000),
            MockTranscriber::returning("hello"),
            MockFormatter {
                available: false,
                degraded: false,
            },
            Arc::clone(&output),
        );
        let counter = Arc::clone(&reset_count);
        orch.set_chord_reset(Arc::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        }));

        orch.on_hotkey_press();
        orch.on_hotkey_release();
        collect_until_idle(&rx);

        assert_eq!(reset_count.load(Ordering::SeqCst), 1);
        assert!(output.pasted.lock().unwrap().is_some());
    }
}
