//! Core library for dicta: push-to-talk dictation.
//!
//! Hold the chord, speak, release; the capture is transcribed,
//! cleaned up, copied to the clipboard and pasted back into the
//! window that had focus when the chord went down.

pub mod audio;
pub mod error;
pub mod formatting;
pub mod hotkey;
pub mod output;
pub mod session;
pub mod settings;
pub mod state;
pub mod transcription;
pub mod verbose;

pub use audio::{AudioRecorder, CaptureSource, check_microphone};
pub use error::DictationError;
pub use formatting::{OpenAiFormatter, TranscriptFormatter};
pub use hotkey::{Chord, ChordEdge, ChordTracker, HotkeyMonitor};
pub use output::{
    Clipboard, FocusController, NativeFocus, PastePipeline, SystemClipboard, TextOutput,
    WindowHandle,
};
pub use session::{SessionConfig, SessionOrchestrator};
pub use settings::{DEFAULT_FORMATTING_PROMPT, Settings};
pub use state::{AppState, StateUpdate};
pub use transcription::{OpenAiTranscriber, Transcriber};
pub use verbose::set_verbose;
