//! Error taxonomy for the dictation pipeline.
//!
//! Only startup failures are fatal (no microphone, hotkey hook install
//! failure). Everything mid-session becomes an `Error` state with a
//! short message and auto-clears back to `Idle` after a delay.
//! Formatting degradation is deliberately absent: a failed cleanup
//! call falls back to the raw transcript and is never surfaced.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum DictationError {
    #[error("Microphone error: {0}")]
    MicrophoneUnavailable(String),

    #[error("No speech detected")]
    NoSpeechDetected,

    #[error("Transcription failed: {0}")]
    TranscriptionFailed(String),

    #[error("Paste failed")]
    PasteFailed,

    #[error("Failed to install keyboard hook: {0}")]
    HotkeyHookFailed(String),
}

impl DictationError {
    /// Short message published alongside the `Error` state.
    pub fn user_message(&self) -> &'static str {
        match self {
            DictationError::MicrophoneUnavailable(_) => "Microphone error",
            // An empty or failed transcription is indistinguishable
            // from silence as far as the user is concerned.
            DictationError::NoSpeechDetected | DictationError::TranscriptionFailed(_) => {
                "No speech detected"
            }
            DictationError::PasteFailed => "Paste failed",
            DictationError::HotkeyHookFailed(_) => "Hotkey hook failed",
        }
    }
}
