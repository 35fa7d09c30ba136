//! Application state published by the session orchestrator.

use std::fmt;

/// Phase of the push-to-talk cycle.
///
/// Exactly one value is live at any instant; the orchestrator is the
/// only writer and every change is published to the indicator channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppState {
    Idle,
    Recording,
    Transcribing,
    Formatting,
    Pasting,
    Error,
}

impl fmt::Display for AppState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            AppState::Idle => "idle",
            AppState::Recording => "recording",
            AppState::Transcribing => "transcribing",
            AppState::Formatting => "formatting",
            AppState::Pasting => "pasting",
            AppState::Error => "error",
        };
        write!(f, "{s}")
    }
}

/// A committed state transition, delivered asynchronously to the
/// status indicator. The message is only populated for `Error`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StateUpdate {
    pub state: AppState,
    pub message: Option<String>,
}
