//! Persistent settings with sensible defaults.
//!
//! Settings live in `~/.config/dicta/settings.json` (platform config
//! dir). Every field has a serde default so old files keep loading as
//! new knobs are added. Retry counts and delays are deliberately
//! configuration, not constants.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

pub const DEFAULT_FORMATTING_PROMPT: &str = "Fix grammar and punctuation. \
Capitalize appropriately. Maintain meaning. Return only corrected text.";

/// Audio capture settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AudioSettings {
    /// Capture sample rate in Hz
    #[serde(default = "default_sample_rate")]
    pub sample_rate: u32,

    /// Hard cap on recording length; excess tail is silently dropped
    #[serde(default = "default_max_seconds")]
    pub max_seconds: u32,

    /// Captures shorter than this many samples are treated as silence
    #[serde(default = "default_min_capture_samples")]
    pub min_capture_samples: usize,
}

fn default_sample_rate() -> u32 {
    16_000
}

fn default_max_seconds() -> u32 {
    60
}

fn default_min_capture_samples() -> usize {
    // ~0.1s at 16kHz
    1_600
}

impl Default for AudioSettings {
    fn default() -> Self {
        Self {
            sample_rate: default_sample_rate(),
            max_seconds: default_max_seconds(),
            min_capture_samples: default_min_capture_samples(),
        }
    }
}

/// Speech-to-text gateway settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscriptionSettings {
    #[serde(default = "default_transcription_model")]
    pub model: String,

    /// OpenAI-compatible transcriptions endpoint
    #[serde(default = "default_transcription_url")]
    pub api_url: String,

    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_transcription_model() -> String {
    "whisper-1".to_string()
}

fn default_transcription_url() -> String {
    "https://api.openai.com/v1/audio/transcriptions".to_string()
}

fn default_timeout_secs() -> u64 {
    60
}

impl Default for TranscriptionSettings {
    fn default() -> Self {
        Self {
            model: default_transcription_model(),
            api_url: default_transcription_url(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

/// Transcript cleanup (LLM formatting) settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FormattingSettings {
    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default = "default_formatting_model")]
    pub model: String,

    /// OpenAI-compatible chat completions endpoint
    #[serde(default = "default_formatting_url")]
    pub api_url: String,

    /// System prompt for the cleanup call (None = built-in default)
    #[serde(default)]
    pub prompt: Option<String>,

    /// Attempts before giving up and passing the transcript through
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_formatting_model() -> String {
    "gpt-4o-mini".to_string()
}

fn default_formatting_url() -> String {
    "https://api.openai.com/v1/chat/completions".to_string()
}

fn default_max_retries() -> u32 {
    3
}

fn default_true() -> bool {
    true
}

impl Default for FormattingSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            model: default_formatting_model(),
            api_url: default_formatting_url(),
            prompt: None,
            max_retries: default_max_retries(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl FormattingSettings {
    /// Effective system prompt for the cleanup call.
    pub fn effective_prompt(&self) -> &str {
        self.prompt.as_deref().unwrap_or(DEFAULT_FORMATTING_PROMPT)
    }
}

/// Clipboard and paste pipeline settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputSettings {
    /// Paste into the previously focused window after copying
    #[serde(default = "default_true")]
    pub auto_paste: bool,

    /// Pause before sending the paste keystroke
    #[serde(default = "default_paste_delay_ms")]
    pub paste_delay_ms: u64,

    /// Pause after a focus-change request before verifying it took
    #[serde(default = "default_focus_settle_ms")]
    pub focus_settle_ms: u64,

    /// Pause between focus-restore attempts
    #[serde(default = "default_retry_backoff_ms")]
    pub retry_backoff_ms: u64,

    /// Focus-restore attempts before pasting blind
    #[serde(default = "default_max_paste_attempts")]
    pub max_paste_attempts: u32,

    /// Pause after a successful paste before returning to idle,
    /// letting the synthetic key events drain
    #[serde(default = "default_idle_settle_ms")]
    pub idle_settle_ms: u64,
}

fn default_paste_delay_ms() -> u64 {
    100
}

fn default_focus_settle_ms() -> u64 {
    100
}

fn default_retry_backoff_ms() -> u64 {
    200
}

fn default_max_paste_attempts() -> u32 {
    3
}

fn default_idle_settle_ms() -> u64 {
    150
}

impl Default for OutputSettings {
    fn default() -> Self {
        Self {
            auto_paste: true,
            paste_delay_ms: default_paste_delay_ms(),
            focus_settle_ms: default_focus_settle_ms(),
            retry_backoff_ms: default_retry_backoff_ms(),
            max_paste_attempts: default_max_paste_attempts(),
            idle_settle_ms: default_idle_settle_ms(),
        }
    }
}

/// How long each error kind stays on screen before auto-clearing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResetSettings {
    #[serde(default = "default_mic_error_ms")]
    pub mic_error_ms: u64,

    #[serde(default = "default_recoverable_ms")]
    pub no_speech_ms: u64,

    #[serde(default = "default_recoverable_ms")]
    pub paste_error_ms: u64,
}

fn default_mic_error_ms() -> u64 {
    2_000
}

fn default_recoverable_ms() -> u64 {
    1_500
}

impl Default for ErrorResetSettings {
    fn default() -> Self {
        Self {
            mic_error_ms: default_mic_error_ms(),
            no_speech_ms: default_recoverable_ms(),
            paste_error_ms: default_recoverable_ms(),
        }
    }
}

/// Top-level settings aggregate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub audio: AudioSettings,

    #[serde(default)]
    pub transcription: TranscriptionSettings,

    #[serde(default)]
    pub formatting: FormattingSettings,

    #[serde(default)]
    pub output: OutputSettings,

    #[serde(default)]
    pub error_reset: ErrorResetSettings,

    /// Push-to-talk chord, e.g. "ctrl+shift"
    #[serde(default = "default_hotkey")]
    pub hotkey: String,
}

fn default_hotkey() -> String {
    "ctrl+shift".to_string()
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            audio: AudioSettings::default(),
            transcription: TranscriptionSettings::default(),
            formatting: FormattingSettings::default(),
            output: OutputSettings::default(),
            error_reset: ErrorResetSettings::default(),
            hotkey: default_hotkey(),
        }
    }
}

impl Settings {
    /// Path to the settings file (platform config dir).
    pub fn config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join("dicta").join("settings.json"))
    }

    /// Load settings, falling back to defaults when the file is
    /// missing or unreadable. A broken file is reported, not fatal.
    pub fn load() -> Self {
        Self::load_from(Self::config_path())
    }

    /// Load settings from an explicit path (None = defaults).
    pub fn load_from(path: Option<PathBuf>) -> Self {
        let Some(path) = path else {
            return Self::default();
        };
        match std::fs::read_to_string(&path) {
            Ok(contents) => match serde_json::from_str(&contents) {
                Ok(settings) => settings,
                Err(e) => {
                    eprintln!("Warning: ignoring malformed {}: {e}", path.display());
                    Self::default()
                }
            },
            Err(_) => Self::default(),
        }
    }

    /// Persist settings to the config path.
    pub fn save(&self) -> Result<()> {
        let path = Self::config_path().context("No config directory available")?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(&path, json)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        Ok(())
    }

    /// API key for the OpenAI-backed gateways, from the environment.
    pub fn api_key() -> Option<String> {
        std::env::var("OPENAI_API_KEY")
            .ok()
            .filter(|k| !k.is_empty())
    }
}
