//! LLM-based transcript cleanup.
//!
//! Raw dictation usually needs punctuation and capitalization fixed.
//! The formatter is strictly best-effort: on disable, missing
//! credentials, blank input, or exhausted retries it returns the
//! transcript unchanged. A hard failure never escapes this module.

use anyhow::{Context, Result, anyhow};
use serde::Deserialize;

use crate::settings::FormattingSettings;

/// Contract between the orchestrator and the cleanup service.
pub trait TranscriptFormatter: Send + Sync {
    /// Whether a formatting call would do anything at all; when false
    /// the orchestrator skips the `Formatting` phase entirely.
    fn is_available(&self) -> bool;

    /// Clean up a transcript, falling back to the input on failure.
    fn format(&self, text: &str) -> String;
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: Message,
}

#[derive(Debug, Deserialize)]
struct Message {
    content: String,
}

/// OpenAI-compatible chat completions formatter with bounded retry.
pub struct OpenAiFormatter {
    settings: FormattingSettings,
    api_key: Option<String>,
}

impl OpenAiFormatter {
    pub fn new(settings: FormattingSettings, api_key: Option<String>) -> Self {
        Self { settings, api_key }
    }

    fn request(&self, text: &str, api_key: &str) -> Result<String> {
        let client = reqwest::blocking::Client::builder()
            .timeout(std::time::Duration::from_secs(self.settings.timeout_secs))
            .build()
            .context("Failed to create HTTP client")?;

        let response = client
            .post(&self.settings.api_url)
            .header("Authorization", format!("Bearer {api_key}"))
            .json(&serde_json::json!({
                "model": self.settings.model,
                "max_tokens": 1024,
                "messages": [
                    {"role": "system", "content": self.settings.effective_prompt()},
                    {"role": "user", "content": text}
                ]
            }))
            .send()
            .context("Failed to send formatting request")?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response
                .text()
                .unwrap_or_else(|_| "Unknown error".to_string());
            anyhow::bail!("Formatting API error ({status}): {error_text}");
        }

        let chat: ChatResponse = response
            .json()
            .context("Failed to parse formatting response")?;

        let content = chat
            .choices
            .first()
            .map(|c| c.message.content.trim().to_string())
            .ok_or_else(|| anyhow!("Empty formatting response"))?;

        if content.is_empty() {
            anyhow::bail!("Formatting returned blank text");
        }
        Ok(content)
    }
}

impl TranscriptFormatter for OpenAiFormatter {
    fn is_available(&self) -> bool {
        self.settings.enabled && self.api_key.is_some()
    }

    fn format(&self, text: &str) -> String {
        if text.trim().is_empty() || !self.settings.enabled {
            return text.to_string();
        }
        let Some(api_key) = self.api_key.as_deref() else {
            crate::verbose!("OPENAI_API_KEY not set, skipping formatting");
            return text.to_string();
        };

        for attempt in 1..=self.settings.max_retries {
            match self.request(text, api_key) {
                Ok(formatted) => return formatted,
                Err(e) => {
                    crate::verbose!(
                        "Formatting attempt {attempt}/{} failed: {e:#}",
                        self.settings.max_retries
                    );
                }
            }
        }

        // Retries exhausted: degrade to the raw transcript.
        text.to_string()
    }
}
