//! Speech-to-text gateway.
//!
//! The orchestrator only depends on the `Transcriber` contract: mono
//! samples in, best-effort transcript out. The OpenAI-compatible
//! implementation uploads an in-memory WAV as a single blocking call;
//! any provider-side retry is opaque to the core.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::io::Cursor;

use crate::settings::TranscriptionSettings;

/// Contract between the orchestrator and the speech-to-text service.
///
/// `Ok(None)` means the call succeeded but produced no usable text,
/// which the orchestrator reports as "no speech detected".
pub trait Transcriber: Send + Sync {
    fn transcribe(&self, samples: &[f32], sample_rate: u32) -> Result<Option<String>>;
}

#[derive(Deserialize)]
struct TranscriptionResponse {
    text: String,
}

/// OpenAI-compatible transcriptions endpoint (multipart WAV upload).
pub struct OpenAiTranscriber {
    settings: TranscriptionSettings,
    api_key: String,
}

impl OpenAiTranscriber {
    pub fn new(settings: TranscriptionSettings, api_key: String) -> Self {
        Self { settings, api_key }
    }
}

/// Encode f32 mono samples as an in-memory 16-bit PCM WAV.
pub fn samples_to_wav(samples: &[f32], sample_rate: u32) -> Result<Vec<u8>> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let mut cursor = Cursor::new(Vec::new());
    {
        let mut writer =
            hound::WavWriter::new(&mut cursor, spec).context("Failed to create WAV writer")?;
        for &s in samples {
            let clamped = s.clamp(-1.0, 1.0);
            writer
                .write_sample((clamped * i16::MAX as f32) as i16)
                .context("Failed to write WAV sample")?;
        }
        writer.finalize().context("Failed to finalize WAV")?;
    }

    Ok(cursor.into_inner())
}

impl Transcriber for OpenAiTranscriber {
    fn transcribe(&self, samples: &[f32], sample_rate: u32) -> Result<Option<String>> {
        if samples.is_empty() {
            return Ok(None);
        }

        let wav_data = samples_to_wav(samples, sample_rate)?;

        let client = reqwest::blocking::Client::builder()
            .timeout(std::time::Duration::from_secs(self.settings.timeout_secs))
            .build()
            .context("Failed to create HTTP client")?;

        let form = reqwest::blocking::multipart::Form::new()
            .text("model", self.settings.model.clone())
            .part(
                "file",
                reqwest::blocking::multipart::Part::bytes(wav_data)
                    .file_name("audio.wav")
                    .mime_str("audio/wav")?,
            );

        let response = client
            .post(&self.settings.api_url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .multipart(form)
            .send()
            .context("Failed to send transcription request")?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response
                .text()
                .unwrap_or_else(|_| "Unknown error".to_string());
            anyhow::bail!("Transcription API error ({status}): {error_text}");
        }

        let resp: TranscriptionResponse = response
            .json()
            .context("Failed to parse transcription response")?;

        let text = resp.text.trim().to_string();
        Ok(if text.is_empty() { None } else { Some(text) })
    }
}
