//! cpal-backed microphone recorder.
//!
//! Frames are appended under a short lock while an atomic capture
//! flag is set. Stopping clears the flag before draining the buffer,
//! so a frame arriving mid-drain is discarded rather than racing.

use anyhow::{Context, Result};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{BufferSize, Device, SampleFormat, SampleRate, Stream, StreamConfig};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use super::CaptureSource;

/// Stream errors are common on Linux (especially USB audio) and
/// non-fatal; log the first and suppress the rest of the session.
static STREAM_ERROR_COUNT: AtomicU64 = AtomicU64::new(0);

/// Records 16kHz-style mono f32 audio from the default input device.
pub struct AudioRecorder {
    sample_rate: u32,
    max_samples: usize,
    recording: Arc<AtomicBool>,
    samples: Arc<Mutex<Vec<f32>>>,
    stream: Mutex<Option<Stream>>,
}

impl AudioRecorder {
    /// `max_seconds` caps the returned buffer; the excess tail is
    /// silently dropped, never an error.
    pub fn new(sample_rate: u32, max_seconds: u32) -> Self {
        Self {
            sample_rate,
            max_samples: sample_rate as usize * max_seconds as usize,
            recording: Arc::new(AtomicBool::new(false)),
            samples: Arc::new(Mutex::new(Vec::new())),
            stream: Mutex::new(None),
        }
    }

    fn build_stream<T>(&self, device: &Device, config: &StreamConfig) -> Result<Stream>
    where
        T: cpal::Sample + cpal::SizedSample,
        f32: cpal::FromSample<T>,
    {
        let samples = Arc::clone(&self.samples);
        let recording = Arc::clone(&self.recording);

        let err_fn = |err| {
            let count = STREAM_ERROR_COUNT.fetch_add(1, Ordering::Relaxed);
            if count == 0 {
                crate::verbose!("Audio stream error (non-fatal): {err}");
            }
        };

        let stream = device.build_input_stream(
            config,
            move |data: &[T], _: &cpal::InputCallbackInfo| {
                if !recording.load(Ordering::SeqCst) {
                    return;
                }
                let mut buf = samples.lock().unwrap();
                buf.extend(data.iter().map(|&s| -> f32 { cpal::Sample::from_sample(s) }));
            },
            err_fn,
            None,
        )?;

        Ok(stream)
    }
}

impl CaptureSource for AudioRecorder {
    fn start(&self) -> Result<()> {
        STREAM_ERROR_COUNT.store(0, Ordering::Relaxed);
        self.samples.lock().unwrap().clear();

        let host = cpal::default_host();
        let device = host
            .default_input_device()
            .context("No input device available")?;

        let sample_format = device
            .default_input_config()
            .context("Failed to query input config")?
            .sample_format();

        let config = StreamConfig {
            channels: 1,
            sample_rate: self.sample_rate as SampleRate,
            buffer_size: BufferSize::Default,
        };

        let stream = match sample_format {
            SampleFormat::F32 => self.build_stream::<f32>(&device, &config),
            SampleFormat::I16 => self.build_stream::<i16>(&device, &config),
            SampleFormat::U16 => self.build_stream::<u16>(&device, &config),
            other => anyhow::bail!("Unsupported sample format: {other:?}"),
        }
        .context("Failed to build input stream")?;

        self.recording.store(true, Ordering::SeqCst);
        stream.play().context("Failed to start input stream")?;
        *self.stream.lock().unwrap() = Some(stream);

        Ok(())
    }

    fn stop(&self) -> Option<Vec<f32>> {
        // Clear the flag first so frames arriving after this point
        // are dropped, then tear the stream down and drain.
        self.recording.store(false, Ordering::SeqCst);

        if let Some(stream) = self.stream.lock().unwrap().take() {
            drop(stream);
        }

        let mut audio = std::mem::take(&mut *self.samples.lock().unwrap());
        if audio.is_empty() {
            return None;
        }
        audio.truncate(self.max_samples);
        Some(audio)
    }
}
