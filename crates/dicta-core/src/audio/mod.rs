//! Microphone capture.

mod recorder;

pub use recorder::AudioRecorder;

use anyhow::Result;
use cpal::traits::{DeviceTrait, HostTrait};

/// Seam between the orchestrator and the microphone.
///
/// `stop()` returns the concatenated, length-capped sample buffer, or
/// `None` if no frames were captured.
pub trait CaptureSource: Send + Sync {
    fn start(&self) -> Result<()>;
    fn stop(&self) -> Option<Vec<f32>>;
}

/// Startup probe: is there a default input device at all?
///
/// Returns a human-readable description of the device that will be
/// used. A negative result aborts startup before the hotkey monitor
/// is installed.
pub fn check_microphone() -> Result<String> {
    let host = cpal::default_host();
    let device = host
        .default_input_device()
        .ok_or_else(|| anyhow::anyhow!("No microphone found"))?;
    let name = device
        .description()
        .map(|d| d.to_string())
        .unwrap_or_else(|_| "unknown input device".to_string());
    Ok(name)
}
