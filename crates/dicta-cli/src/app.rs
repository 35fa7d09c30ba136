//! Startup checks and component wiring.

use anyhow::{Context, Result};
use std::sync::Arc;
use std::time::Duration;

use dicta_core::{
    AudioRecorder, Chord, HotkeyMonitor, NativeFocus, OpenAiFormatter, OpenAiTranscriber,
    PastePipeline, SessionConfig, SessionOrchestrator, Settings, SystemClipboard,
    TranscriptFormatter, check_microphone,
};

use crate::indicator;

pub async fn run(settings: Settings) -> Result<()> {
    println!("dicta starting...");

    // Microphone presence is a hard startup precondition; a negative
    // probe aborts before the keyboard hook is installed.
    match check_microphone() {
        Ok(name) => println!("Microphone: {name}"),
        Err(e) => {
            eprintln!("Error: {e}");
            std::process::exit(1);
        }
    }

    let api_key = Settings::api_key();
    if api_key.is_some() {
        println!("Transcription: enabled");
    } else {
        println!("Transcription: disabled (OPENAI_API_KEY not set)");
    }

    let chord = Chord::parse(&settings.hotkey)
        .with_context(|| format!("Invalid hotkey '{}'", settings.hotkey))?;

    let capture = Arc::new(AudioRecorder::new(
        settings.audio.sample_rate,
        settings.audio.max_seconds,
    ));
    let transcriber = Arc::new(OpenAiTranscriber::new(
        settings.transcription.clone(),
        api_key.clone().unwrap_or_default(),
    ));
    let formatter = Arc::new(OpenAiFormatter::new(
        settings.formatting.clone(),
        api_key,
    ));
    if formatter.is_available() {
        println!("Formatting: enabled ({})", settings.formatting.model);
    } else {
        println!("Formatting: disabled");
    }

    let clipboard = SystemClipboard::new()?;
    let settle = Duration::from_millis(settings.output.focus_settle_ms);
    let output = Arc::new(PastePipeline::new(
        clipboard,
        NativeFocus::new(settle),
        settings.output.clone(),
    ));
    let focus = Arc::new(NativeFocus::new(settle));

    let (orchestrator, updates) = SessionOrchestrator::new(
        capture,
        transcriber,
        formatter,
        output,
        focus,
        SessionConfig::from_settings(&settings),
    );
    let orchestrator = Arc::new(orchestrator);

    let monitor = {
        let press = Arc::clone(&orchestrator);
        let release = Arc::clone(&orchestrator);
        HotkeyMonitor::new(
            chord,
            move || press.on_hotkey_press(),
            move || release.on_hotkey_release(),
        )
    };
    orchestrator.set_chord_reset(monitor.reset_hook());

    let _indicator = indicator::spawn(updates);

    monitor
        .start()
        .context("Failed to start the hotkey monitor")?;

    println!(
        "\nReady! Hold {} to record, release to transcribe.",
        settings.hotkey
    );
    println!("Press Ctrl+C to exit.\n");

    tokio::signal::ctrl_c()
        .await
        .context("Failed to wait for Ctrl+C")?;

    println!("\nShutting down...");
    monitor.stop();
    println!("Goodbye!");
    Ok(())
}
