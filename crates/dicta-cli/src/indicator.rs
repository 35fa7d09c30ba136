//! Terminal status indicator.
//!
//! Consumes the orchestrator's state-update channel on its own thread
//! and renders a one-line colored status pill. The hand-off is an
//! unbounded channel, so rendering can never block a transition.

use std::io::Write;

use console::style;
use crossbeam_channel::Receiver;
use dicta_core::{AppState, StateUpdate};

pub fn spawn(updates: Receiver<StateUpdate>) -> std::thread::JoinHandle<()> {
    std::thread::spawn(move || {
        for update in updates.iter() {
            render(&update);
        }
    })
}

fn render(update: &StateUpdate) {
    let pill = match update.state {
        AppState::Idle => style("● idle").dim(),
        AppState::Recording => style("● recording").red().bold(),
        AppState::Transcribing => style("● transcribing").yellow(),
        AppState::Formatting => style("● formatting").yellow(),
        AppState::Pasting => style("● pasting").green(),
        AppState::Error => style("● error").red(),
    };

    let line = match &update.message {
        Some(msg) => format!("{pill} - {msg}"),
        None => pill.to_string(),
    };

    // Overwrite the previous status in place.
    print!("\r\x1b[2K{line}");
    let _ = std::io::stdout().flush();
}
