mod app;
mod indicator;

use clap::Parser;
use std::path::PathBuf;

use dicta_core::Settings;

/// Push-to-talk dictation: hold a hotkey, speak, release, paste.
#[derive(Parser)]
#[command(name = "dicta", version, about)]
struct Cli {
    /// Override the push-to-talk chord, e.g. "ctrl+shift"
    #[arg(long)]
    hotkey: Option<String>,

    /// Copy the transcript to the clipboard but never send the paste
    /// keystroke
    #[arg(long)]
    no_paste: bool,

    /// Load settings from an explicit file instead of the default
    /// config path
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Print diagnostics to stderr
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    dicta_core::set_verbose(cli.verbose);

    let mut settings = match &cli.config {
        Some(path) => Settings::load_from(Some(path.clone())),
        None => Settings::load(),
    };
    if let Some(hotkey) = cli.hotkey {
        settings.hotkey = hotkey;
    }
    if cli.no_paste {
        settings.output.auto_paste = false;
    }

    app::run(settings).await
}
