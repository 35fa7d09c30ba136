//! Opt-in diagnostic tracing.
//!
//! Enabled with the CLI's `--verbose` flag or by setting the
//! `DICTA_DEBUG` environment variable. Lines go to stderr tagged with
//! the emitting module, so one session can be followed across the
//! hotkey, worker and timer threads.

use std::sync::OnceLock;
use std::sync::atomic::{AtomicBool, Ordering};

static ENABLED: AtomicBool = AtomicBool::new(false);
static ENV_ENABLED: OnceLock<bool> = OnceLock::new();

pub fn set_verbose(enabled: bool) {
    ENABLED.store(enabled, Ordering::Relaxed);
}

pub fn is_verbose() -> bool {
    ENABLED.load(Ordering::Relaxed)
        || *ENV_ENABLED.get_or_init(|| std::env::var_os("DICTA_DEBUG").is_some())
}

/// Trace a formatted line when verbose mode is on.
#[macro_export]
macro_rules! verbose {
    ($($arg:tt)*) => {
        if $crate::verbose::is_verbose() {
            eprintln!("[{}] {}", module_path!(), format_args!($($arg)*));
        }
    };
}
