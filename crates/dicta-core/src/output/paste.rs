//! Copy-then-paste with focus-restore retry.

use std::sync::Mutex;
use std::time::Duration;

use super::{Clipboard, FocusController, WindowHandle};
use crate::settings::OutputSettings;

/// Contract the orchestrator drives at the end of a session.
pub trait TextOutput: Send + Sync {
    /// Copy `text` to the clipboard and, when auto-paste is enabled,
    /// paste it into `target` (or the current focus when no snapshot
    /// is available). Returns overall success.
    fn copy_and_paste(&self, text: &str, target: Option<&WindowHandle>) -> bool;
}

/// The focus-preserving paste pipeline.
///
/// A clipboard failure short-circuits the whole operation. Focus
/// restoration is retried up to `max_paste_attempts` with a backoff
/// between attempts; the final attempt pastes even without verified
/// focus, degrading gracefully rather than silently doing nothing.
pub struct PastePipeline<C: Clipboard, F: FocusController> {
    clipboard: Mutex<C>,
    focus: F,
    settings: OutputSettings,
}

impl<C: Clipboard, F: FocusController> PastePipeline<C, F> {
    pub fn new(clipboard: C, focus: F, settings: OutputSettings) -> Self {
        Self {
            clipboard: Mutex::new(clipboard),
            focus,
            settings,
        }
    }
}

impl<C: Clipboard, F: FocusController> TextOutput for PastePipeline<C, F> {
    fn copy_and_paste(&self, text: &str, target: Option<&WindowHandle>) -> bool {
        if text.is_empty() {
            return false;
        }

        if let Err(e) = self.clipboard.lock().unwrap().set_text(text) {
            crate::verbose!("Clipboard error: {e:#}");
            return false;
        }

        if !self.settings.auto_paste {
            return true;
        }

        let max_attempts = self.settings.max_paste_attempts.max(1);
        for attempt in 1..=max_attempts {
            let focus_ok = match target {
                Some(t) => self.focus.restore_focus(t),
                None => true,
            };

            if !focus_ok && attempt < max_attempts {
                crate::verbose!(
                    "Paste attempt {attempt}/{max_attempts}: focus not acquired, retrying"
                );
                std::thread::sleep(Duration::from_millis(self.settings.retry_backoff_ms));
                continue;
            }

            std::thread::sleep(Duration::from_millis(self.settings.paste_delay_ms));

            match self.focus.send_paste() {
                Ok(()) => {
                    if attempt > 1 {
                        crate::verbose!("Paste succeeded on attempt {attempt}");
                    }
                    return true;
                }
                Err(e) => {
                    crate::verbose!("Paste attempt {attempt}/{max_attempts} error: {e:#}");
                    if attempt < max_attempts {
                        std::thread::sleep(Duration::from_millis(self.settings.retry_backoff_ms));
                    }
                }
            }
        }

        false
    }
}
