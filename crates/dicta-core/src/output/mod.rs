//! Clipboard output and the focus-preserving paste pipeline.

mod focus;
mod paste;

pub use focus::{FocusController, NativeFocus};
pub use paste::{PastePipeline, TextOutput};

use anyhow::{Context, Result};

/// Opaque identity of an OS window, snapshotted at session start and
/// immutable for the session's lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowHandle(pub isize);

/// Minimal clipboard contract, mockable for tests.
pub trait Clipboard: Send {
    fn set_text(&mut self, text: &str) -> Result<()>;
    fn get_text(&mut self) -> Result<String>;
}

/// System clipboard via arboard.
pub struct SystemClipboard {
    inner: arboard::Clipboard,
}

impl SystemClipboard {
    pub fn new() -> Result<Self> {
        Ok(Self {
            inner: arboard::Clipboard::new().context("Failed to access clipboard")?,
        })
    }
}

impl Clipboard for SystemClipboard {
    fn set_text(&mut self, text: &str) -> Result<()> {
        self.inner
            .set_text(text)
            .context("Failed to copy text to clipboard")
    }

    fn get_text(&mut self) -> Result<String> {
        self.inner
            .get_text()
            .context("Failed to read clipboard text")
    }
}
