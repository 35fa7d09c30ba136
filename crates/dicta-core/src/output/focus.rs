//! Foreground-window snapshot, restoration and the paste keystroke.
//!
//! Windows refuses SetForegroundWindow from a background process. The
//! workaround is to attach our thread's input queue to the target
//! window's owning thread, make the call, then detach. After a settle
//! delay the foreground window is re-read to verify the change took;
//! that verification is the operation's success signal.
//!
//! On other platforms there is no equivalent restriction for a
//! background CLI process, so the snapshot is unavailable and
//! restoration is a no-op success: the paste keystroke simply goes to
//! whichever window holds focus.

use anyhow::Result;
use std::time::Duration;

use super::WindowHandle;

/// Capability interface over the OS focus/keystroke services, so the
/// paste pipeline can be exercised without a window system.
pub trait FocusController: Send + Sync {
    /// Identity of the window currently receiving keyboard input.
    fn foreground_window(&self) -> Option<WindowHandle>;

    /// Try to give `target` keyboard focus; true iff the foreground
    /// window matches the target after the attempt.
    fn restore_focus(&self, target: &WindowHandle) -> bool;

    /// Emit a paste keystroke (Ctrl+V) into the focused window.
    fn send_paste(&self) -> Result<()>;
}

/// Platform implementation backed by Win32 calls and enigo.
pub struct NativeFocus {
    settle: Duration,
}

impl NativeFocus {
    /// `settle` is the pause after a focus-change request, before the
    /// change is verified.
    pub fn new(settle: Duration) -> Self {
        Self { settle }
    }

    fn send_ctrl_v(&self) -> Result<()> {
        use enigo::{Direction, Enigo, Key, Keyboard, Settings};

        let mut enigo =
            Enigo::new(&Settings::default()).map_err(|e| anyhow::anyhow!("enigo init: {e}"))?;
        enigo
            .key(Key::Control, Direction::Press)
            .map_err(|e| anyhow::anyhow!("key press: {e}"))?;
        enigo
            .key(Key::Unicode('v'), Direction::Click)
            .map_err(|e| anyhow::anyhow!("key click: {e}"))?;
        enigo
            .key(Key::Control, Direction::Release)
            .map_err(|e| anyhow::anyhow!("key release: {e}"))?;
        Ok(())
    }
}

#[cfg(windows)]
impl FocusController for NativeFocus {
    fn foreground_window(&self) -> Option<WindowHandle> {
        use windows::Win32::UI::WindowsAndMessaging::GetForegroundWindow;

        let hwnd = unsafe { GetForegroundWindow() };
        if hwnd.0.is_null() {
            None
        } else {
            Some(WindowHandle(hwnd.0 as isize))
        }
    }

    fn restore_focus(&self, target: &WindowHandle) -> bool {
        use windows::Win32::Foundation::HWND;
        use windows::Win32::System::Threading::GetCurrentThreadId;
        use windows::Win32::UI::Input::KeyboardAndMouse::AttachThreadInput;
        use windows::Win32::UI::WindowsAndMessaging::{
            BringWindowToTop, GetForegroundWindow, GetWindowThreadProcessId, SW_SHOW,
            SetForegroundWindow, ShowWindow,
        };

        let hwnd = HWND(target.0 as _);

        unsafe {
            if GetForegroundWindow() == hwnd {
                crate::verbose!("Target window already has focus ({:?})", target);
                return true;
            }

            let target_tid = GetWindowThreadProcessId(hwnd, None);
            let current_tid = GetCurrentThreadId();

            if target_tid != current_tid {
                let _ = AttachThreadInput(current_tid, target_tid, true);
            }

            // BringWindowToTop works more reliably while the input
            // queues are attached.
            let _ = BringWindowToTop(hwnd);
            let _ = ShowWindow(hwnd, SW_SHOW);
            let _ = SetForegroundWindow(hwnd);

            if target_tid != current_tid {
                let _ = AttachThreadInput(current_tid, target_tid, false);
            }
        }

        // Let the window manager finish the transition, then verify.
        std::thread::sleep(self.settle);
        let restored = unsafe { GetForegroundWindow() } == hwnd;
        if !restored {
            crate::verbose!("Focus restore failed: foreground is not {:?}", target);
        }
        restored
    }

    fn send_paste(&self) -> Result<()> {
        self.send_ctrl_v()
    }
}

#[cfg(not(windows))]
impl FocusController for NativeFocus {
    fn foreground_window(&self) -> Option<WindowHandle> {
        None
    }

    fn restore_focus(&self, _target: &WindowHandle) -> bool {
        // No restore needed; settle anyway so paste timing matches
        // the windowed platforms.
        std::thread::sleep(self.settle);
        true
    }

    fn send_paste(&self) -> Result<()> {
        self.send_ctrl_v()
    }
}
