//! Win32 backend
//!
//! Thin owners for the platform resources a run needs:
//! - `console`: the allocated console, its std streams and its window
//! - `window`: the hidden message window and its window procedure
//! - `indicator`: the notification-area icon bound to that window
//! - `icon`: the child's icon or the stock fallback
//! - `process`: child creation and the one-shot exit wait

pub mod console;
pub mod icon;
pub mod indicator;
pub mod process;
pub mod window;

use windows::Win32::UI::WindowsAndMessaging::WM_APP;

/// Callback message the indicator sends to the main window
pub const WM_TRAY_ICON: u32 = WM_APP;

/// Posted by the exit wait when the child terminates
pub const WM_CHILD_EXITED: u32 = WM_APP + 1;

/// Null-terminated UTF-16 copy of `s`
pub fn to_wide(s: &str) -> Vec<u16> {
    s.encode_utf16().chain(Some(0)).collect()
}

/// Text of the calling thread's last error
///
/// Must be called immediately after the failing API, before anything else
/// on this thread can overwrite the error code.
pub fn last_error_message() -> String {
    windows::core::Error::from_win32().message().to_string_lossy()
}
