/// Console allocated for the child and the wrapper's own messages
use crate::error::WrapperError;
use crate::visibility::ConsoleDisplay;
use anyhow::{Context, Result};
use std::io::{Read, Write};
use windows::core::PCWSTR;
use windows::Win32::Foundation::{HANDLE, HWND, LPARAM, WPARAM};
use windows::Win32::Storage::FileSystem::{
    CreateFileW, FILE_ATTRIBUTE_NORMAL, FILE_GENERIC_READ, FILE_GENERIC_WRITE, FILE_SHARE_READ,
    FILE_SHARE_WRITE, OPEN_EXISTING,
};
use windows::Win32::System::Console::{
    AllocConsole, FlushConsoleInputBuffer, FreeConsole, GetConsoleMode, GetConsoleWindow,
    GetStdHandle, SetConsoleMode, SetStdHandle, CONSOLE_MODE, ENABLE_ECHO_INPUT,
    ENABLE_LINE_INPUT, STD_ERROR_HANDLE, STD_INPUT_HANDLE, STD_OUTPUT_HANDLE,
};
use windows::Win32::UI::WindowsAndMessaging::{
    SendMessageW, ShowWindowAsync, HICON, ICON_BIG, ICON_SMALL, SW_HIDE, SW_SHOW, WM_SETICON,
};

use super::to_wide;

/// Console window handle, used to show, hide and decorate it
#[derive(Debug, Clone, Copy)]
pub struct ConsoleWindow(HWND);

impl ConsoleWindow {
    pub fn from_hwnd(hwnd: HWND) -> Self {
        Self(hwnd)
    }

    /// Put `icon` in the console's title bar and taskbar button
    pub fn set_icon(&self, icon: HICON) {
        unsafe {
            SendMessageW(
                self.0,
                WM_SETICON,
                WPARAM(ICON_SMALL as usize),
                LPARAM(icon.0),
            );
            SendMessageW(self.0, WM_SETICON, WPARAM(ICON_BIG as usize), LPARAM(icon.0));
        }
    }
}

impl ConsoleDisplay for ConsoleWindow {
    fn set_visible(&self, visible: bool) {
        // Async so the dispatch thread never waits on the console host
        unsafe {
            let _ = ShowWindowAsync(self.0, if visible { SW_SHOW } else { SW_HIDE });
        }
    }
}

/// An allocated console; freed on drop
pub struct ConsoleSession {
    window: ConsoleWindow,
}

impl ConsoleSession {
    /// Allocate a fresh console for this process
    pub fn allocate() -> Result<Self, WrapperError> {
        unsafe {
            AllocConsole()
                .map_err(|e| WrapperError::ConsoleAttach(e.message().to_string_lossy()))?;

            let hwnd = GetConsoleWindow();
            if hwnd.0 == 0 {
                let _ = FreeConsole();
                return Err(WrapperError::ConsoleAttach(
                    "console has no window".to_string(),
                ));
            }

            tracing::debug!("Console allocated");
            Ok(Self {
                window: ConsoleWindow(hwnd),
            })
        }
    }

    pub fn window(&self) -> ConsoleWindow {
        self.window
    }

    /// Point stdout, stderr and stdin at the console
    pub fn redirect_std_streams(&self) -> Result<()> {
        let output = open_console_device("CONOUT$").context("Failed to open CONOUT$")?;
        let input = open_console_device("CONIN$").context("Failed to open CONIN$")?;

        unsafe {
            SetStdHandle(STD_OUTPUT_HANDLE, output).context("Failed to set stdout")?;
            SetStdHandle(STD_ERROR_HANDLE, output).context("Failed to set stderr")?;
            SetStdHandle(STD_INPUT_HANDLE, input).context("Failed to set stdin")?;
        }

        Ok(())
    }

    /// Print the pause prompt and wait for a single key press
    pub fn pause(&self) {
        print!("Press any key to continue . . .");
        let _ = std::io::stdout().flush();

        if let Err(e) = wait_for_key() {
            tracing::warn!("Failed to wait for a key press: {}", e);
        }
        println!();
    }
}

impl Drop for ConsoleSession {
    fn drop(&mut self) {
        unsafe {
            let _ = FreeConsole();
        }
        tracing::debug!("Console freed");
    }
}

fn open_console_device(name: &str) -> Result<HANDLE> {
    let wide = to_wide(name);
    let handle = unsafe {
        CreateFileW(
            PCWSTR(wide.as_ptr()),
            (FILE_GENERIC_READ.0 | FILE_GENERIC_WRITE.0).into(),
            FILE_SHARE_READ | FILE_SHARE_WRITE,
            None,
            OPEN_EXISTING,
            FILE_ATTRIBUTE_NORMAL,
            HANDLE::default(),
        )?
    };
    Ok(handle)
}

/// Read one key from the console without line buffering or echo
fn wait_for_key() -> Result<()> {
    unsafe {
        let input = GetStdHandle(STD_INPUT_HANDLE)?;
        let _ = FlushConsoleInputBuffer(input);

        let mut original = CONSOLE_MODE::default();
        GetConsoleMode(input, &mut original)?;
        SetConsoleMode(input, original & !(ENABLE_LINE_INPUT | ENABLE_ECHO_INPUT))?;

        let mut buffer = [0u8; 16];
        let read = std::io::stdin().read(&mut buffer);

        let _ = SetConsoleMode(input, original);
        read?;
    }
    Ok(())
}
