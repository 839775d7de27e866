/// Child process creation and the one-shot exit notification
use crate::error::LaunchError;
use crate::supervisor::ChildProcess;
use anyhow::{anyhow, Context, Result};
use std::ffi::c_void;
use std::path::PathBuf;
use windows::core::{PCWSTR, PWSTR};
use windows::Win32::Foundation::{
    CloseHandle, BOOLEAN, FALSE, HANDLE, HWND, INVALID_HANDLE_VALUE, LPARAM, WAIT_FAILED, WPARAM,
};
use windows::Win32::System::Threading::{
    CreateProcessW, GetExitCodeProcess, QueryFullProcessImageNameW, RegisterWaitForSingleObject,
    TerminateProcess, UnregisterWaitEx, WaitForSingleObject, INFINITE, PROCESS_CREATION_FLAGS,
    PROCESS_INFORMATION, PROCESS_NAME_WIN32, STARTUPINFOW, WT_EXECUTEONLYONCE,
};
use windows::Win32::UI::WindowsAndMessaging::PostMessageW;

use super::WM_CHILD_EXITED;

/// Process handle of the running child; closed on drop
pub struct Win32Child {
    process: HANDLE,
    id: u32,
}

/// Create the child from an already encoded command line
pub fn launch(command_line: &str) -> Result<Win32Child, LaunchError> {
    // CreateProcessW may write into the command line buffer
    let mut command: Vec<u16> = command_line.encode_utf16().chain(Some(0)).collect();

    let startup = STARTUPINFOW {
        cb: std::mem::size_of::<STARTUPINFOW>() as u32,
        ..Default::default()
    };
    let mut info = PROCESS_INFORMATION::default();

    let created = unsafe {
        CreateProcessW(
            PCWSTR::null(),
            PWSTR(command.as_mut_ptr()),
            None,
            None,
            FALSE,
            PROCESS_CREATION_FLAGS(0),
            None,
            PCWSTR::null(),
            &startup,
            &mut info,
        )
    };

    // The binding captured the thread's last error at the failing call
    created.map_err(|e| LaunchError::new(e.message().to_string_lossy()))?;

    unsafe {
        let _ = CloseHandle(info.hThread);
    }

    tracing::info!(
        "Launched process {} with command line: {}",
        info.dwProcessId,
        command_line
    );

    Ok(Win32Child {
        process: info.hProcess,
        id: info.dwProcessId,
    })
}

impl Win32Child {
    /// Full path of the child's executable image
    pub fn executable_path(&self) -> Result<PathBuf> {
        let mut buffer = vec![0u16; 1024];
        let mut len = buffer.len() as u32;

        unsafe {
            QueryFullProcessImageNameW(
                self.process,
                PROCESS_NAME_WIN32,
                PWSTR(buffer.as_mut_ptr()),
                &mut len,
            )
            .context("Failed to query child image name")?;
        }

        Ok(PathBuf::from(String::from_utf16_lossy(&buffer[..len as usize])))
    }

    /// Post `WM_CHILD_EXITED` to `target` once the child terminates
    pub fn watch_for_exit(&self, target: HWND) -> Result<WaitRegistration> {
        let mut wait = HANDLE::default();

        unsafe {
            RegisterWaitForSingleObject(
                &mut wait,
                self.process,
                Some(on_exited),
                Some(target.0 as *const c_void),
                INFINITE,
                WT_EXECUTEONLYONCE,
            )
            .context("Failed to register exit wait")?;
        }

        tracing::debug!("Exit wait registered for process {}", self.id);
        Ok(WaitRegistration { wait })
    }
}

impl ChildProcess for Win32Child {
    fn id(&self) -> u32 {
        self.id
    }

    fn wait(&mut self) -> Result<u32> {
        unsafe {
            if WaitForSingleObject(self.process, INFINITE) == WAIT_FAILED {
                return Err(anyhow!("WaitForSingleObject failed"));
            }

            let mut code = 0u32;
            GetExitCodeProcess(self.process, &mut code).context("Failed to read exit code")?;
            Ok(code)
        }
    }

    fn terminate(&mut self, exit_code: u32) -> Result<()> {
        unsafe { TerminateProcess(self.process, exit_code) }
            .context("Failed to terminate child")?;
        Ok(())
    }
}

impl Drop for Win32Child {
    fn drop(&mut self) {
        unsafe {
            let _ = CloseHandle(self.process);
        }
    }
}

/// Thread-pool wait on the child; cancelled on drop
pub struct WaitRegistration {
    wait: HANDLE,
}

impl Drop for WaitRegistration {
    fn drop(&mut self) {
        // INVALID_HANDLE_VALUE blocks until a running callback has returned
        unsafe {
            let _ = UnregisterWaitEx(self.wait, INVALID_HANDLE_VALUE);
        }
        tracing::debug!("Exit wait unregistered");
    }
}

/// Runs on a thread-pool thread: only hands the event to the window
unsafe extern "system" fn on_exited(context: *mut c_void, _timed_out: BOOLEAN) {
    let target = HWND(context as isize);
    if PostMessageW(target, WM_CHILD_EXITED, WPARAM(0), LPARAM(0)).is_err() {
        tracing::warn!("Failed to post child exit notification");
    }
}
