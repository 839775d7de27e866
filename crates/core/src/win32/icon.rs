/// Icon shown on the indicator and the console window
use crate::error::WrapperError;
use std::path::Path;
use windows::core::PCWSTR;
use windows::Win32::Foundation::HINSTANCE;
use windows::Win32::UI::Shell::ExtractIconExW;
use windows::Win32::UI::WindowsAndMessaging::{DestroyIcon, LoadIconW, HICON, IDI_APPLICATION};

use super::to_wide;

/// Icon handle; destroyed on drop unless it is a shared stock icon
pub struct OwnedIcon {
    handle: HICON,
    owned: bool,
}

impl OwnedIcon {
    /// Use the first large icon of `exe`, or the stock application icon
    pub fn resolve(exe: Option<&Path>) -> Result<Self, WrapperError> {
        if let Some(path) = exe {
            match Self::extract(path) {
                Some(icon) => return Ok(icon),
                None => tracing::info!("No icon in {:?}, using the stock icon", path),
            }
        }

        let handle = unsafe { LoadIconW(HINSTANCE::default(), IDI_APPLICATION) }
            .map_err(|e| WrapperError::IconAcquisition(e.message().to_string_lossy()))?;

        Ok(Self {
            handle,
            owned: false,
        })
    }

    fn extract(path: &Path) -> Option<Self> {
        let wide = to_wide(&path.to_string_lossy());
        let mut handle = HICON::default();

        let count = unsafe {
            ExtractIconExW(
                PCWSTR(wide.as_ptr()),
                0,
                Some(&mut handle as *mut HICON),
                None,
                1,
            )
        };

        (count == 1 && !handle.is_invalid()).then(|| Self {
            handle,
            owned: true,
        })
    }

    pub fn handle(&self) -> HICON {
        self.handle
    }
}

impl Drop for OwnedIcon {
    fn drop(&mut self) {
        if self.owned {
            unsafe {
                let _ = DestroyIcon(self.handle);
            }
            tracing::debug!("Icon destroyed");
        }
    }
}
