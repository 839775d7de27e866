/// Notification-area indicator owned by the main window
use crate::config::Tooltip;
use crate::event::Event;
use windows::Win32::Foundation::{HWND, LPARAM};
use windows::Win32::UI::Shell::{
    Shell_NotifyIconW, NIF_ICON, NIF_MESSAGE, NIF_TIP, NIM_ADD, NIM_DELETE, NIM_MODIFY,
    NOTIFYICONDATAW, NOTIFY_ICON_MESSAGE,
};
use windows::Win32::UI::WindowsAndMessaging::{HICON, WM_LBUTTONUP};

use super::WM_TRAY_ICON;

/// Identifier of our single indicator within the owner window
const TRAY_ICON_UID: u32 = 1;

/// Where indicator requests go
pub trait NotifyArea {
    /// Send one request; `true` if the shell accepted it
    fn notify(&self, message: NOTIFY_ICON_MESSAGE, data: &NOTIFYICONDATAW) -> bool;
}

/// The shell's notification area
#[derive(Debug, Default)]
pub struct SystemNotifyArea;

impl NotifyArea for SystemNotifyArea {
    fn notify(&self, message: NOTIFY_ICON_MESSAGE, data: &NOTIFYICONDATAW) -> bool {
        unsafe { Shell_NotifyIconW(message, data) }.as_bool()
    }
}

pub struct Indicator<A: NotifyArea = SystemNotifyArea> {
    area: A,
    owner: HWND,
    tooltip: Tooltip,
    icon: Option<HICON>,
    registered: bool,
}

impl Indicator<SystemNotifyArea> {
    /// Add the indicator with its tooltip; the icon follows once resolved
    pub fn create(owner: HWND, tooltip: Tooltip) -> Self {
        Self::with_area(SystemNotifyArea, owner, tooltip)
    }
}

impl<A: NotifyArea> Indicator<A> {
    pub fn with_area(area: A, owner: HWND, tooltip: Tooltip) -> Self {
        let mut indicator = Self {
            area,
            owner,
            tooltip,
            icon: None,
            registered: false,
        };
        indicator.registered = indicator.add();
        indicator
    }

    fn data(&self) -> NOTIFYICONDATAW {
        NOTIFYICONDATAW {
            cbSize: std::mem::size_of::<NOTIFYICONDATAW>() as u32,
            hWnd: self.owner,
            uID: TRAY_ICON_UID,
            ..Default::default()
        }
    }

    /// Callback, tip and icon (when known) in one request
    fn full_data(&self) -> NOTIFYICONDATAW {
        let mut nid = self.data();
        nid.uFlags = NIF_MESSAGE | NIF_TIP;
        nid.uCallbackMessage = WM_TRAY_ICON;
        nid.szTip = self.tooltip.to_wide_buffer();
        if let Some(icon) = self.icon {
            nid.uFlags |= NIF_ICON;
            nid.hIcon = icon;
        }
        nid
    }

    // NIM_ADD also fails when no shell is running, so it is not asserted
    fn add(&self) -> bool {
        let added = self.area.notify(NIM_ADD, &self.full_data());
        if added {
            tracing::info!("Tray icon added: {:?}", self.tooltip.as_str());
        } else {
            tracing::error!("Failed to add tray icon");
        }
        added
    }

    /// Swap the displayed icon; tip and callback stay as they are
    pub fn update_icon(&mut self, icon: HICON) {
        self.icon = Some(icon);
        if !self.registered {
            return;
        }

        let mut nid = self.data();
        nid.uFlags = NIF_ICON;
        nid.hIcon = icon;

        if !self.area.notify(NIM_MODIFY, &nid) {
            tracing::warn!("Failed to update tray icon");
            debug_assert!(false, "NIM_MODIFY failed for the tray icon");
        }
    }

    /// Add the indicator again after the shell dropped it
    ///
    /// `TaskbarCreated` also arrives when the icon is still there (a DPI
    /// change, for one); the add is then refused and the icon is refreshed
    /// in place instead.
    pub fn restore(&mut self) {
        tracing::info!("Shell restarted, restoring tray icon");
        if self.add() {
            self.registered = true;
            return;
        }

        if self.registered {
            if self.area.notify(NIM_MODIFY, &self.full_data()) {
                tracing::info!("Tray icon was still present, refreshed it");
            } else {
                tracing::warn!("Tray icon is gone and could not be re-added");
                self.registered = false;
            }
        }
    }

    /// Remove the indicator; does nothing once removed
    pub fn destroy(&mut self) {
        if !self.registered {
            return;
        }
        self.registered = false;

        if self.area.notify(NIM_DELETE, &self.data()) {
            tracing::debug!("Tray icon removed");
        } else {
            tracing::error!("Failed to remove tray icon");
            debug_assert!(false, "NIM_DELETE failed for the tray icon");
        }
    }

    pub fn is_registered(&self) -> bool {
        self.registered
    }
}

impl<A: NotifyArea> Drop for Indicator<A> {
    fn drop(&mut self) {
        self.destroy();
    }
}

/// Translate the indicator's callback `lParam` into an event
pub fn input_event(lparam: LPARAM) -> Option<Event> {
    let message = (lparam.0 as u32) & 0xFFFF;
    (message == WM_LBUTTONUP).then_some(Event::ToggleRequested)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::collections::VecDeque;
    use std::rc::Rc;
    use windows::Win32::UI::WindowsAndMessaging::{WM_LBUTTONDOWN, WM_RBUTTONUP};

    type Calls = Rc<RefCell<Vec<NOTIFY_ICON_MESSAGE>>>;

    /// Records requests and answers them from a script; unscripted ones succeed
    struct ScriptedArea {
        calls: Calls,
        answers: RefCell<VecDeque<bool>>,
    }

    impl ScriptedArea {
        fn new(calls: &Calls, answers: &[bool]) -> Self {
            Self {
                calls: calls.clone(),
                answers: RefCell::new(answers.iter().copied().collect()),
            }
        }
    }

    impl NotifyArea for ScriptedArea {
        fn notify(&self, message: NOTIFY_ICON_MESSAGE, _data: &NOTIFYICONDATAW) -> bool {
            self.calls.borrow_mut().push(message);
            self.answers.borrow_mut().pop_front().unwrap_or(true)
        }
    }

    fn indicator(calls: &Calls, answers: &[bool]) -> Indicator<ScriptedArea> {
        Indicator::with_area(
            ScriptedArea::new(calls, answers),
            HWND::default(),
            Tooltip::new("tip"),
        )
    }

    #[test]
    fn test_only_left_button_release_toggles() {
        assert_eq!(
            input_event(LPARAM(WM_LBUTTONUP as isize)),
            Some(Event::ToggleRequested)
        );
        assert_eq!(input_event(LPARAM(WM_LBUTTONDOWN as isize)), None);
        assert_eq!(input_event(LPARAM(WM_RBUTTONUP as isize)), None);
    }

    #[test]
    fn test_restore_while_still_present_keeps_registration() {
        let calls = Calls::default();
        // add ok, re-add refused, refresh ok
        let mut tray = indicator(&calls, &[true, false, true]);

        tray.restore();
        assert!(tray.is_registered());

        drop(tray);
        assert_eq!(
            *calls.borrow(),
            vec![NIM_ADD, NIM_ADD, NIM_MODIFY, NIM_DELETE]
        );
    }

    #[test]
    fn test_restore_after_shell_restart_re_adds() {
        let calls = Calls::default();
        let mut tray = indicator(&calls, &[true, true]);

        tray.restore();
        assert!(tray.is_registered());
        assert_eq!(*calls.borrow(), vec![NIM_ADD, NIM_ADD]);
    }

    #[test]
    fn test_failed_add_is_not_deleted() {
        let calls = Calls::default();
        let tray = indicator(&calls, &[false]);
        assert!(!tray.is_registered());

        drop(tray);
        assert_eq!(*calls.borrow(), vec![NIM_ADD]);
    }

    #[test]
    #[cfg(debug_assertions)]
    #[should_panic(expected = "NIM_MODIFY failed")]
    fn test_icon_update_failure_asserts() {
        let calls = Calls::default();
        let mut tray = indicator(&calls, &[true, false]);
        tray.update_icon(HICON::default());
    }

    #[test]
    #[cfg(debug_assertions)]
    #[should_panic(expected = "NIM_DELETE failed")]
    fn test_remove_failure_asserts() {
        let calls = Calls::default();
        let mut tray = indicator(&calls, &[true, false]);
        tray.destroy();
    }
}
