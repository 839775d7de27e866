/// Hidden main window, its window procedure and the Win32 shell
///
/// The window is never shown. It owns the indicator, receives the
/// indicator's callback messages and the child-exit notification, and its
/// destruction ends the message loop.
///
/// All run state lives in one `WindowContext` shared between the runner and
/// the window procedure (through `GWLP_USERDATA`). Borrows of its cells are
/// never held across a call that can re-enter the window procedure.
use std::cell::{Cell, RefCell};
use std::ffi::c_void;
use std::rc::Rc;

use windows::core::PCWSTR;
use windows::Win32::Foundation::{HWND, LPARAM, LRESULT, WPARAM};
use windows::Win32::System::LibraryLoader::GetModuleHandleW;
use windows::Win32::UI::WindowsAndMessaging::{
    CreateWindowExW, DefWindowProcW, DestroyWindow, DispatchMessageW, GetMessageW,
    GetWindowLongPtrW, PostQuitMessage, RegisterClassW, RegisterWindowMessageW,
    SetWindowLongPtrW, TranslateMessage, CREATESTRUCTW, CW_USEDEFAULT, GWLP_USERDATA, HMENU, MSG,
    WINDOW_EX_STYLE, WM_CLOSE, WM_CREATE, WM_DESTROY, WM_NCCREATE, WM_NCDESTROY, WNDCLASSW,
    WS_OVERLAPPEDWINDOW,
};

use crate::config::Tooltip;
use crate::controller::Controller;
use crate::error::WrapperError;
use crate::event::Event;
use crate::event_loop::{execute, Shell};
use crate::supervisor::Supervisor;
use crate::visibility::VisibilityController;

use super::console::ConsoleWindow;
use super::icon::OwnedIcon;
use super::indicator::{self, Indicator};
use super::process::{WaitRegistration, Win32Child};
use super::{to_wide, WM_CHILD_EXITED, WM_TRAY_ICON};

const WINDOW_CLASS: &str = "CliTrayWrapperWindow";
const WINDOW_TITLE: &str = "CliTrayWrapper";

pub type ChildSupervisor = Supervisor<Win32Child, WaitRegistration>;

/// Everything the window procedure needs, owned as one aggregate
struct WindowContext {
    hwnd: Cell<HWND>,
    controller: RefCell<Controller>,
    visibility: RefCell<VisibilityController<ConsoleWindow>>,
    console: ConsoleWindow,
    tooltip: Tooltip,
    indicator: RefCell<Option<Indicator>>,
    icon: RefCell<Option<OwnedIcon>>,
    supervisor: RefCell<Option<ChildSupervisor>>,
    taskbar_created: u32,
    terminate_exit_code: u32,
    /// Set once `WM_NCCREATE` has taken the lent reference; never cleared
    claimed: Cell<bool>,
}

impl WindowContext {
    fn new(
        visibility: VisibilityController<ConsoleWindow>,
        tooltip: Tooltip,
        taskbar_created: u32,
        terminate_exit_code: u32,
    ) -> Self {
        let console = *visibility.display();
        Self {
            hwnd: Cell::new(HWND::default()),
            controller: RefCell::new(Controller::new()),
            visibility: RefCell::new(visibility),
            console,
            tooltip,
            indicator: RefCell::new(None),
            icon: RefCell::new(None),
            supervisor: RefCell::new(None),
            taskbar_created,
            terminate_exit_code,
            claimed: Cell::new(false),
        }
    }

    /// The window now owns the lent reference
    fn claim(&self, hwnd: HWND) {
        self.hwnd.set(hwnd);
        self.claimed.set(true);
    }
}

/// Hand the window procedure its own strong reference
fn lend(context: &Rc<WindowContext>) -> *const WindowContext {
    Rc::into_raw(context.clone())
}

/// Drop the reference the window claimed, on `WM_NCDESTROY`
///
/// # Safety
/// `ptr` must come from [`lend`] and be released at most once.
unsafe fn release_claimed(ptr: *const WindowContext) {
    (*ptr).hwnd.set(HWND::default());
    drop(Rc::from_raw(ptr));
}

/// Take back a lent reference after `CreateWindowExW` failed
///
/// If `WM_NCCREATE` ran, `WM_NCDESTROY` has already released it.
///
/// # Safety
/// `ptr` must come from [`lend`] on `context`.
unsafe fn reclaim_unclaimed(context: &WindowContext, ptr: *const WindowContext) {
    if !context.claimed.get() {
        drop(Rc::from_raw(ptr));
    }
}

/// The hidden main window
pub struct MainWindow {
    context: Rc<WindowContext>,
}

impl MainWindow {
    /// Register the class and create the window; the indicator is added
    /// while the window is being created
    pub fn create(
        visibility: VisibilityController<ConsoleWindow>,
        tooltip: Tooltip,
        terminate_exit_code: u32,
    ) -> Result<Self, WrapperError> {
        let taskbar_created = unsafe {
            let name = to_wide("TaskbarCreated");
            RegisterWindowMessageW(PCWSTR(name.as_ptr()))
        };

        let context = Rc::new(WindowContext::new(
            visibility,
            tooltip,
            taskbar_created,
            terminate_exit_code,
        ));

        unsafe {
            let hinstance = GetModuleHandleW(None)
                .map_err(|e| WrapperError::Window(e.message().to_string_lossy()))?;

            let class_name = to_wide(WINDOW_CLASS);
            let title = to_wide(WINDOW_TITLE);

            let wc = WNDCLASSW {
                lpfnWndProc: Some(wndproc),
                hInstance: hinstance.into(),
                lpszClassName: PCWSTR(class_name.as_ptr()),
                ..Default::default()
            };

            if RegisterClassW(&wc) == 0 {
                return Err(WrapperError::Window(super::last_error_message()));
            }

            // The window holds its own reference until WM_NCDESTROY
            let window_ref = lend(&context);

            let hwnd = CreateWindowExW(
                WINDOW_EX_STYLE::default(),
                PCWSTR(class_name.as_ptr()),
                PCWSTR(title.as_ptr()),
                WS_OVERLAPPEDWINDOW,
                CW_USEDEFAULT,
                CW_USEDEFAULT,
                CW_USEDEFAULT,
                CW_USEDEFAULT,
                HWND::default(),
                HMENU::default(),
                hinstance,
                Some(window_ref as *const c_void),
            );

            if hwnd.0 == 0 {
                let message = super::last_error_message();
                reclaim_unclaimed(&context, window_ref);
                return Err(WrapperError::Window(message));
            }

            tracing::info!("Main window created");
        }

        Ok(Self { context })
    }

    pub fn hwnd(&self) -> HWND {
        self.context.hwnd.get()
    }

    /// Hand over the supervisor once the child is running
    pub fn attach_supervisor(&self, supervisor: ChildSupervisor) {
        *self.context.supervisor.borrow_mut() = Some(supervisor);
    }

    /// Take the supervisor back after the loop has stopped
    pub fn take_supervisor(&self) -> Option<ChildSupervisor> {
        self.context.supervisor.borrow_mut().take()
    }

    /// Store the resolved icon and move the controller to `Running`
    pub fn resolve_icon(&self, icon: OwnedIcon) {
        *self.context.icon.borrow_mut() = Some(icon);
        dispatch(&self.context, Event::IconResolved);
    }

    /// Remove the indicator ahead of an early exit
    pub fn destroy_indicator(&self) {
        Win32Shell {
            ctx: &self.context,
        }
        .destroy_indicator();
    }

    /// Pump messages until the controller stops the loop
    pub fn run(&self) {
        tracing::info!("Entering message loop");

        unsafe {
            let mut msg = MSG::default();
            loop {
                match GetMessageW(&mut msg, HWND::default(), 0, 0).0 {
                    0 => break,
                    -1 => {
                        tracing::error!("GetMessageW failed: {}", super::last_error_message());
                        break;
                    }
                    _ => {
                        TranslateMessage(&msg);
                        DispatchMessageW(&msg);
                    }
                }
            }
        }

        tracing::info!("Message loop finished");
    }
}

impl Drop for MainWindow {
    fn drop(&mut self) {
        let hwnd = self.context.hwnd.get();
        if hwnd.0 != 0 {
            unsafe {
                let _ = DestroyWindow(hwnd);
            }
        }
    }
}

/// Feed one event through the controller, then run its effects
fn dispatch(ctx: &WindowContext, event: Event) {
    let effects = match ctx.controller.try_borrow_mut() {
        Ok(mut controller) => controller.handle(event),
        Err(_) => {
            debug_assert!(false, "re-entrant dispatch of {:?}", event);
            tracing::error!("Re-entrant dispatch of {:?} dropped", event);
            return;
        }
    };

    execute(&effects, &mut Win32Shell { ctx });
}

/// Executes controller effects against the real window, console and child
struct Win32Shell<'a> {
    ctx: &'a WindowContext,
}

impl Shell for Win32Shell<'_> {
    fn apply_icon(&mut self) {
        let Some(icon) = self.ctx.icon.borrow().as_ref().map(|i| i.handle()) else {
            tracing::warn!("No icon to apply");
            return;
        };

        self.ctx.console.set_icon(icon);
        if let Some(indicator) = self.ctx.indicator.borrow_mut().as_mut() {
            indicator.update_icon(icon);
        }
    }

    fn toggle_console(&mut self) {
        self.ctx.visibility.borrow_mut().toggle();
    }

    fn restore_indicator(&mut self) {
        if let Some(indicator) = self.ctx.indicator.borrow_mut().as_mut() {
            indicator.restore();
        }
    }

    fn terminate_child(&mut self) {
        let code = self.ctx.terminate_exit_code;
        if let Some(supervisor) = self.ctx.supervisor.borrow_mut().as_mut() {
            if let Err(e) = supervisor.terminate(code) {
                tracing::error!("{:#}", e);
            }
        }
    }

    fn destroy_indicator(&mut self) {
        let indicator = self.ctx.indicator.borrow_mut().take();
        drop(indicator);
    }

    fn destroy_window(&mut self) {
        let hwnd = self.ctx.hwnd.get();
        if hwnd.0 == 0 {
            return;
        }
        // Sends WM_DESTROY straight back into the window procedure
        if let Err(e) = unsafe { DestroyWindow(hwnd) } {
            tracing::error!("DestroyWindow failed: {}", e);
            debug_assert!(false, "DestroyWindow failed: {}", e);
        }
    }

    fn release_icon(&mut self) {
        let icon = self.ctx.icon.borrow_mut().take();
        drop(icon);
    }

    fn stop_loop(&mut self) {
        unsafe { PostQuitMessage(0) };
    }
}

unsafe extern "system" fn wndproc(
    hwnd: HWND,
    msg: u32,
    wparam: WPARAM,
    lparam: LPARAM,
) -> LRESULT {
    if msg == WM_NCCREATE {
        let create = &*(lparam.0 as *const CREATESTRUCTW);
        let ctx = create.lpCreateParams as *const WindowContext;
        SetWindowLongPtrW(hwnd, GWLP_USERDATA, ctx as isize);
        (*ctx).claim(hwnd);
        return DefWindowProcW(hwnd, msg, wparam, lparam);
    }

    let ptr = GetWindowLongPtrW(hwnd, GWLP_USERDATA) as *const WindowContext;
    if ptr.is_null() {
        return DefWindowProcW(hwnd, msg, wparam, lparam);
    }

    if msg == WM_NCDESTROY {
        SetWindowLongPtrW(hwnd, GWLP_USERDATA, 0);
        release_claimed(ptr);
        return DefWindowProcW(hwnd, msg, wparam, lparam);
    }

    let ctx = &*ptr;

    match msg {
        WM_CREATE => {
            let indicator = Indicator::create(hwnd, ctx.tooltip.clone());
            *ctx.indicator.borrow_mut() = Some(indicator);
            LRESULT(0)
        }
        WM_TRAY_ICON => {
            if let Some(event) = indicator::input_event(lparam) {
                dispatch(ctx, event);
            }
            LRESULT(0)
        }
        WM_CHILD_EXITED => {
            dispatch(ctx, Event::ChildExited);
            LRESULT(0)
        }
        WM_CLOSE => {
            dispatch(ctx, Event::CloseRequested);
            LRESULT(0)
        }
        WM_DESTROY => {
            dispatch(ctx, Event::WindowDestroyed);
            LRESULT(0)
        }
        _ if msg == ctx.taskbar_created && msg != 0 => {
            dispatch(ctx, Event::ShellRestarted);
            LRESULT(0)
        }
        _ => DefWindowProcW(hwnd, msg, wparam, lparam),
    }
}
