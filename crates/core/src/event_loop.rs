//! Single-threaded event dispatch
//!
//! `dispatch` is the one place where an event reaches the controller and
//! its effects reach the platform. The Win32 backend calls it from the
//! window procedure; the portable backend drives it from a crossbeam
//! queue through [`EventLoop`].

use crate::controller::Controller;
use crate::event::{Effect, Event};
use crossbeam::channel::{unbounded, Receiver, Sender};
use tracing::debug;

/// Platform side of the effects the controller emits
pub trait Shell {
    fn apply_icon(&mut self);
    fn toggle_console(&mut self);
    fn restore_indicator(&mut self);
    fn terminate_child(&mut self);
    fn destroy_indicator(&mut self);
    fn destroy_window(&mut self);
    fn release_icon(&mut self);
    fn stop_loop(&mut self);
}

/// Whether the loop should keep pulling events
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopControl {
    Continue,
    Stop,
}

/// Run one event through the controller and execute the resulting effects
///
/// The controller borrow ends before any effect runs, so effects may
/// re-enter `dispatch` (destroying a window synchronously reports
/// `WindowDestroyed`).
pub fn dispatch<S: Shell + ?Sized>(
    controller: &mut Controller,
    event: Event,
    shell: &mut S,
) -> LoopControl {
    let effects = controller.handle(event);
    execute(&effects, shell)
}

/// Execute effects in order
pub fn execute<S: Shell + ?Sized>(effects: &[Effect], shell: &mut S) -> LoopControl {
    let mut control = LoopControl::Continue;

    for effect in effects {
        debug!("Executing {:?}", effect);
        match effect {
            Effect::ApplyIcon => shell.apply_icon(),
            Effect::ToggleConsole => shell.toggle_console(),
            Effect::RestoreIndicator => shell.restore_indicator(),
            Effect::TerminateChild => shell.terminate_child(),
            Effect::DestroyIndicator => shell.destroy_indicator(),
            Effect::DestroyWindow => shell.destroy_window(),
            Effect::ReleaseIcon => shell.release_icon(),
            Effect::StopLoop => {
                shell.stop_loop();
                control = LoopControl::Stop;
            }
        }
    }

    control
}

/// Cloneable handle for posting events from any thread
#[derive(Debug, Clone)]
pub struct EventSender {
    tx: Sender<Event>,
}

impl EventSender {
    /// Post an event; a closed loop silently drops it
    pub fn post(&self, event: Event) {
        if self.tx.send(event).is_err() {
            debug!("Event loop gone, dropping {:?}", event);
        }
    }
}

/// Queue-driven loop used when there is no window message queue
pub struct EventLoop {
    tx: Sender<Event>,
    rx: Receiver<Event>,
}

impl Default for EventLoop {
    fn default() -> Self {
        Self::new()
    }
}

impl EventLoop {
    pub fn new() -> Self {
        let (tx, rx) = unbounded();
        Self { tx, rx }
    }

    pub fn sender(&self) -> EventSender {
        EventSender {
            tx: self.tx.clone(),
        }
    }

    /// Block on the queue and dispatch until the controller stops the loop
    ///
    /// Returns early only if every sender is gone, which cannot happen while
    /// the loop itself holds one.
    pub fn run<S: Shell + ?Sized>(&self, controller: &mut Controller, shell: &mut S) {
        while let Ok(event) = self.rx.recv() {
            if dispatch(controller, event, shell) == LoopControl::Stop {
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controller::Phase;
    use crate::visibility::{ConsoleDisplay, Visibility, VisibilityController};
    use std::cell::Cell;

    #[derive(Default)]
    struct CountingDisplay {
        applied: Cell<usize>,
    }

    impl ConsoleDisplay for CountingDisplay {
        fn set_visible(&self, _visible: bool) {
            self.applied.set(self.applied.get() + 1);
        }
    }

    /// Shell that records effects and feeds window destruction back
    struct TestShell {
        visibility: VisibilityController<CountingDisplay>,
        events: EventSender,
        indicator: bool,
        window: bool,
        icon_released: usize,
        stops: usize,
        terminated: usize,
    }

    impl TestShell {
        fn new(initial: Visibility, events: EventSender) -> Self {
            Self {
                visibility: VisibilityController::new(CountingDisplay::default(), initial),
                events,
                indicator: true,
                window: true,
                icon_released: 0,
                stops: 0,
                terminated: 0,
            }
        }
    }

    impl Shell for TestShell {
        fn apply_icon(&mut self) {}

        fn toggle_console(&mut self) {
            self.visibility.toggle();
        }

        fn restore_indicator(&mut self) {
            self.indicator = true;
        }

        fn terminate_child(&mut self) {
            self.terminated += 1;
            self.events.post(Event::ChildExited);
        }

        fn destroy_indicator(&mut self) {
            self.indicator = false;
        }

        fn destroy_window(&mut self) {
            assert!(!self.indicator, "indicator must go before its window");
            self.window = false;
            self.events.post(Event::WindowDestroyed);
        }

        fn release_icon(&mut self) {
            self.icon_released += 1;
        }

        fn stop_loop(&mut self) {
            self.stops += 1;
        }
    }

    fn run_toggles(initial: Visibility, toggles: usize) -> (TestShell, Controller) {
        let event_loop = EventLoop::new();
        let mut shell = TestShell::new(initial, event_loop.sender());
        let mut controller = Controller::new();

        dispatch(&mut controller, Event::IconResolved, &mut shell);

        let sender = event_loop.sender();
        for _ in 0..toggles {
            sender.post(Event::ToggleRequested);
        }
        sender.post(Event::ChildExited);
        // A duplicate notification must not cause a second teardown
        sender.post(Event::ChildExited);

        event_loop.run(&mut controller, &mut shell);
        (shell, controller)
    }

    #[test]
    fn test_toggle_parity_and_single_termination() {
        for initial in [Visibility::Shown, Visibility::Hidden] {
            for toggles in 0..6 {
                let (shell, controller) = run_toggles(initial, toggles);

                let expected = if toggles % 2 == 0 {
                    initial
                } else {
                    initial.toggled()
                };
                assert_eq!(shell.visibility.visibility(), expected);
                assert_eq!(shell.visibility.display().applied.get(), toggles);
                assert_eq!(controller.phase(), Phase::Terminated);
                assert_eq!(shell.stops, 1);
                assert_eq!(shell.icon_released, 1);
                assert!(!shell.window);
                assert!(!shell.indicator);
            }
        }
    }

    #[test]
    fn test_exit_posted_from_another_thread() {
        let event_loop = EventLoop::new();
        let mut shell = TestShell::new(Visibility::Shown, event_loop.sender());
        let mut controller = Controller::new();
        dispatch(&mut controller, Event::IconResolved, &mut shell);

        let sender = event_loop.sender();
        let notifier = std::thread::spawn(move || sender.post(Event::ChildExited));

        event_loop.run(&mut controller, &mut shell);
        notifier.join().unwrap();

        assert!(controller.is_terminated());
        assert_eq!(shell.stops, 1);
    }

    #[test]
    fn test_close_request_terminates_once() {
        let event_loop = EventLoop::new();
        let mut shell = TestShell::new(Visibility::Hidden, event_loop.sender());
        let mut controller = Controller::new();
        dispatch(&mut controller, Event::IconResolved, &mut shell);

        event_loop.sender().post(Event::CloseRequested);
        event_loop.run(&mut controller, &mut shell);

        assert_eq!(shell.terminated, 1);
        assert_eq!(shell.stops, 1);
        assert!(controller.is_terminated());
    }
}
