//! Wrapper state machine
//!
//! The controller never touches the platform. Each event moves it between
//! phases and yields the effects the shell has to carry out, in order:
//!
//! ```text
//! Starting --IconResolved--> Running --ChildExited/CloseRequested--> Exiting
//! Exiting --WindowDestroyed--> Terminated
//! ```
//!
//! Keeping effects out of the controller lets the window procedure finish
//! its borrow before running them, since destroying the window re-enters
//! the window procedure with `WindowDestroyed`.

use crate::event::{Effect, Event};
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Window and indicator exist, icon not yet applied
    Starting,
    Running,
    /// Teardown requested, waiting for the window to go away
    Exiting,
    Terminated,
}

/// Effects produced by handling one event
pub type Effects = Vec<Effect>;

#[derive(Debug)]
pub struct Controller {
    phase: Phase,
}

impl Default for Controller {
    fn default() -> Self {
        Self::new()
    }
}

impl Controller {
    pub fn new() -> Self {
        Self {
            phase: Phase::Starting,
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn is_terminated(&self) -> bool {
        self.phase == Phase::Terminated
    }

    /// Advance the state machine by one event
    pub fn handle(&mut self, event: Event) -> Effects {
        debug!("Handling {:?} in {:?}", event, self.phase);

        let (next, effects) = match (self.phase, event) {
            (Phase::Starting, Event::IconResolved) => (Phase::Running, vec![Effect::ApplyIcon]),

            (Phase::Starting | Phase::Running, Event::ChildExited) => {
                info!("Child exited, tearing down the window");
                (
                    Phase::Exiting,
                    vec![Effect::DestroyIndicator, Effect::DestroyWindow],
                )
            }

            (Phase::Running, Event::ToggleRequested) => {
                (Phase::Running, vec![Effect::ToggleConsole])
            }

            (Phase::Running, Event::CloseRequested) => {
                info!("Close requested, terminating the child");
                (
                    Phase::Exiting,
                    vec![
                        Effect::TerminateChild,
                        Effect::DestroyIndicator,
                        Effect::DestroyWindow,
                    ],
                )
            }

            (Phase::Running, Event::ShellRestarted) => {
                (Phase::Running, vec![Effect::RestoreIndicator])
            }

            (Phase::Exiting, Event::WindowDestroyed) => (
                Phase::Terminated,
                vec![Effect::ReleaseIcon, Effect::StopLoop],
            ),

            (Phase::Starting | Phase::Running, Event::WindowDestroyed) => {
                // The platform took the window down on its own
                warn!("Window destroyed while {:?}", self.phase);
                (
                    Phase::Terminated,
                    vec![
                        Effect::DestroyIndicator,
                        Effect::ReleaseIcon,
                        Effect::StopLoop,
                    ],
                )
            }

            (Phase::Exiting | Phase::Terminated, Event::ChildExited) => {
                debug!("Ignoring repeated exit notification");
                (self.phase, Vec::new())
            }

            (
                Phase::Exiting | Phase::Terminated,
                Event::ToggleRequested | Event::CloseRequested | Event::ShellRestarted,
            ) => (self.phase, Vec::new()),

            (Phase::Terminated, Event::WindowDestroyed | Event::IconResolved)
            | (Phase::Exiting, Event::IconResolved) => {
                warn!("Unexpected {:?} after teardown", event);
                (self.phase, Vec::new())
            }

            (
                Phase::Starting,
                Event::ToggleRequested | Event::CloseRequested | Event::ShellRestarted,
            )
            | (Phase::Running, Event::IconResolved) => {
                debug_assert!(false, "{:?} is not valid while {:?}", event, self.phase);
                warn!("Dropping {:?} while {:?}", event, self.phase);
                (self.phase, Vec::new())
            }
        };

        if next != self.phase {
            info!("Phase {:?} -> {:?}", self.phase, next);
            self.phase = next;
        }

        effects
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn running() -> Controller {
        let mut controller = Controller::new();
        assert_eq!(controller.handle(Event::IconResolved), vec![Effect::ApplyIcon]);
        controller
    }

    #[test]
    fn test_normal_lifecycle() {
        let mut controller = running();
        assert_eq!(controller.phase(), Phase::Running);

        assert_eq!(
            controller.handle(Event::ChildExited),
            vec![Effect::DestroyIndicator, Effect::DestroyWindow]
        );
        assert_eq!(controller.phase(), Phase::Exiting);

        assert_eq!(
            controller.handle(Event::WindowDestroyed),
            vec![Effect::ReleaseIcon, Effect::StopLoop]
        );
        assert!(controller.is_terminated());
    }

    #[test]
    fn test_toggle_only_while_running() {
        let mut controller = running();
        assert_eq!(
            controller.handle(Event::ToggleRequested),
            vec![Effect::ToggleConsole]
        );

        controller.handle(Event::ChildExited);
        assert!(controller.handle(Event::ToggleRequested).is_empty());
        assert_eq!(controller.phase(), Phase::Exiting);
    }

    #[test]
    fn test_repeated_exit_is_ignored() {
        let mut controller = running();
        controller.handle(Event::ChildExited);

        assert!(controller.handle(Event::ChildExited).is_empty());
        controller.handle(Event::WindowDestroyed);
        assert!(controller.handle(Event::ChildExited).is_empty());
        assert!(controller.is_terminated());
    }

    #[test]
    fn test_close_terminates_child_first() {
        let mut controller = running();
        assert_eq!(
            controller.handle(Event::CloseRequested),
            vec![
                Effect::TerminateChild,
                Effect::DestroyIndicator,
                Effect::DestroyWindow
            ]
        );

        // The terminated child's notification arrives afterwards
        assert!(controller.handle(Event::ChildExited).is_empty());
        assert_eq!(
            controller.handle(Event::WindowDestroyed),
            vec![Effect::ReleaseIcon, Effect::StopLoop]
        );
    }

    #[test]
    fn test_exit_before_icon_resolved() {
        let mut controller = Controller::new();
        assert_eq!(
            controller.handle(Event::ChildExited),
            vec![Effect::DestroyIndicator, Effect::DestroyWindow]
        );
        assert!(controller.handle(Event::IconResolved).is_empty());
        assert_eq!(controller.phase(), Phase::Exiting);
    }

    #[test]
    fn test_unexpected_window_destroy() {
        let mut controller = running();
        assert_eq!(
            controller.handle(Event::WindowDestroyed),
            vec![
                Effect::DestroyIndicator,
                Effect::ReleaseIcon,
                Effect::StopLoop
            ]
        );
        assert!(controller.is_terminated());
    }

    #[test]
    fn test_shell_restart_restores_indicator() {
        let mut controller = running();
        assert_eq!(
            controller.handle(Event::ShellRestarted),
            vec![Effect::RestoreIndicator]
        );
        assert_eq!(controller.phase(), Phase::Running);
    }

    #[test]
    #[cfg(debug_assertions)]
    #[should_panic(expected = "not valid while Starting")]
    fn test_toggle_before_running_asserts() {
        let mut controller = Controller::new();
        controller.handle(Event::ToggleRequested);
    }
}
