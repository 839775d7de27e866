//! Portable backend
//!
//! Runs the wrapper without a console window or indicator: the child is
//! spawned with `std::process::Command` and a watcher thread turns its exit
//! into a `ChildExited` event on the [`EventLoop`] queue. Used on platforms
//! without the Win32 backend.

use crate::controller::Controller;
use crate::error::LaunchError;
use crate::event::Event;
use crate::event_loop::{EventLoop, EventSender, Shell};
use crate::supervisor::{ChildProcess, Supervisor};
use anyhow::{anyhow, Result};
use crossbeam::channel::{bounded, Receiver, Sender};
use std::process::{Child, Command, ExitStatus};
use std::thread::JoinHandle;
use tracing::{debug, info, warn};

/// Child owned by a watcher thread; its exit code arrives over a channel
pub struct ThreadedChild {
    id: u32,
    exit: Receiver<u32>,
    code: Option<u32>,
}

impl ChildProcess for ThreadedChild {
    fn id(&self) -> u32 {
        self.id
    }

    fn wait(&mut self) -> Result<u32> {
        if let Some(code) = self.code {
            return Ok(code);
        }
        let code = self
            .exit
            .recv()
            .map_err(|_| anyhow!("watcher for child {} ended without a status", self.id))?;
        self.code = Some(code);
        Ok(code)
    }

    fn terminate(&mut self, _exit_code: u32) -> Result<()> {
        Err(anyhow!("terminating the child is not supported by the portable backend"))
    }
}

/// Guard for the watcher thread; it detaches on drop
pub struct ThreadWatch {
    _handle: JoinHandle<()>,
}

/// Exit code as the wrapper reports it
fn status_code(status: ExitStatus) -> u32 {
    match status.code() {
        Some(code) => code as u32,
        // Killed by a signal on unix
        None => 1,
    }
}

/// Watcher thread waiting to be handed a child
struct Watcher {
    handoff: Sender<Child>,
    exit: Receiver<u32>,
    handle: JoinHandle<()>,
}

/// Start the watcher before any child exists
///
/// If the hand-off sender is dropped without a child, the thread ends
/// without posting anything.
fn spawn_watcher(events: EventSender) -> std::io::Result<Watcher> {
    let (handoff, child_rx) = bounded::<Child>(1);
    let (code_tx, exit) = bounded(1);

    let handle = std::thread::Builder::new()
        .name("child-watch".into())
        .spawn(move || {
            let Ok(mut child) = child_rx.recv() else {
                debug!("No child handed to the watcher");
                return;
            };

            let id = child.id();
            let code = match child.wait() {
                Ok(status) => status_code(status),
                Err(e) => {
                    warn!("Waiting on child {} failed: {}", id, e);
                    1
                }
            };
            let _ = code_tx.send(code);
            events.post(Event::ChildExited);
        })?;

    Ok(Watcher {
        handoff,
        exit,
        handle,
    })
}

/// Spawn `arguments` and watch for its exit
pub fn launch(
    arguments: &[String],
    events: EventSender,
) -> Result<Supervisor<ThreadedChild, ThreadWatch>, LaunchError> {
    let (program, rest) = arguments
        .split_first()
        .ok_or_else(|| LaunchError::new("no command given"))?;

    let watcher = spawn_watcher(events).map_err(|e| LaunchError::new(e.to_string()))?;

    let child = Command::new(program)
        .args(rest)
        .spawn()
        .map_err(|e| LaunchError::new(e.to_string()))?;

    let id = child.id();
    if let Err(e) = watcher.handoff.send(child) {
        // The watcher is gone; reclaim the child so it is not left running
        let mut child = e.into_inner();
        let _ = child.kill();
        let _ = child.wait();
        return Err(LaunchError::new("child watcher exited before the child started"));
    }

    Ok(Supervisor::new(
        ThreadedChild {
            id,
            exit: watcher.exit,
            code: None,
        },
        ThreadWatch {
            _handle: watcher.handle,
        },
    ))
}

/// Shell with nothing to show: window teardown is reported straight back
struct HeadlessShell {
    events: EventSender,
}

impl Shell for HeadlessShell {
    fn apply_icon(&mut self) {}

    fn toggle_console(&mut self) {}

    fn restore_indicator(&mut self) {}

    fn terminate_child(&mut self) {
        warn!("Close requested but the portable backend cannot stop the child");
    }

    fn destroy_indicator(&mut self) {}

    fn destroy_window(&mut self) {
        self.events.post(Event::WindowDestroyed);
    }

    fn release_icon(&mut self) {}

    fn stop_loop(&mut self) {
        debug!("Event loop stopping");
    }
}

/// Launch `arguments`, supervise until exit and return the child's code
pub fn run(arguments: &[String]) -> Result<u32, LaunchError> {
    let event_loop = EventLoop::new();
    let mut supervisor = launch(arguments, event_loop.sender())?;

    let mut controller = Controller::new();
    let mut shell = HeadlessShell {
        events: event_loop.sender(),
    };

    crate::event_loop::dispatch(&mut controller, Event::IconResolved, &mut shell);
    event_loop.run(&mut controller, &mut shell);

    let code = supervisor.reap().unwrap_or(1);
    info!("Portable run finished with code {}", code);
    Ok(code)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_watcher_without_child_ends_quietly() {
        let event_loop = EventLoop::new();
        let watcher = spawn_watcher(event_loop.sender()).unwrap();

        drop(watcher.handoff);
        watcher.handle.join().unwrap();

        assert!(watcher.exit.recv_timeout(Duration::from_millis(50)).is_err());
    }
}
