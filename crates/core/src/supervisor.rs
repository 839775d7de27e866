/// Ownership of the single child process and its exit watch
///
/// The supervisor holds the child and the wait registration from spawn
/// until `reap`, which releases both exactly once. Dropping a supervisor
/// that was never reaped still releases the watch before the child.
use anyhow::Result;
use tracing::{info, warn};

/// A spawned child the supervisor can wait on or stop
pub trait ChildProcess {
    fn id(&self) -> u32;

    /// Block until the child has exited and return its exit code
    fn wait(&mut self) -> Result<u32>;

    /// Ask the platform to end the child with `exit_code`
    fn terminate(&mut self, exit_code: u32) -> Result<()>;
}

/// Owns one child and its exit notification registration
///
/// `W` is the registration guard; dropping it cancels the notification.
pub struct Supervisor<C: ChildProcess, W> {
    child: Option<C>,
    watch: Option<W>,
    exit_code: Option<u32>,
}

impl<C: ChildProcess, W> Supervisor<C, W> {
    pub fn new(child: C, watch: W) -> Self {
        info!("Supervising child process {}", child.id());
        Self {
            child: Some(child),
            watch: Some(watch),
            exit_code: None,
        }
    }

    pub fn child_id(&self) -> Option<u32> {
        self.child.as_ref().map(|c| c.id())
    }

    pub fn exit_code(&self) -> Option<u32> {
        self.exit_code
    }

    /// Request termination of a child that is still owned
    pub fn terminate(&mut self, exit_code: u32) -> Result<()> {
        match self.child.as_mut() {
            Some(child) => {
                info!("Terminating child process {}", child.id());
                child.terminate(exit_code)
            }
            None => Ok(()),
        }
    }

    /// Release the watch, collect the exit code and drop the child
    ///
    /// Only the first call does any work; later calls return `None`.
    pub fn reap(&mut self) -> Option<u32> {
        let Some(mut child) = self.child.take() else {
            warn!("Child already reaped");
            return None;
        };

        drop(self.watch.take());

        match child.wait() {
            Ok(code) => {
                info!("Child process {} exited with code {}", child.id(), code);
                self.exit_code = Some(code);
            }
            Err(e) => {
                warn!("Failed to read exit code of child {}: {}", child.id(), e);
            }
        }

        self.exit_code
    }
}

impl<C: ChildProcess, W> Drop for Supervisor<C, W> {
    fn drop(&mut self) {
        drop(self.watch.take());
        drop(self.child.take());
    }
}
