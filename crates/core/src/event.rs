//! Events consumed by the controller and the effects it emits

/// Something that happened, delivered on the dispatch thread
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    /// The child's icon (or the fallback) is ready to display
    IconResolved,
    /// Primary-button release on the indicator
    ToggleRequested,
    /// The child process has terminated
    ChildExited,
    /// Someone asked the wrapper window to close
    CloseRequested,
    /// The shell restarted and dropped every indicator
    ShellRestarted,
    /// The platform finished destroying the main window
    WindowDestroyed,
}

/// Work the shell performs on behalf of the controller
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Effect {
    /// Show the resolved icon on the indicator and the console title bar
    ApplyIcon,
    ToggleConsole,
    /// Add the indicator again after a shell restart
    RestoreIndicator,
    TerminateChild,
    DestroyIndicator,
    DestroyWindow,
    ReleaseIcon,
    /// Stop pulling events; the loop winds down after this
    StopLoop,
}
