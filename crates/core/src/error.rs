/// Error taxonomy for the wrapper and the exit code each one maps to
use thiserror::Error;

/// Malformed or missing command-line arguments
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UsageError {
    #[error("expected at least 3 arguments, got {0}")]
    MissingArguments(usize),
    #[error("Invalid value \"{0}\" for initial state")]
    InvalidInitialState(String),
}

/// The child process could not be created
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct LaunchError {
    /// System diagnostic text, captured right after the failing call
    pub message: String,
}

impl LaunchError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

#[derive(Debug, Error)]
pub enum WrapperError {
    #[error(transparent)]
    Usage(#[from] UsageError),

    #[error("failed to attach a console: {0}")]
    ConsoleAttach(String),

    #[error("failed to create the main window: {0}")]
    Window(String),

    #[error("failed to acquire an icon for the child: {0}")]
    IconAcquisition(String),

    #[error("failed to watch the child for exit: {0}")]
    ExitWatch(String),

    #[error("failed to launch the command: {0}")]
    Launch(#[from] LaunchError),
}

impl WrapperError {
    /// Process exit status used when startup stops with this error
    pub fn exit_code(&self) -> i32 {
        match self {
            WrapperError::Usage(_) | WrapperError::Launch(_) => 0,
            WrapperError::ConsoleAttach(_)
            | WrapperError::Window(_)
            | WrapperError::IconAcquisition(_)
            | WrapperError::ExitWatch(_) => 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_codes() {
        assert_eq!(
            WrapperError::from(UsageError::MissingArguments(2)).exit_code(),
            0
        );
        assert_eq!(
            WrapperError::from(LaunchError::new("The system cannot find the file specified."))
                .exit_code(),
            0
        );
        assert_eq!(WrapperError::ConsoleAttach("denied".into()).exit_code(), 1);
        assert_eq!(WrapperError::IconAcquisition("none".into()).exit_code(), 1);
        assert_eq!(WrapperError::Window("class".into()).exit_code(), 1);
        assert_eq!(WrapperError::ExitWatch("wait".into()).exit_code(), 1);
    }

    #[test]
    fn test_invalid_state_message() {
        let err = UsageError::InvalidInitialState("shown".into());
        assert_eq!(err.to_string(), "Invalid value \"shown\" for initial state");
    }
}
