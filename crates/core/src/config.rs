//! Configuration for a wrapper run.
//!
//! Two sources feed the wrapper:
//! - the command line, parsed once into an immutable [`RunConfig`]
//! - an optional, read-only `settings.json` in the platform data directory
//!   (%APPDATA%/CliTrayWrapper/ on Windows) holding ambient [`Settings`]
//!
//! Nothing is ever written back; every run starts from these inputs.
//!
//! # Example
//!
//! ```rust
//! use cli_tray_wrapper_core::config::RunConfig;
//! use cli_tray_wrapper_core::visibility::Visibility;
//!
//! let raw = ["hidden", "Build server", "cargo", "watch", "-x", "run"];
//! let config = RunConfig::from_args(&raw).expect("valid arguments");
//!
//! assert_eq!(config.initial_visibility, Visibility::Hidden);
//! assert_eq!(config.command_line, "cargo watch -x run");
//! ```
use crate::cmdline;
use crate::error::UsageError;
use crate::visibility::Visibility;
use anyhow::{anyhow, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Application name used for the data directory
pub const APP_NAME: &str = "CliTrayWrapper";

/// Settings file name inside the data directory
pub const SETTINGS_FILE: &str = "settings.json";

/// Usage line shown on bad arguments
pub const USAGE: &str =
    "Usage: cli-tray-wrapper [initial state (visible|hidden)] [tray icon tooltip] [command...]";

/// Indicator tip capacity in UTF-16 units, terminator included
pub const TOOLTIP_CAPACITY: usize = 128;

/// Tooltip text, already cut down to what the indicator can display
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tooltip(String);

impl Tooltip {
    /// Truncate to `TOOLTIP_CAPACITY - 1` UTF-16 units without splitting a
    /// surrogate pair
    pub fn new(text: &str) -> Self {
        let limit = TOOLTIP_CAPACITY - 1;
        let mut units = 0;
        let mut end = 0;

        for (idx, ch) in text.char_indices() {
            if units + ch.len_utf16() > limit {
                break;
            }
            units += ch.len_utf16();
            end = idx + ch.len_utf8();
        }

        if end < text.len() {
            tracing::warn!(
                "Tooltip truncated to {} UTF-16 units (was {})",
                limit,
                text.encode_utf16().count()
            );
        }

        Tooltip(text[..end].to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Null-terminated UTF-16 buffer of the indicator's fixed size
    pub fn to_wide_buffer(&self) -> [u16; TOOLTIP_CAPACITY] {
        let mut buffer = [0u16; TOOLTIP_CAPACITY];
        for (slot, unit) in buffer.iter_mut().zip(self.0.encode_utf16()) {
            *slot = unit;
        }
        buffer
    }
}

/// Everything a run needs, fixed at startup
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunConfig {
    pub initial_visibility: Visibility,
    pub tooltip: Tooltip,
    /// Command and its arguments, exactly as received
    pub arguments: Vec<String>,
    /// `arguments` encoded into a single command line
    pub command_line: String,
}

impl RunConfig {
    /// Build from the raw arguments that follow the program name
    pub fn from_args<S: AsRef<str>>(raw: &[S]) -> Result<Self, UsageError> {
        if raw.len() < 3 {
            return Err(UsageError::MissingArguments(raw.len()));
        }

        let state = raw[0].as_ref();
        let initial_visibility = state
            .parse::<Visibility>()
            .map_err(|_| UsageError::InvalidInitialState(state.to_string()))?;

        let arguments: Vec<String> = raw[2..].iter().map(|a| a.as_ref().to_string()).collect();
        let command_line = cmdline::encode(&arguments);

        Ok(Self {
            initial_visibility,
            tooltip: Tooltip::new(raw[1].as_ref()),
            arguments,
            command_line,
        })
    }
}

/// Ambient settings read from `settings.json`
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct Settings {
    /// Maximum tracing level: trace, debug, info, warn or error
    pub log_level: String,
    /// Write logs to a file in the data directory instead of stderr
    pub log_to_file: bool,
    /// Exit code given to the child when the wrapper window is closed
    pub terminate_exit_code: u32,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            log_level: "info".to_string(),
            log_to_file: true,
            terminate_exit_code: 1,
        }
    }
}

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("no data directory: {0}")]
    DataDirectory(String),
    #[error("failed to read {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
}

/// Get the application's data directory
/// Returns %APPDATA%/CliTrayWrapper/ on Windows
/// Creates directory if it doesn't exist
pub fn get_data_directory() -> Result<PathBuf> {
    let project_dirs = ProjectDirs::from("", "", APP_NAME)
        .ok_or_else(|| anyhow!("Failed to determine user data directory"))?;

    let data_dir = project_dirs.data_dir();

    fs::create_dir_all(data_dir)
        .map_err(|e| anyhow!("Failed to create data directory: {}", e))?;

    Ok(data_dir.to_path_buf())
}

/// Read settings from an explicit path
pub fn read_settings(path: &Path) -> Result<Settings, SettingsError> {
    let contents = fs::read_to_string(path).map_err(|source| SettingsError::Read {
        path: path.to_path_buf(),
        source,
    })?;

    serde_json::from_str(&contents).map_err(|source| SettingsError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

/// Load settings from the data directory
///
/// A missing file gives the defaults. Errors are returned rather than
/// logged because this runs before logging is set up; callers fall back
/// to [`Settings::default`].
pub fn load_settings() -> Result<Settings, SettingsError> {
    let data_dir =
        get_data_directory().map_err(|e| SettingsError::DataDirectory(format!("{:#}", e)))?;

    load_settings_from(&data_dir)
}

/// Load `settings.json` from `data_dir`; defaults when there is no file
pub fn load_settings_from(data_dir: &Path) -> Result<Settings, SettingsError> {
    let path = data_dir.join(SETTINGS_FILE);
    if !path.exists() {
        return Ok(Settings::default());
    }

    read_settings(&path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_settings() {
        let settings = Settings::default();
        assert_eq!(settings.log_level, "info");
        assert!(settings.log_to_file);
        assert_eq!(settings.terminate_exit_code, 1);
    }

    #[test]
    fn test_from_args_visible() {
        let config = RunConfig::from_args(&["visible", "My tool", "echo", "say \"hi\""]).unwrap();

        assert_eq!(config.initial_visibility, Visibility::Shown);
        assert_eq!(config.tooltip.as_str(), "My tool");
        assert_eq!(config.arguments, vec!["echo", "say \"hi\""]);
        assert_eq!(config.command_line, r#"echo "say \"hi\"""#);
    }

    #[test]
    fn test_from_args_too_few() {
        assert_eq!(
            RunConfig::from_args(&["visible", "tip"]),
            Err(UsageError::MissingArguments(2))
        );
        let empty: [&str; 0] = [];
        assert_eq!(
            RunConfig::from_args(&empty),
            Err(UsageError::MissingArguments(0))
        );
    }

    #[test]
    fn test_from_args_bad_state() {
        assert_eq!(
            RunConfig::from_args(&["shown", "tip", "cmd"]),
            Err(UsageError::InvalidInitialState("shown".to_string()))
        );
    }

    #[test]
    fn test_tooltip_truncation() {
        let long = "x".repeat(300);
        let tooltip = Tooltip::new(&long);
        assert_eq!(tooltip.as_str().len(), TOOLTIP_CAPACITY - 1);

        let buffer = tooltip.to_wide_buffer();
        assert_eq!(buffer[TOOLTIP_CAPACITY - 2], 'x' as u16);
        assert_eq!(buffer[TOOLTIP_CAPACITY - 1], 0);
    }

    #[test]
    fn test_tooltip_keeps_surrogate_pairs_whole() {
        // 126 single units followed by an emoji needing two units
        let text = format!("{}{}", "a".repeat(126), "\u{1F600}");
        let tooltip = Tooltip::new(&text);
        assert_eq!(tooltip.as_str(), "a".repeat(126));
    }

    #[test]
    fn test_load_settings_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(load_settings_from(dir.path()).unwrap(), Settings::default());
    }

    #[test]
    fn test_load_settings_partial_file() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join(SETTINGS_FILE), r#"{ "log_level": "debug" }"#).unwrap();

        let settings = load_settings_from(dir.path()).unwrap();
        assert_eq!(settings.log_level, "debug");
        assert!(settings.log_to_file);
    }

    #[test]
    fn test_load_settings_malformed_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(SETTINGS_FILE);
        fs::write(&path, "{ not json").unwrap();

        let err = load_settings_from(dir.path()).unwrap_err();
        assert!(matches!(err, SettingsError::Parse { .. }));
        assert!(err.to_string().contains(SETTINGS_FILE));
        assert_eq!(load_settings_from(dir.path()).unwrap_or_default(), Settings::default());
    }

    #[test]
    fn test_load_settings_unreadable_file() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join(SETTINGS_FILE)).unwrap();

        assert!(matches!(
            load_settings_from(dir.path()),
            Err(SettingsError::Read { .. })
        ));
    }
}
