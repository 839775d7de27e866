/// Tracing subscriber setup
///
/// The child shares our console, so by default logs go to a file in the
/// data directory rather than to stderr.
use crate::config::{get_data_directory, Settings};
use std::fs::OpenOptions;
use std::str::FromStr;
use std::sync::Mutex;
use tracing::Level;

/// Environment variable that overrides the configured level
pub const LOG_ENV: &str = "CLI_TRAY_WRAPPER_LOG";

/// Log file name inside the data directory
pub const LOG_FILE: &str = "cli-tray-wrapper.log";

/// Pick the maximum level from the environment, then settings, then `INFO`
pub fn resolve_level(settings: &Settings, env_value: Option<&str>) -> Level {
    env_value
        .and_then(|v| Level::from_str(v.trim()).ok())
        .or_else(|| Level::from_str(settings.log_level.trim()).ok())
        .unwrap_or(Level::INFO)
}

/// Install the global subscriber; later calls are ignored
pub fn init(settings: &Settings) {
    let env_value = std::env::var(LOG_ENV).ok();
    let level = resolve_level(settings, env_value.as_deref());

    let log_file = settings
        .log_to_file
        .then(|| get_data_directory().ok())
        .flatten()
        .and_then(|dir| {
            OpenOptions::new()
                .create(true)
                .append(true)
                .open(dir.join(LOG_FILE))
                .ok()
        });

    let result = match log_file {
        Some(file) => tracing_subscriber::fmt()
            .with_max_level(level)
            .with_ansi(false)
            .with_writer(Mutex::new(file))
            .try_init(),
        None => tracing_subscriber::fmt()
            .with_max_level(level)
            .with_writer(std::io::stderr)
            .try_init(),
    };

    if result.is_ok() {
        tracing::debug!("Logging initialized at {}", level);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_level_precedence() {
        let mut settings = Settings::default();
        settings.log_level = "warn".to_string();

        assert_eq!(resolve_level(&settings, Some("debug")), Level::DEBUG);
        assert_eq!(resolve_level(&settings, None), Level::WARN);
        assert_eq!(resolve_level(&settings, Some("nonsense")), Level::WARN);

        settings.log_level = "loud".to_string();
        assert_eq!(resolve_level(&settings, None), Level::INFO);
    }
}
