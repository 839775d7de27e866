//! cli-tray-wrapper - runs a console command behind a tray icon
//!
//! This process:
//! - allocates a console for the command (shown or hidden at start)
//! - adds a tray icon; left-click toggles the console
//! - launches the command and waits for it without polling
//! - tears everything down when the command exits and returns its exit code
//!
//! Usage: cli-tray-wrapper (visible|hidden) <tooltip> <command...>

#![windows_subsystem = "windows"]

use cli_tray_wrapper_core::config::{self, RunConfig, Settings};
use cli_tray_wrapper_core::error::{UsageError, WrapperError};
use cli_tray_wrapper_core::logging;

fn main() {
    let loaded = config::load_settings();
    let settings = loaded.as_ref().cloned().unwrap_or_default();
    logging::init(&settings);

    tracing::info!("cli-tray-wrapper starting...");
    if let Err(e) = &loaded {
        tracing::warn!("Using default settings: {}", e);
    }

    let raw: Vec<String> = std::env::args_os()
        .skip(1)
        .map(|arg| arg.to_string_lossy().into_owned())
        .collect();

    let code = run(&raw, &settings);

    tracing::info!("Exiting with code {}", code);
    std::process::exit(code);
}

/// Lines printed for a usage error
fn usage_lines(error: &UsageError) -> Vec<String> {
    let mut lines = Vec::new();
    if let UsageError::InvalidInitialState(_) = error {
        lines.push(error.to_string());
    }
    lines.push(config::USAGE.to_string());
    lines
}

/// Parse `raw` and hand a valid run to `launch`
///
/// On a usage error `report` gets the lines to show and nothing is launched.
fn start<R, L>(raw: &[String], report: R, launch: L) -> i32
where
    R: FnOnce(&[String]),
    L: FnOnce(&RunConfig) -> i32,
{
    match RunConfig::from_args(raw) {
        Ok(run_config) => launch(&run_config),
        Err(e) => {
            tracing::warn!("Usage error: {}", e);
            report(&usage_lines(&e));
            WrapperError::from(e).exit_code()
        }
    }
}

#[cfg(windows)]
fn run(raw: &[String], settings: &Settings) -> i32 {
    use cli_tray_wrapper_core::win32::console::ConsoleSession;

    let console = match ConsoleSession::allocate() {
        Ok(console) => console,
        Err(e) => {
            tracing::error!("{}", e);
            return e.exit_code();
        }
    };

    start(
        raw,
        |lines| show_on_console(&console, lines),
        |run_config| match supervise(&console, run_config, settings) {
            Ok(code) => code as i32,
            Err(WrapperError::Launch(e)) => {
                tracing::error!("Launch failed: {}", e);
                show_on_console(&console, &[format!("Error: {}", e.message.trim_end())]);
                WrapperError::from(e).exit_code()
            }
            Err(e) => {
                tracing::error!("{}", e);
                e.exit_code()
            }
        },
    )
}

/// Print `lines` on the console and wait for a key press
#[cfg(windows)]
fn show_on_console(
    console: &cli_tray_wrapper_core::win32::console::ConsoleSession,
    lines: &[String],
) {
    if let Err(e) = console.redirect_std_streams() {
        tracing::warn!("{:#}", e);
    }
    for line in lines {
        println!("{}", line);
    }
    console.pause();
}

/// Launch the command and run the message loop until it exits
#[cfg(windows)]
fn supervise(
    console: &cli_tray_wrapper_core::win32::console::ConsoleSession,
    run_config: &RunConfig,
    settings: &Settings,
) -> Result<u32, WrapperError> {
    use cli_tray_wrapper_core::supervisor::Supervisor;
    use cli_tray_wrapper_core::visibility::{Visibility, VisibilityController};
    use cli_tray_wrapper_core::win32::{icon::OwnedIcon, process, window::MainWindow};

    // A fresh console starts out shown
    let mut visibility = VisibilityController::new(console.window(), Visibility::Shown);
    visibility.set(run_config.initial_visibility);

    let window = MainWindow::create(
        visibility,
        run_config.tooltip.clone(),
        settings.terminate_exit_code,
    )?;

    let child = match process::launch(&run_config.command_line) {
        Ok(child) => child,
        Err(e) => {
            window.destroy_indicator();
            return Err(e.into());
        }
    };

    let watch = match child.watch_for_exit(window.hwnd()) {
        Ok(watch) => watch,
        Err(e) => {
            let mut supervisor = Supervisor::new(child, ());
            abandon(&window, &mut supervisor, settings);
            return Err(WrapperError::ExitWatch(format!("{:#}", e)));
        }
    };

    let executable = child
        .executable_path()
        .map_err(|e| tracing::warn!("{:#}", e))
        .ok();

    window.attach_supervisor(Supervisor::new(child, watch));

    let icon = match OwnedIcon::resolve(executable.as_deref()) {
        Ok(icon) => icon,
        Err(e) => {
            if let Some(mut supervisor) = window.take_supervisor() {
                abandon(&window, &mut supervisor, settings);
            }
            return Err(e);
        }
    };

    window.resolve_icon(icon);
    window.run();

    let code = window
        .take_supervisor()
        .and_then(|mut supervisor| supervisor.reap())
        .unwrap_or(1);

    Ok(code)
}

/// Stop a child we can no longer supervise and remove the indicator
#[cfg(windows)]
fn abandon<C, W>(
    window: &cli_tray_wrapper_core::win32::window::MainWindow,
    supervisor: &mut cli_tray_wrapper_core::supervisor::Supervisor<C, W>,
    settings: &Settings,
) where
    C: cli_tray_wrapper_core::supervisor::ChildProcess,
{
    window.destroy_indicator();
    if let Err(e) = supervisor.terminate(settings.terminate_exit_code) {
        tracing::error!("{:#}", e);
    }
    supervisor.reap();
}

#[cfg(not(windows))]
fn run(raw: &[String], _settings: &Settings) -> i32 {
    use cli_tray_wrapper_core::portable;

    start(
        raw,
        |lines| {
            for line in lines {
                eprintln!("{}", line);
            }
        },
        |run_config| {
            tracing::info!(
                "No tray support on this platform; running {:?} without an indicator",
                run_config.arguments
            );

            match portable::run(&run_config.arguments) {
                Ok(code) => code as i32,
                Err(e) => {
                    eprintln!("Error: {}", e);
                    WrapperError::from(e).exit_code()
                }
            }
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_usage_lines_for_missing_arguments() {
        let lines = usage_lines(&UsageError::MissingArguments(2));
        assert_eq!(lines, vec![config::USAGE.to_string()]);
    }

    #[test]
    fn test_usage_lines_for_bad_state() {
        let lines = usage_lines(&UsageError::InvalidInitialState("maybe".into()));
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0], "Invalid value \"maybe\" for initial state");
    }

    fn args(tokens: &[&str]) -> Vec<String> {
        tokens.iter().map(|t| t.to_string()).collect()
    }

    #[test]
    fn test_two_tokens_report_usage_without_launch() {
        let mut reported = Vec::new();
        let mut launches = 0;

        let code = start(
            &args(&["visible", "tip"]),
            |lines| reported.extend_from_slice(lines),
            |_| {
                launches += 1;
                7
            },
        );

        assert_eq!(code, 0);
        assert_eq!(launches, 0);
        assert_eq!(reported, vec![config::USAGE.to_string()]);
    }

    #[test]
    fn test_bad_state_reports_without_launch() {
        let mut reported = Vec::new();
        let mut launches = 0;

        let code = start(
            &args(&["shown", "tip", "cmd"]),
            |lines| reported.extend_from_slice(lines),
            |_| {
                launches += 1;
                7
            },
        );

        assert_eq!(code, 0);
        assert_eq!(launches, 0);
        assert_eq!(reported.len(), 2);
    }

    #[test]
    fn test_valid_arguments_launch_once() {
        let mut reported = 0;
        let mut launched = Vec::new();

        let code = start(
            &args(&["hidden", "tip", "echo", "a b"]),
            |_| reported += 1,
            |run_config| {
                launched.push(run_config.command_line.clone());
                7
            },
        );

        assert_eq!(code, 7);
        assert_eq!(reported, 0);
        assert_eq!(launched, vec![r#"echo "a b""#.to_string()]);
    }
}
