//! CLI Tray Wrapper Core Library
//!
//! Runs a command in its own console, hides or shows that console from a
//! notification-area icon, and exits with the command's exit code.
//!
//! Architecture:
//! - `cmdline` turns the argument list into the child's command line
//! - `controller` is the state machine; `event_loop` runs its effects
//! - `supervisor` owns the child and its exit watch
//! - `win32` provides the real window, indicator, console and process
//! - `portable` runs the same loop without any UI on other platforms

pub mod cmdline;
pub mod config;
pub mod controller;
pub mod error;
pub mod event;
pub mod event_loop;
pub mod logging;
pub mod portable;
pub mod supervisor;
pub mod visibility;

#[cfg(windows)]
pub mod win32;
