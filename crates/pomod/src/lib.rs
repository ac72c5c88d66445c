//! pomod - the pomodoro background service
//!
//! The library half of the daemon: it wires the session registry to the IPC
//! server and dispatches protocol commands. The `pomod` binary adds argument
//! parsing, logging setup and signal handling.

mod service;

pub use service::*;
