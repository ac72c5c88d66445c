//! Pomodoro session state machine for pomod
//!
//! This crate is the heart of pomod, containing:
//! - The per-second session update (Working -> Break -> ... -> long Break -> finished)
//! - Pause/resume and cancellation of the advancement task
//! - The session registry owning "the current session"

mod cancel;
mod events;
mod machine;
mod registry;

pub use cancel::*;
pub use events::*;
pub use machine::*;
pub use registry::*;
