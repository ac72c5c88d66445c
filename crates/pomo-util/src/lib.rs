//! Shared utilities for pomod
//!
//! This crate provides:
//! - ID types (SessionId, ClientId)
//! - Clock helpers (wall-clock now, countdown formatting)
//! - Error types
//! - Default paths for the daemon socket

mod error;
mod ids;
mod paths;
mod time;

pub use error::*;
pub use ids::*;
pub use paths::*;
pub use time::*;
