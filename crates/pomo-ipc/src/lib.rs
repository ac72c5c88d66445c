//! IPC layer for pomod
//!
//! Provides:
//! - Unix domain socket server
//! - NDJSON (newline-delimited JSON) protocol
//! - Client connection management and event subscription

mod client;
mod server;

pub use client::*;
pub use server::*;

use pomo_api::ErrorInfo;
use thiserror::Error;

/// IPC errors
#[derive(Debug, Error)]
pub enum IpcError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Connection closed")]
    ConnectionClosed,

    #[error("Server error: {0}")]
    ServerError(String),

    /// The daemon answered with an error response
    #[error("Request rejected ({:?}): {}", .0.code, .0.message)]
    Rejected(ErrorInfo),
}

pub type IpcResult<T> = Result<T, IpcError>;
