//! Event types for pomod -> client streaming

use chrono::{DateTime, Local};
use pomo_util::SessionId;
use serde::{Deserialize, Serialize};

use crate::{Phase, SessionEndReason, API_VERSION};

/// Event envelope
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub api_version: u32,
    pub timestamp: DateTime<Local>,
    pub payload: EventPayload,
}

impl Event {
    pub fn new(payload: EventPayload) -> Self {
        Self {
            api_version: API_VERSION,
            timestamp: pomo_util::now(),
            payload,
        }
    }
}

/// All possible events from the daemon to clients
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EventPayload {
    /// A new session was created and started
    SessionStarted {
        session_id: SessionId,
        started_at: DateTime<Local>,
    },

    /// Session was paused or resumed
    RunStateChanged { session_id: SessionId, running: bool },

    /// Session moved between work and break
    PhaseChanged {
        session_id: SessionId,
        phase: Phase,
        work_count: u32,
        break_count: u32,
        is_long_break: bool,
    },

    /// Session stopped advancing
    SessionEnded {
        session_id: SessionId,
        reason: SessionEndReason,
    },

    /// Daemon is shutting down
    Shutdown,
}
