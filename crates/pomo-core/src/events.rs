//! Core events emitted by session machines and the registry

use chrono::{DateTime, Local};
use pomo_api::{EventPayload, Phase, SessionEndReason};
use pomo_util::SessionId;

/// Events emitted by the core
#[derive(Debug, Clone, PartialEq)]
pub enum CoreEvent {
    /// Session created and started
    SessionStarted {
        session_id: SessionId,
        started_at: DateTime<Local>,
    },

    /// Session paused or resumed
    RunStateChanged { session_id: SessionId, running: bool },

    /// Working <-> Break transition
    PhaseChanged {
        session_id: SessionId,
        phase: Phase,
        work_count: u32,
        break_count: u32,
        is_long_break: bool,
    },

    /// Advancement task exited
    SessionEnded {
        session_id: SessionId,
        reason: SessionEndReason,
    },
}

impl CoreEvent {
    pub fn session_id(&self) -> &SessionId {
        match self {
            CoreEvent::SessionStarted { session_id, .. }
            | CoreEvent::RunStateChanged { session_id, .. }
            | CoreEvent::PhaseChanged { session_id, .. }
            | CoreEvent::SessionEnded { session_id, .. } => session_id,
        }
    }
}

impl From<CoreEvent> for EventPayload {
    fn from(event: CoreEvent) -> Self {
        match event {
            CoreEvent::SessionStarted {
                session_id,
                started_at,
            } => EventPayload::SessionStarted {
                session_id,
                started_at,
            },
            CoreEvent::RunStateChanged {
                session_id,
                running,
            } => EventPayload::RunStateChanged {
                session_id,
                running,
            },
            CoreEvent::PhaseChanged {
                session_id,
                phase,
                work_count,
                break_count,
                is_long_break,
            } => EventPayload::PhaseChanged {
                session_id,
                phase,
                work_count,
                break_count,
                is_long_break,
            },
            CoreEvent::SessionEnded { session_id, reason } => {
                EventPayload::SessionEnded { session_id, reason }
            }
        }
    }
}
