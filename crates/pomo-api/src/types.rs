//! Shared types for the pomod API

use chrono::{DateTime, Local};
use pomo_config::RuleSet;
use pomo_util::SessionId;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Kind of period a session is currently in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    #[default]
    Working,
    Break,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Phase::Working => write!(f, "W"),
            Phase::Break => write!(f, "B"),
        }
    }
}

/// Why a session stopped advancing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionEndReason {
    /// The long break ran out
    Completed,
    /// The session was deleted or the daemon shut down
    Cancelled,
}

/// Point-in-time copy of a session, taken under a shared lock
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSnapshot {
    pub session_id: SessionId,
    /// Time spent in the current phase
    pub elapsed: Duration,
    /// Informational countdown, see the session machine for its formula
    pub remaining: Duration,
    pub started_at: Option<DateTime<Local>>,
    pub finished_at: Option<DateTime<Local>>,
    pub running: bool,
    pub started: bool,
    pub finished: bool,
    pub phase: Phase,
    /// Completed work rounds
    pub work_count: u32,
    /// Completed short breaks
    pub break_count: u32,
    pub is_long_break: bool,
    pub rules: RuleSet,
}

impl SessionSnapshot {
    /// Human readable label for the current period
    pub fn phase_label(&self) -> &'static str {
        match (self.phase, self.is_long_break) {
            (Phase::Working, _) => "work",
            (Phase::Break, false) => "break",
            (Phase::Break, true) => "long break",
        }
    }

    /// Paused means started but not currently ticking
    pub fn is_paused(&self) -> bool {
        self.started && !self.running
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_snapshot() -> SessionSnapshot {
        SessionSnapshot {
            session_id: SessionId::new(),
            elapsed: Duration::from_secs(3),
            remaining: Duration::from_secs(2),
            started_at: Some(pomo_util::now()),
            finished_at: None,
            running: true,
            started: true,
            finished: false,
            phase: Phase::Working,
            work_count: 0,
            break_count: 0,
            is_long_break: false,
            rules: RuleSet::test(),
        }
    }

    #[test]
    fn phase_serialization() {
        assert_eq!(serde_json::to_string(&Phase::Break).unwrap(), "\"break\"");
        assert_eq!(Phase::Working.to_string(), "W");
    }

    #[test]
    fn snapshot_labels() {
        let mut snap = make_snapshot();
        assert_eq!(snap.phase_label(), "work");

        snap.phase = Phase::Break;
        assert_eq!(snap.phase_label(), "break");

        snap.is_long_break = true;
        assert_eq!(snap.phase_label(), "long break");
    }

    #[test]
    fn snapshot_paused() {
        let mut snap = make_snapshot();
        assert!(!snap.is_paused());

        snap.running = false;
        assert!(snap.is_paused());

        snap.started = false;
        assert!(!snap.is_paused());
    }

    #[test]
    fn snapshot_serialization() {
        let snap = make_snapshot();
        let json = serde_json::to_string(&snap).unwrap();
        let parsed: SessionSnapshot = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, snap);
    }
}
