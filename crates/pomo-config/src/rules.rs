//! Rule sets and presets

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

/// The long break lasts this many base break durations.
pub const LONG_BREAK_FACTOR: u32 = 4;

/// Round count and duration for one phase kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rule {
    pub rounds: u32,
    pub duration: Duration,
}

impl Rule {
    pub const fn new(rounds: u32, duration: Duration) -> Self {
        Self { rounds, duration }
    }
}

/// Immutable rules for a whole pomodoro session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleSet {
    pub work: Rule,
    pub breaks: Rule,
}

impl RuleSet {
    pub const fn new(work: Rule, breaks: Rule) -> Self {
        Self { work, breaks }
    }

    /// Short rules for tests and demos: 4 × 5s of work, 3 × 5s of break.
    pub const fn test() -> Self {
        Self {
            work: Rule::new(4, Duration::from_secs(5)),
            breaks: Rule::new(3, Duration::from_secs(5)),
        }
    }

    /// The classic technique: 4 × 25min of work, 3 × 5min of break.
    pub const fn classic() -> Self {
        Self {
            work: Rule::new(4, Duration::from_secs(25 * 60)),
            breaks: Rule::new(3, Duration::from_secs(5 * 60)),
        }
    }

    /// Length of the long break taken after the last work round.
    ///
    /// Fixed multiple of the base break duration, independent of
    /// `breaks.rounds`.
    /// Saturates at `Duration::MAX`; `validate_rules` rejects such rules.
    pub fn long_break_duration(&self) -> Duration {
        self.breaks.duration.saturating_mul(LONG_BREAK_FACTOR)
    }

    /// Nominal length of a full session (work, short breaks, long break).
    pub fn total_duration(&self) -> Duration {
        let short_breaks = self.work.rounds.saturating_sub(1);
        self.work
            .duration
            .saturating_mul(self.work.rounds)
            .saturating_add(self.breaks.duration.saturating_mul(short_breaks))
            .saturating_add(self.long_break_duration())
    }
}

impl Default for RuleSet {
    fn default() -> Self {
        Self::classic()
    }
}

/// Named rule set presets selectable at startup
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RulePreset {
    Test,
    #[default]
    Classic,
}

impl RulePreset {
    pub fn rules(self) -> RuleSet {
        match self {
            RulePreset::Test => RuleSet::test(),
            RulePreset::Classic => RuleSet::classic(),
        }
    }
}

impl fmt::Display for RulePreset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RulePreset::Test => write!(f, "test"),
            RulePreset::Classic => write!(f, "classic"),
        }
    }
}

#[derive(Debug, Clone, Error)]
#[error("Unknown rule preset '{0}' (expected 'test' or 'classic')")]
pub struct UnknownPreset(pub String);

impl FromStr for RulePreset {
    type Err = UnknownPreset;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "test" => Ok(RulePreset::Test),
            "classic" => Ok(RulePreset::Classic),
            other => Err(UnknownPreset(other.to_string())),
        }
    }
}
