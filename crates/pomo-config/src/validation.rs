//! Rule set validation

use crate::{LONG_BREAK_FACTOR, RuleSet};
use std::time::Duration;
use thiserror::Error;

/// Validation error
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("{phase} rule: rounds must be at least 1")]
    ZeroRounds { phase: &'static str },

    #[error("{phase} rule: duration must be greater than zero")]
    ZeroDuration { phase: &'static str },

    #[error("{phase} rule: duration is too long")]
    DurationTooLong { phase: &'static str },
}

/// Validate a rule set, returning every problem found
pub fn validate_rules(rules: &RuleSet) -> Vec<ValidationError> {
    let mut errors = Vec::new();

    for (phase, rule) in [("work", &rules.work), ("break", &rules.breaks)] {
        if rule.rounds == 0 {
            errors.push(ValidationError::ZeroRounds { phase });
        }
        if rule.duration.is_zero() {
            errors.push(ValidationError::ZeroDuration { phase });
        }
        // Long-break arithmetic and the session total must not overflow
        let scale = rule.rounds.max(LONG_BREAK_FACTOR);
        if rule.duration.checked_mul(scale).is_none() {
            errors.push(ValidationError::DurationTooLong { phase });
        }
    }

    if rules.total_duration() == Duration::MAX {
        errors.push(ValidationError::DurationTooLong { phase: "session" });
    }

    errors
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Rule;

    #[test]
    fn presets_are_valid() {
        assert!(validate_rules(&RuleSet::test()).is_empty());
        assert!(validate_rules(&RuleSet::classic()).is_empty());
    }

    #[test]
    fn reports_every_error() {
        let rules = RuleSet::new(
            Rule::new(0, Duration::from_secs(5)),
            Rule::new(0, Duration::ZERO),
        );

        let errors = validate_rules(&rules);
        assert_eq!(
            errors,
            vec![
                ValidationError::ZeroRounds { phase: "work" },
                ValidationError::ZeroRounds { phase: "break" },
                ValidationError::ZeroDuration { phase: "break" },
            ]
        );
    }

    #[test]
    fn rejects_overflowing_durations() {
        let rules = RuleSet::new(
            Rule::new(4, Duration::from_secs(5)),
            Rule::new(3, Duration::MAX / 2),
        );

        assert_eq!(
            validate_rules(&rules),
            vec![
                ValidationError::DurationTooLong { phase: "break" },
                ValidationError::DurationTooLong { phase: "session" },
            ]
        );
    }

    #[test]
    fn error_message_names_phase() {
        let err = ValidationError::ZeroDuration { phase: "work" };
        assert_eq!(err.to_string(), "work rule: duration must be greater than zero");
    }
}
