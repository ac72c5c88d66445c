//! Pomodoro rule configuration for pomod
//!
//! A [`RuleSet`] binds a round count and a duration to each phase kind.
//! Rule sets come from fixed in-memory presets chosen at daemon startup;
//! there is no file-based rule source.

mod rules;
mod validation;

pub use rules::*;
pub use validation::*;
