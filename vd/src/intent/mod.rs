//! Pattern-based intent classification
//!
//! No NLU here: intents come from deterministic regex matching with a simple
//! coverage-times-position confidence score.

mod patterns;
mod rules;

pub use patterns::{IntentPatternSet, IntentPatterns};
pub use rules::{Intent, RuleBasedIntentDetector};
