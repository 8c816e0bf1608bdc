//! Intent pattern sets
//!
//! Patterns ship as embedded defaults and can be replaced by a JSON file.
//! Order matters: when two matches tie on confidence, the first-declared
//! intent wins, so the file format is an ordered array.

use std::fs;
use std::path::Path;

use eyre::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::info;

/// One intent and the regex patterns that trigger it
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IntentPatternSet {
    pub intent: String,
    pub patterns: Vec<String>,
}

/// Ordered collection of intent pattern sets
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IntentPatterns {
    pub sets: Vec<IntentPatternSet>,
}

impl IntentPatterns {
    /// The built-in pattern sets
    pub fn embedded() -> Self {
        let set = |intent: &str, patterns: &[&str]| IntentPatternSet {
            intent: intent.to_string(),
            patterns: patterns.iter().map(|p| p.to_string()).collect(),
        };
        Self {
            sets: vec![
                set("greeting", &[r"^(hi|hello|hey)\b", r"\bgood (morning|afternoon|evening)\b"]),
                set("farewell", &[r"^(bye|goodbye)\b", r"\bsee you\b", r"\bgood night\b"]),
                set("time.query", &[r"\bwhat time\b", r"\btime is it\b", r"^time$"]),
                set(
                    "date.query",
                    &[r"\bwhat('s| is) the date\b", r"\bwhat day\b", r"\btoday's date\b"],
                ),
                set("help.request", &[r"^help\b", r"\bwhat can you do\b", r"\bhelp me\b"]),
                set(
                    "caregiver.notify",
                    &[r"\b(call|contact|notify|get)\b.*\b(caregiver|nurse|doctor)\b"],
                ),
                set("smalltalk.how_are_you", &[r"\bhow are you\b", r"\bhow('s| is) it going\b"]),
            ],
        }
    }

    /// Load patterns from a JSON file, or fall back to the embedded defaults
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => {
                let content = fs::read_to_string(path)
                    .context(format!("Failed to read intent patterns from {}", path.display()))?;
                let sets: Vec<IntentPatternSet> =
                    serde_json::from_str(&content).context("Failed to parse intent patterns")?;
                info!(path = %path.display(), intents = sets.len(), "loaded intent patterns");
                Ok(Self { sets })
            }
            None => Ok(Self::embedded()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_embedded_patterns_are_nonempty() {
        let patterns = IntentPatterns::embedded();
        assert!(!patterns.sets.is_empty());
        for set in &patterns.sets {
            assert!(!set.patterns.is_empty(), "intent {} has no patterns", set.intent);
        }
    }

    #[test]
    fn test_load_from_file() {
        let temp = tempfile::tempdir().unwrap();
        let path = temp.path().join("intents.json");
        std::fs::write(&path, r#"[{"intent": "greeting", "patterns": ["^hi$"]}]"#).unwrap();

        let patterns = IntentPatterns::load(Some(&path)).unwrap();
        assert_eq!(patterns.sets.len(), 1);
        assert_eq!(patterns.sets[0].intent, "greeting");
    }

    #[test]
    fn test_load_missing_file_fails() {
        let temp = tempfile::tempdir().unwrap();
        let path = temp.path().join("nope.json");
        assert!(IntentPatterns::load(Some(&path)).is_err());
    }

    #[test]
    fn test_load_none_uses_embedded() {
        let patterns = IntentPatterns::load(None).unwrap();
        assert_eq!(patterns.sets.len(), IntentPatterns::embedded().sets.len());
    }
}
