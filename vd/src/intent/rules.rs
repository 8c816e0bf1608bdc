//! Rule-based intent detection
//!
//! Deterministic pattern matching with confidence scoring. Confidence is the
//! fraction of the input covered by the match, discounted when the match does
//! not start at the beginning of the text.

use chrono::{Local, Timelike};
use regex::{Match, Regex, RegexBuilder};
use serde_json::{json, Map, Value};
use tracing::trace;

use super::patterns::IntentPatterns;

/// A detected intent with confidence and extracted entities
#[derive(Debug, Clone, PartialEq)]
pub struct Intent {
    pub name: String,
    /// In [0, 1]: match coverage times position factor
    pub confidence: f64,
    pub entities: Map<String, Value>,
}

impl Intent {
    /// JSON form used in turn events and persisted records
    pub fn to_value(&self) -> Value {
        json!({
            "name": self.name,
            "confidence": self.confidence,
            "entities": self.entities,
        })
    }
}

/// Intent detector backed by ordered regex pattern sets
pub struct RuleBasedIntentDetector {
    patterns: Vec<(String, Vec<Regex>)>,
}

impl RuleBasedIntentDetector {
    /// Compile the given pattern sets, case-insensitively
    pub fn new(patterns: &IntentPatterns) -> eyre::Result<Self> {
        let mut compiled = Vec::with_capacity(patterns.sets.len());
        for set in &patterns.sets {
            let mut regexes = Vec::with_capacity(set.patterns.len());
            for pattern in &set.patterns {
                let regex = RegexBuilder::new(pattern)
                    .case_insensitive(true)
                    .build()
                    .map_err(|e| eyre::eyre!("invalid pattern for intent '{}': {e}", set.intent))?;
                regexes.push(regex);
            }
            compiled.push((set.intent.clone(), regexes));
        }
        Ok(Self { patterns: compiled })
    }

    /// Detector using the embedded default patterns
    pub fn with_embedded_patterns() -> Self {
        Self::new(&IntentPatterns::embedded()).expect("embedded patterns are valid")
    }

    /// Detect the highest-confidence intent, or `None` when nothing matches.
    ///
    /// Ties break to the first-found match (declaration order) because the
    /// comparison is strictly greater-than.
    pub fn detect_intent(&self, text: &str) -> Option<Intent> {
        if text.is_empty() {
            return None;
        }

        let mut best: Option<Intent> = None;
        let mut highest = 0.0_f64;

        for (intent_name, regexes) in &self.patterns {
            for regex in regexes {
                if let Some(m) = regex.find(text) {
                    let coverage = (m.end() - m.start()) as f64 / text.len() as f64;
                    let position_factor = if m.start() == 0 { 1.0 } else { 0.8 };
                    let confidence = coverage * position_factor;

                    if confidence > highest {
                        let entities = extract_entities(intent_name, text, &m);
                        best = Some(Intent {
                            name: intent_name.clone(),
                            confidence,
                            entities,
                        });
                        highest = confidence;
                    }
                }
            }
        }

        if let Some(intent) = &best {
            trace!(intent = %intent.name, confidence = intent.confidence, "intent detected");
        }
        best
    }

    /// Names of the intents this detector can produce
    pub fn supported_intents(&self) -> Vec<&str> {
        self.patterns.iter().map(|(name, _)| name.as_str()).collect()
    }
}

/// Intent-specific, deterministic entity extraction
fn extract_entities(intent_name: &str, text: &str, _m: &Match<'_>) -> Map<String, Value> {
    let mut entities = Map::new();
    let now = Local::now();

    match intent_name {
        "time.query" => {
            entities.insert(
                "current_time".to_string(),
                Value::String(now.format("%I:%M %p").to_string()),
            );
        }
        "date.query" => {
            entities.insert("date".to_string(), Value::String(now.format("%Y-%m-%d").to_string()));
            entities.insert("weekday".to_string(), Value::String(now.format("%A").to_string()));
            entities.insert(
                "formatted_date".to_string(),
                Value::String(now.format("%B %d, %Y").to_string()),
            );
        }
        "greeting" | "farewell" => {
            let hour = now.hour();
            let time_of_day = if hour < 12 {
                "morning"
            } else if hour < 17 {
                "afternoon"
            } else {
                "evening"
            };
            entities.insert("time_of_day".to_string(), Value::String(time_of_day.to_string()));
        }
        "caregiver.notify" => {
            let role_pattern = Regex::new(r"caregiver|nurse|doctor").expect("role pattern is valid");
            if let Some(role) = role_pattern.find(&text.to_lowercase()) {
                entities.insert("role".to_string(), Value::String(role.as_str().to_string()));
            }
        }
        _ => {}
    }

    entities
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::intent::patterns::IntentPatternSet;

    fn detector_with(intent: &str, patterns: &[&str]) -> RuleBasedIntentDetector {
        let patterns = IntentPatterns {
            sets: vec![IntentPatternSet {
                intent: intent.to_string(),
                patterns: patterns.iter().map(|p| p.to_string()).collect(),
            }],
        };
        RuleBasedIntentDetector::new(&patterns).unwrap()
    }

    #[test]
    fn test_exact_match_has_full_confidence() {
        let detector = detector_with("greeting", &["^hi$"]);
        let intent = detector.detect_intent("hi").unwrap();
        assert_eq!(intent.name, "greeting");
        assert_eq!(intent.confidence, 1.0);
    }

    #[test]
    fn test_partial_coverage_lowers_confidence() {
        let detector = detector_with("greeting", &["^hi"]);
        let intent = detector.detect_intent("hi there").unwrap();
        assert!(intent.confidence < 1.0);
    }

    #[test]
    fn test_non_initial_match_is_discounted() {
        let detector = detector_with("time.query", &["time"]);
        // "time" covers 4 of 9 chars, starting at offset 5
        let intent = detector.detect_intent("the  time").unwrap();
        let expected = (4.0 / 9.0) * 0.8;
        assert!((intent.confidence - expected).abs() < 1e-9);
    }

    #[test]
    fn test_no_match_returns_none() {
        let detector = detector_with("greeting", &["^hi$"]);
        assert!(detector.detect_intent("open the pod bay doors").is_none());
    }

    #[test]
    fn test_empty_text_returns_none() {
        let detector = detector_with("greeting", &["^hi$"]);
        assert!(detector.detect_intent("").is_none());
    }

    #[test]
    fn test_ties_break_to_first_declared_intent() {
        let patterns = IntentPatterns {
            sets: vec![
                IntentPatternSet {
                    intent: "first".to_string(),
                    patterns: vec!["^hi$".to_string()],
                },
                IntentPatternSet {
                    intent: "second".to_string(),
                    patterns: vec!["^hi$".to_string()],
                },
            ],
        };
        let detector = RuleBasedIntentDetector::new(&patterns).unwrap();
        assert_eq!(detector.detect_intent("hi").unwrap().name, "first");
    }

    #[test]
    fn test_highest_confidence_wins_across_intents() {
        let patterns = IntentPatterns {
            sets: vec![
                IntentPatternSet {
                    intent: "partial".to_string(),
                    patterns: vec!["hello".to_string()],
                },
                IntentPatternSet {
                    intent: "full".to_string(),
                    patterns: vec!["^hello there$".to_string()],
                },
            ],
        };
        let detector = RuleBasedIntentDetector::new(&patterns).unwrap();
        assert_eq!(detector.detect_intent("hello there").unwrap().name, "full");
    }

    #[test]
    fn test_matching_is_case_insensitive() {
        let detector = detector_with("greeting", &["^hi$"]);
        assert!(detector.detect_intent("Hi").is_some());
    }

    #[test]
    fn test_greeting_extracts_time_of_day() {
        let detector = RuleBasedIntentDetector::with_embedded_patterns();
        let intent = detector.detect_intent("hello").unwrap();
        assert_eq!(intent.name, "greeting");
        let time_of_day = intent.entities["time_of_day"].as_str().unwrap();
        assert!(["morning", "afternoon", "evening"].contains(&time_of_day));
    }

    #[test]
    fn test_time_query_extracts_current_time() {
        let detector = RuleBasedIntentDetector::with_embedded_patterns();
        let intent = detector.detect_intent("what time is it").unwrap();
        assert_eq!(intent.name, "time.query");
        assert!(intent.entities.contains_key("current_time"));
    }

    #[test]
    fn test_caregiver_notify_extracts_role() {
        let detector = RuleBasedIntentDetector::with_embedded_patterns();
        let intent = detector.detect_intent("please call my nurse").unwrap();
        assert_eq!(intent.name, "caregiver.notify");
        assert_eq!(intent.entities["role"], Value::String("nurse".to_string()));
    }

    #[test]
    fn test_invalid_pattern_fails_construction() {
        let patterns = IntentPatterns {
            sets: vec![IntentPatternSet {
                intent: "broken".to_string(),
                patterns: vec!["(unclosed".to_string()],
            }],
        };
        assert!(RuleBasedIntentDetector::new(&patterns).is_err());
    }

    #[test]
    fn test_intent_to_value() {
        let detector = detector_with("greeting", &["^hi$"]);
        let value = detector.detect_intent("hi").unwrap().to_value();
        assert_eq!(value["name"], Value::String("greeting".to_string()));
        assert_eq!(value["confidence"], serde_json::json!(1.0));
    }
}
