//! Standard content and safety policies

use regex::{Regex, RegexBuilder};
use serde_json::{json, Map, Value};
use tracing::warn;

use super::engine::{Policy, PolicyContext, PolicyResult};

const DEFAULT_BANNED_WORDS: &[&str] = &["damn", "hell", "stupid", "idiot", "hate", "kill", "die"];

/// Default maximum response length in characters
pub const DEFAULT_MAX_RESPONSE_LENGTH: usize = 500;

/// Default maximum input length in characters
pub const DEFAULT_MAX_INPUT_LENGTH: usize = 1000;

fn context_text(context: &PolicyContext) -> &str {
    context
        .user_input
        .as_deref()
        .or(context.response.as_deref())
        .unwrap_or("")
}

/// Blocks disallowed words in input or response text
pub struct ContentFilterPolicy {
    banned: Vec<(String, Regex)>,
}

impl ContentFilterPolicy {
    pub fn new() -> Self {
        Self::with_banned_words(DEFAULT_BANNED_WORDS.iter().map(|w| w.to_string()).collect())
    }

    pub fn with_banned_words(words: Vec<String>) -> Self {
        let banned = words
            .into_iter()
            .filter(|word| !word.is_empty())
            .filter_map(|word| {
                let pattern = format!(r"\b{}\b", regex::escape(&word));
                RegexBuilder::new(&pattern)
                    .case_insensitive(true)
                    .build()
                    .ok()
                    .map(|re| (word, re))
            })
            .collect();
        Self { banned }
    }
}

impl Default for ContentFilterPolicy {
    fn default() -> Self {
        Self::new()
    }
}

impl Policy for ContentFilterPolicy {
    fn evaluate(&self, context: &PolicyContext) -> PolicyResult {
        let text = context_text(context);
        let mut violations = Map::new();
        for (word, pattern) in &self.banned {
            if pattern.is_match(text) {
                violations.insert(word.clone(), Value::Bool(true));
            }
        }
        PolicyResult::from_violations(violations)
    }

    fn name(&self) -> &'static str {
        "ContentFilterPolicy"
    }

    fn description(&self) -> String {
        "Blocks inappropriate or disallowed content.".to_string()
    }
}

/// Validates response length against a configured maximum
pub struct ResponseLengthPolicy {
    max_length: usize,
}

impl ResponseLengthPolicy {
    pub fn new() -> Self {
        Self::with_max_length(DEFAULT_MAX_RESPONSE_LENGTH)
    }

    pub fn with_max_length(max_length: usize) -> Self {
        Self { max_length }
    }
}

impl Default for ResponseLengthPolicy {
    fn default() -> Self {
        Self::new()
    }
}

impl Policy for ResponseLengthPolicy {
    fn evaluate(&self, context: &PolicyContext) -> PolicyResult {
        let text = context.response.as_deref().unwrap_or("");
        let mut violations = Map::new();
        let length = text.chars().count();
        if length > self.max_length {
            violations.insert("length".to_string(), json!(length));
        }
        PolicyResult::from_violations(violations)
    }

    fn name(&self) -> &'static str {
        "ResponseLengthPolicy"
    }

    fn description(&self) -> String {
        format!("Ensures response does not exceed {} characters.", self.max_length)
    }
}

/// Validates user input against injection attacks and excessive length
pub struct InputSanitizationPolicy {
    max_length: usize,
    sql_patterns: Vec<Regex>,
    xss_patterns: Vec<Regex>,
    traversal_pattern: Regex,
}

impl InputSanitizationPolicy {
    pub fn new() -> Self {
        Self::with_max_length(DEFAULT_MAX_INPUT_LENGTH)
    }

    pub fn with_max_length(max_length: usize) -> Self {
        let sql = [
            r";\s*--",
            r"\b(DROP|DELETE|INSERT|UPDATE|ALTER|CREATE|EXEC|EXECUTE)\b",
            r"UNION\s+SELECT",
            r"'\s*(OR|AND)\s+'",
            r"--",
        ];
        let xss = [
            r"<script[^>]*>",
            r"javascript:",
            r"on\w+\s*=",
            r"<iframe",
            r"<object",
            r"<embed",
        ];
        let compile = |pattern: &str| {
            RegexBuilder::new(pattern)
                .case_insensitive(true)
                .build()
                .expect("invalid sanitization pattern")
        };
        Self {
            max_length,
            sql_patterns: sql.iter().map(|p| compile(p)).collect(),
            xss_patterns: xss.iter().map(|p| compile(p)).collect(),
            traversal_pattern: compile(r"\.\./|\.\.\\"),
        }
    }
}

impl Default for InputSanitizationPolicy {
    fn default() -> Self {
        Self::new()
    }
}

impl Policy for InputSanitizationPolicy {
    fn evaluate(&self, context: &PolicyContext) -> PolicyResult {
        let text = context.user_input.as_deref().unwrap_or("");
        let mut violations = Map::new();

        let length = text.chars().count();
        if length > self.max_length {
            violations.insert(
                "length".to_string(),
                json!({"current": length, "max": self.max_length}),
            );
        }

        if let Some(pattern) = self.sql_patterns.iter().find(|p| p.is_match(text)) {
            warn!(pattern = pattern.as_str(), "SQL injection attempt detected");
            violations.insert(
                "sql_injection".to_string(),
                json!({"pattern": pattern.as_str(), "detected": "SQL injection attempt detected"}),
            );
        }

        if let Some(pattern) = self.xss_patterns.iter().find(|p| p.is_match(text)) {
            warn!(pattern = pattern.as_str(), "XSS attempt detected");
            violations.insert(
                "xss_attempt".to_string(),
                json!({"pattern": pattern.as_str(), "detected": "Cross-site scripting attempt detected"}),
            );
        }

        if self.traversal_pattern.is_match(text) {
            warn!("path traversal attempt detected");
            violations.insert(
                "path_traversal".to_string(),
                json!({"detected": "Path traversal attempt detected"}),
            );
        }

        PolicyResult::from_violations(violations)
    }

    fn name(&self) -> &'static str {
        "InputSanitizationPolicy"
    }

    fn description(&self) -> String {
        "Validates user input against SQL injection, XSS, and path traversal attacks.".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_content_filter_blocks_banned_word() {
        let policy = ContentFilterPolicy::new();
        let result = policy.evaluate(&PolicyContext::input("I hate this"));
        assert!(!result.passed);
        assert!(result.violations.contains_key("hate"));
    }

    #[test]
    fn test_content_filter_requires_word_boundary() {
        let policy = ContentFilterPolicy::new();
        // "hateful" should not match the banned word "hate"
        let result = policy.evaluate(&PolicyContext::input("shellfish is not hateful"));
        assert!(result.passed);
    }

    #[test]
    fn test_content_filter_is_case_insensitive() {
        let policy = ContentFilterPolicy::new();
        let result = policy.evaluate(&PolicyContext::input("WELL DAMN"));
        assert!(!result.passed);
    }

    #[test]
    fn test_content_filter_checks_responses_too() {
        let policy = ContentFilterPolicy::new();
        let result = policy.evaluate(&PolicyContext::response("that was stupid"));
        assert!(!result.passed);
    }

    #[test]
    fn test_response_length_within_limit_passes() {
        let policy = ResponseLengthPolicy::with_max_length(10);
        assert!(policy.evaluate(&PolicyContext::response("short")).passed);
    }

    #[test]
    fn test_response_length_over_limit_fails() {
        let policy = ResponseLengthPolicy::with_max_length(10);
        let result = policy.evaluate(&PolicyContext::response("definitely too long"));
        assert!(!result.passed);
        assert_eq!(result.violations["length"], json!(19));
    }

    #[test]
    fn test_response_length_ignores_input() {
        let policy = ResponseLengthPolicy::with_max_length(5);
        assert!(policy.evaluate(&PolicyContext::input("longer than five")).passed);
    }

    #[test]
    fn test_sanitization_detects_sql_injection() {
        let policy = InputSanitizationPolicy::new();
        let result = policy.evaluate(&PolicyContext::input("'; DROP TABLE users;--"));
        assert!(!result.passed);
        assert!(result.violations.contains_key("sql_injection"));
    }

    #[test]
    fn test_sanitization_detects_xss() {
        let policy = InputSanitizationPolicy::new();
        let result = policy.evaluate(&PolicyContext::input("<script>alert('xss')</script>"));
        assert!(!result.passed);
        assert!(result.violations.contains_key("xss_attempt"));
    }

    #[test]
    fn test_sanitization_detects_path_traversal() {
        let policy = InputSanitizationPolicy::new();
        let result = policy.evaluate(&PolicyContext::input("../../../etc/passwd"));
        assert!(!result.passed);
        assert!(result.violations.contains_key("path_traversal"));
    }

    #[test]
    fn test_sanitization_blocks_overlong_input() {
        let policy = InputSanitizationPolicy::with_max_length(8);
        let result = policy.evaluate(&PolicyContext::input("this is far too long"));
        assert!(!result.passed);
        assert!(result.violations.contains_key("length"));
    }

    #[test]
    fn test_sanitization_passes_normal_input() {
        let policy = InputSanitizationPolicy::new();
        assert!(policy.evaluate(&PolicyContext::input("Hello, world!")).passed);
    }

    #[test]
    fn test_sanitization_ignores_responses() {
        let policy = InputSanitizationPolicy::new();
        assert!(policy.evaluate(&PolicyContext::response("DROP TABLE users")).passed);
    }
}
