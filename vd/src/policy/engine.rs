//! Policy evaluation engine
//!
//! Runs every registered policy over a context and merges violations keyed by
//! policy name. Policies are independent; ordering affects only the audit log.

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::Path;
use std::sync::Mutex;

use chrono::Utc;
use serde::Serialize;
use serde_json::{json, Map, Value};
use tracing::{debug, error};

/// Evaluation context: exactly one of input or response text is set
#[derive(Debug, Clone, Default, Serialize)]
pub struct PolicyContext {
    pub user_input: Option<String>,
    pub response: Option<String>,
}

impl PolicyContext {
    pub fn input(text: &str) -> Self {
        Self {
            user_input: Some(text.to_string()),
            response: None,
        }
    }

    pub fn response(text: &str) -> Self {
        Self {
            user_input: None,
            response: Some(text.to_string()),
        }
    }
}

/// Outcome of evaluating one policy, or the merged outcome of all of them
#[derive(Debug, Clone, Serialize)]
pub struct PolicyResult {
    pub passed: bool,
    /// For a single policy: violation key -> detail.
    /// For the engine aggregate: policy name -> that policy's violations.
    pub violations: Map<String, Value>,
}

impl PolicyResult {
    pub fn pass() -> Self {
        Self {
            passed: true,
            violations: Map::new(),
        }
    }

    pub fn from_violations(violations: Map<String, Value>) -> Self {
        Self {
            passed: violations.is_empty(),
            violations,
        }
    }
}

/// A pluggable, stateless-per-call rule over input or output text
pub trait Policy: Send + Sync {
    fn evaluate(&self, context: &PolicyContext) -> PolicyResult;
    fn name(&self) -> &'static str;
    fn description(&self) -> String;
}

/// Ordered set of policies with optional JSON-lines audit logging
pub struct PolicyEngine {
    policies: Vec<Box<dyn Policy>>,
    audit_log: Option<Mutex<File>>,
}

impl PolicyEngine {
    pub fn new() -> Self {
        Self {
            policies: Vec::new(),
            audit_log: None,
        }
    }

    /// Engine loaded with the standard guardrails
    pub fn with_default_policies() -> Self {
        use super::validators::{ContentFilterPolicy, InputSanitizationPolicy, ResponseLengthPolicy};

        let mut engine = Self::new();
        engine.add_policy(Box::new(ContentFilterPolicy::new()));
        engine.add_policy(Box::new(ResponseLengthPolicy::new()));
        engine.add_policy(Box::new(InputSanitizationPolicy::new()));
        engine
    }

    pub fn add_policy(&mut self, policy: Box<dyn Policy>) {
        debug!(policy = policy.name(), "policy registered");
        self.policies.push(policy);
    }

    /// Append every evaluation to a JSON-lines file at `path`
    pub fn enable_audit_logging(&mut self, path: impl AsRef<Path>) -> eyre::Result<()> {
        let file = OpenOptions::new().create(true).append(true).open(path.as_ref())?;
        self.audit_log = Some(Mutex::new(file));
        Ok(())
    }

    /// Names of the registered policies, in evaluation order
    pub fn policy_names(&self) -> Vec<&'static str> {
        self.policies.iter().map(|p| p.name()).collect()
    }

    pub fn evaluate_input(&self, user_input: &str) -> PolicyResult {
        self.evaluate(&PolicyContext::input(user_input))
    }

    pub fn evaluate_response(&self, response: &str) -> PolicyResult {
        self.evaluate(&PolicyContext::response(response))
    }

    /// Run every policy and merge violations keyed by policy name.
    ///
    /// The aggregate passes iff no policy produced a violation.
    pub fn evaluate(&self, context: &PolicyContext) -> PolicyResult {
        let mut violations = Map::new();
        for policy in &self.policies {
            let result = policy.evaluate(context);
            if !result.passed {
                violations.insert(policy.name().to_string(), Value::Object(result.violations));
            }
        }
        let result = PolicyResult::from_violations(violations);
        self.audit(context, &result);
        result
    }

    fn audit(&self, context: &PolicyContext, result: &PolicyResult) {
        let Some(audit_log) = &self.audit_log else {
            return;
        };
        let entry = json!({
            "timestamp": Utc::now().to_rfc3339(),
            "context": context,
            "result": result,
            "policies": self.policy_names(),
        });
        let mut file = audit_log.lock().expect("audit log lock poisoned");
        if let Err(e) = writeln!(file, "{entry}") {
            error!(error = %e, "failed to write audit log entry");
        }
    }
}

impl Default for PolicyEngine {
    fn default() -> Self {
        Self::new()
    }
}
