//! Turn-processing pipeline
//!
//! The single entry point collaborators call: policy-check the input, run the
//! dialog manager, policy-check the output, persist the turn. Policy
//! violations are returned as rejection text; persistence is best-effort and
//! never affects the response the caller sees.

use std::sync::{Arc, Mutex};
use std::time::Instant;

use chrono::Utc;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, error};
use uuid::Uuid;

use voxstore::{ConversationTurn, StateStore};

use crate::bus::EventBus;
use crate::dialog::DialogManager;
use crate::intent::{Intent, IntentPatterns};
use crate::policy::{PolicyEngine, PolicyResult};

/// One entry of the in-memory performance log
#[derive(Debug, Clone, Serialize)]
pub struct PerformanceSample {
    pub session_id: String,
    pub input: String,
    pub response: String,
    /// Wall-clock seconds for the dialog path of this call
    pub processing_time_secs: f64,
    pub input_policy: PolicyResult,
    pub response_policy: PolicyResult,
}

/// Orchestrates a single conversation turn end to end
pub struct Pipeline {
    dialog: DialogManager,
    policy: PolicyEngine,
    store: Arc<StateStore>,
    current_session: tokio::sync::Mutex<Option<String>>,
    samples: Mutex<Vec<PerformanceSample>>,
}

impl Pipeline {
    /// Build a pipeline from explicit components
    pub fn new(
        bus: Arc<EventBus>,
        patterns: IntentPatterns,
        policy: PolicyEngine,
        store: Arc<StateStore>,
    ) -> eyre::Result<Self> {
        let dialog = DialogManager::new(bus, patterns)?;
        Ok(Self {
            dialog,
            policy,
            store,
            current_session: tokio::sync::Mutex::new(None),
            samples: Mutex::new(Vec::new()),
        })
    }

    /// Build a pipeline with embedded patterns and the standard policies
    pub fn with_defaults(bus: Arc<EventBus>, store: Arc<StateStore>) -> eyre::Result<Self> {
        Self::new(
            bus,
            IntentPatterns::embedded(),
            PolicyEngine::with_default_policies(),
            store,
        )
    }

    /// Start a new default session and return its id
    pub async fn start_session(&self) -> String {
        let session_id = Uuid::now_v7().to_string();
        *self.current_session.lock().await = Some(session_id.clone());
        debug!(%session_id, "session started");
        session_id
    }

    /// End the current default session
    pub async fn end_session(&self) {
        *self.current_session.lock().await = None;
    }

    /// Process text input through the pipeline.
    ///
    /// Input that fails policy is rejected immediately: no intent detection,
    /// no persistence, no turn event. A response that fails policy is blocked
    /// at the return value only; the turn is still persisted and sampled.
    pub async fn process_text_input(&self, text: &str, session_id: Option<&str>) -> String {
        let session_id = match session_id {
            Some(id) => id.to_string(),
            None => {
                let mut current = self.current_session.lock().await;
                match current.as_ref() {
                    Some(id) => id.clone(),
                    None => {
                        let id = Uuid::now_v7().to_string();
                        *current = Some(id.clone());
                        debug!(session_id = %id, "session started");
                        id
                    }
                }
            }
        };

        let input_policy = self.policy.evaluate_input(text);
        if !input_policy.passed {
            debug!(%session_id, "input rejected by policy");
            return format!(
                "Input rejected due to policy violation: {}",
                Value::Object(input_policy.violations)
            );
        }

        let started = Instant::now();
        let turn = self.dialog.process_input(&session_id, text).await;
        let response_policy = self.policy.evaluate_response(&turn.response);
        let elapsed = started.elapsed().as_secs_f64();

        self.samples.lock().expect("samples lock poisoned").push(PerformanceSample {
            session_id: session_id.clone(),
            input: text.to_string(),
            response: turn.response.clone(),
            processing_time_secs: elapsed,
            input_policy,
            response_policy: response_policy.clone(),
        });

        self.persist_turn(&session_id, text, &turn.response, turn.intent.as_ref(), turn.processing_time_ms);

        if !response_policy.passed {
            debug!(%session_id, "response blocked by policy");
            return format!(
                "Response blocked due to policy violation: {}",
                Value::Object(response_policy.violations)
            );
        }
        turn.response
    }

    /// Best-effort persistence; failures are logged and swallowed
    fn persist_turn(
        &self,
        session_id: &str,
        user_input: &str,
        response: &str,
        intent: Option<&Intent>,
        processing_time_ms: f64,
    ) {
        let record = ConversationTurn {
            session_id: session_id.to_string(),
            user_input: user_input.to_string(),
            assistant_response: response.to_string(),
            detected_intent: intent.map(Intent::to_value),
            processing_time_ms: Some(processing_time_ms as i64),
            timestamp: Utc::now(),
            metadata: None,
        };
        if let Err(e) = self.store.log_conversation_turn(&record) {
            error!(session_id, error = %e, "failed to log conversation turn");
        }
    }

    /// Snapshot of the collected performance samples
    pub fn get_performance_stats(&self) -> Vec<PerformanceSample> {
        self.samples.lock().expect("samples lock poisoned").clone()
    }

    /// The dialog manager, for session introspection
    pub fn dialog(&self) -> &DialogManager {
        &self.dialog
    }
}
