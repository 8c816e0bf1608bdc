//! Dialog management
//!
//! The DialogManager owns per-session conversation state and turns one user
//! utterance into one assistant response: detect intent, generate a response,
//! update the session, publish a turn event. Nothing in here throws at the
//! caller; every internal failure degrades to an apologetic response.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use serde::Serialize;
use serde_json::{json, Map, Value};
use tokio::sync::Mutex;
use tracing::{debug, error};

use crate::bus::{BusResult, Event, EventBus};
use crate::intent::{Intent, IntentPatterns, RuleBasedIntentDetector};
use crate::response::TemplateResponseGenerator;

/// Publisher id the dialog manager registers on the bus
pub const PUBLISHER_NAME: &str = "dialog_manager";

const ERROR_APOLOGY: &str = "I apologize, but I encountered an error. Please try again.";

/// Mutable per-session conversation state.
///
/// Created lazily on the first turn and kept for the process lifetime.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SessionContext {
    pub turn_count: u64,
    pub last_intent: Option<String>,
    pub last_response: Option<String>,
}

impl SessionContext {
    fn to_map(&self) -> Map<String, Value> {
        let mut map = Map::new();
        map.insert("turn_count".to_string(), json!(self.turn_count));
        map.insert(
            "last_intent".to_string(),
            self.last_intent.clone().map(Value::String).unwrap_or(Value::Null),
        );
        map.insert(
            "last_response".to_string(),
            self.last_response.clone().map(Value::String).unwrap_or(Value::Null),
        );
        map
    }
}

/// Result of processing one turn: the response text plus what was detected
#[derive(Debug, Clone)]
pub struct TurnResult {
    pub response: String,
    pub intent: Option<Intent>,
    pub processing_time_ms: f64,
}

/// Orchestrates intent detection and response generation per session
pub struct DialogManager {
    bus: Arc<EventBus>,
    detector: RuleBasedIntentDetector,
    generator: TemplateResponseGenerator,
    sessions: Mutex<HashMap<String, SessionContext>>,
}

impl DialogManager {
    /// Create a dialog manager and register it as a turn-event publisher
    pub fn new(bus: Arc<EventBus>, patterns: IntentPatterns) -> eyre::Result<Self> {
        let detector = RuleBasedIntentDetector::new(&patterns)?;
        bus.register_publisher(PUBLISHER_NAME, &["conversation.turn"])?;
        Ok(Self {
            bus,
            detector,
            generator: TemplateResponseGenerator::new(),
            sessions: Mutex::new(HashMap::new()),
        })
    }

    /// Process user input and generate a response.
    ///
    /// Never fails: any internal error is logged and converted into a generic
    /// apology so the collaborator always gets text back.
    pub async fn process_input(&self, session_id: &str, user_input: &str) -> TurnResult {
        let started = Instant::now();
        match self.process_inner(session_id, user_input, started).await {
            Ok(result) => result,
            Err(e) => {
                error!(session_id, error = %e, "error processing input");
                TurnResult {
                    response: ERROR_APOLOGY.to_string(),
                    intent: None,
                    processing_time_ms: started.elapsed().as_secs_f64() * 1000.0,
                }
            }
        }
    }

    async fn process_inner(&self, session_id: &str, user_input: &str, started: Instant) -> BusResult<TurnResult> {
        // Intent detection is infallible by construction; a detector that
        // matched nothing is simply "no intent"
        let intent = self.detector.detect_intent(user_input);

        let (response, context_snapshot) = {
            let mut sessions = self.sessions.lock().await;
            let context = sessions.entry(session_id.to_string()).or_default();

            let response = self.generate_response(intent.as_ref(), context);

            context.turn_count += 1;
            context.last_intent = intent.as_ref().map(|i| i.name.clone());
            context.last_response = Some(response.clone());
            (response, context.clone())
        };
        debug!(
            session_id,
            turn = context_snapshot.turn_count,
            intent = ?context_snapshot.last_intent,
            "processed turn"
        );

        let processing_time_ms = started.elapsed().as_secs_f64() * 1000.0;
        self.publish_turn_event(session_id, user_input, &response, intent.as_ref(), processing_time_ms)
            .await?;

        Ok(TurnResult {
            response,
            intent,
            processing_time_ms,
        })
    }

    fn generate_response(&self, intent: Option<&Intent>, context: &SessionContext) -> String {
        let context_map = context.to_map();
        match intent {
            None => self.generator.generate_response("default", &Map::new(), Some(&context_map)),
            Some(intent) => self
                .generator
                .generate_response(&intent.name, &intent.entities, Some(&context_map)),
        }
    }

    async fn publish_turn_event(
        &self,
        session_id: &str,
        user_input: &str,
        response: &str,
        intent: Option<&Intent>,
        processing_time_ms: f64,
    ) -> BusResult<()> {
        let event = Event::conversation_turn(
            PUBLISHER_NAME,
            session_id,
            user_input,
            response,
            intent.map(Intent::to_value),
            processing_time_ms,
        )?;
        self.bus.publish(event).await
    }

    /// Snapshot of a session's context, if the session exists
    pub async fn session_context(&self, session_id: &str) -> Option<SessionContext> {
        self.sessions.lock().await.get(session_id).cloned()
    }

    /// Number of sessions seen so far
    pub async fn session_count(&self) -> usize {
        self.sessions.lock().await.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::{EventBusConfig, EventHandler};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    struct TurnCounter {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl EventHandler for TurnCounter {
        fn name(&self) -> &str {
            "turn_counter"
        }

        async fn handle(&self, _event: &Event) -> eyre::Result<()> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    fn test_bus() -> Arc<EventBus> {
        Arc::new(EventBus::new(EventBusConfig {
            capacity: 16,
            retry_delay: Duration::from_millis(10),
            ..Default::default()
        }))
    }

    #[tokio::test]
    async fn test_process_input_returns_response() {
        let bus = test_bus();
        let manager = DialogManager::new(bus.clone(), IntentPatterns::embedded()).unwrap();

        let result = manager.process_input("session-1", "hello").await;
        assert!(!result.response.is_empty());
        assert_eq!(result.intent.as_ref().unwrap().name, "greeting");
        bus.shutdown().await;
    }

    #[tokio::test]
    async fn test_session_context_tracks_turns() {
        let bus = test_bus();
        let manager = DialogManager::new(bus.clone(), IntentPatterns::embedded()).unwrap();

        manager.process_input("session-1", "hello").await;
        let second = manager.process_input("session-1", "what time is it").await;

        let context = manager.session_context("session-1").await.unwrap();
        assert_eq!(context.turn_count, 2);
        assert_eq!(context.last_intent.as_deref(), Some("time.query"));
        assert_eq!(context.last_response.as_deref(), Some(second.response.as_str()));
        bus.shutdown().await;
    }

    #[tokio::test]
    async fn test_sessions_are_independent() {
        let bus = test_bus();
        let manager = DialogManager::new(bus.clone(), IntentPatterns::embedded()).unwrap();

        manager.process_input("session-a", "hello").await;
        manager.process_input("session-b", "hello").await;
        manager.process_input("session-b", "goodbye").await;

        assert_eq!(manager.session_context("session-a").await.unwrap().turn_count, 1);
        assert_eq!(manager.session_context("session-b").await.unwrap().turn_count, 2);
        bus.shutdown().await;
    }

    #[tokio::test]
    async fn test_unmatched_input_counts_as_no_intent() {
        let bus = test_bus();
        let manager = DialogManager::new(bus.clone(), IntentPatterns::embedded()).unwrap();

        let result = manager.process_input("session-1", "flibbertigibbet").await;
        assert!(result.intent.is_none());
        assert!(!result.response.is_empty());

        let context = manager.session_context("session-1").await.unwrap();
        assert_eq!(context.turn_count, 1);
        assert!(context.last_intent.is_none());
        bus.shutdown().await;
    }

    #[tokio::test]
    async fn test_turn_event_is_published() {
        let bus = test_bus();
        let manager = DialogManager::new(bus.clone(), IntentPatterns::embedded()).unwrap();
        let counter = Arc::new(TurnCounter {
            calls: AtomicUsize::new(0),
        });
        bus.subscribe("conversation.turn", counter.clone()).unwrap();

        manager.process_input("session-1", "hello").await;
        tokio::time::sleep(Duration::from_millis(50)).await;

        assert_eq!(counter.calls.load(Ordering::SeqCst), 1);
        bus.shutdown().await;
    }

    #[tokio::test]
    async fn test_bus_shutdown_degrades_to_apology() {
        let bus = test_bus();
        let manager = DialogManager::new(bus.clone(), IntentPatterns::embedded()).unwrap();
        bus.shutdown().await;

        // publish fails after shutdown; the caller still gets text
        let result = manager.process_input("session-1", "hello").await;
        assert_eq!(result.response, ERROR_APOLOGY);
        assert!(result.intent.is_none());
    }
}
