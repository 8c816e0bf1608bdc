//! Event types for the orchestration bus
//!
//! The event-type registry is closed: adding a type means extending
//! [`EventType`] and updating the publishers/subscribers that speak it.
//! Specialized events are built through factory functions on [`Event`] rather
//! than subtypes; the discriminant is the `event_type` field.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

use super::error::{BusError, BusResult};

/// The closed registry of event types the bus will route
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub enum EventType {
    SystemStart,
    SystemShutdown,
    ConversationTurn,
    StateUpdated,
}

impl EventType {
    /// Wire name of this event type
    pub fn as_str(&self) -> &'static str {
        match self {
            EventType::SystemStart => "system.start",
            EventType::SystemShutdown => "system.shutdown",
            EventType::ConversationTurn => "conversation.turn",
            EventType::StateUpdated => "state.updated",
        }
    }

    /// Every member of the registry
    pub fn all() -> &'static [EventType] {
        &[
            EventType::SystemStart,
            EventType::SystemShutdown,
            EventType::ConversationTurn,
            EventType::StateUpdated,
        ]
    }

    /// Parse a wire name, rejecting anything outside the registry
    pub fn parse(s: &str) -> BusResult<Self> {
        match s {
            "system.start" => Ok(EventType::SystemStart),
            "system.shutdown" => Ok(EventType::SystemShutdown),
            "conversation.turn" => Ok(EventType::ConversationTurn),
            "state.updated" => Ok(EventType::StateUpdated),
            other => Err(BusError::InvalidEventType(other.to_string())),
        }
    }
}

impl std::fmt::Display for EventType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl From<EventType> for String {
    fn from(value: EventType) -> Self {
        value.as_str().to_string()
    }
}

impl TryFrom<String> for EventType {
    type Error = BusError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        EventType::parse(&value)
    }
}

/// A discrete message on the bus.
///
/// Events are immutable once constructed; correlated events are produced by
/// copying fields while retaining the original `correlation_id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub event_type: EventType,
    pub payload: Map<String, Value>,
    pub source: String,
    pub timestamp: DateTime<Utc>,
    pub correlation_id: String,
}

impl Event {
    /// Build an event from a wire-name event type, generating a correlation id
    pub fn new(event_type: &str, payload: Map<String, Value>, source: &str) -> BusResult<Self> {
        Self::from_parts(EventType::parse(event_type)?, payload, source)
    }

    /// Build an event with an explicit correlation id
    pub fn with_correlation_id(
        event_type: &str,
        payload: Map<String, Value>,
        source: &str,
        correlation_id: &str,
    ) -> BusResult<Self> {
        let mut event = Self::new(event_type, payload, source)?;
        event.correlation_id = correlation_id.to_string();
        Ok(event)
    }

    /// Build an event from an already-validated type
    pub fn from_parts(event_type: EventType, payload: Map<String, Value>, source: &str) -> BusResult<Self> {
        if source.is_empty() {
            return Err(BusError::EmptySource);
        }
        Ok(Self {
            event_type,
            payload,
            source: source.to_string(),
            timestamp: Utc::now(),
            correlation_id: Uuid::now_v7().to_string(),
        })
    }

    /// Produce a new event causally linked to this one (same correlation id).
    ///
    /// Fields left as `None` are copied from the original.
    pub fn correlate(
        &self,
        new_type: Option<EventType>,
        new_payload: Option<Map<String, Value>>,
        new_source: Option<&str>,
    ) -> BusResult<Self> {
        let source = new_source.unwrap_or(&self.source);
        if source.is_empty() {
            return Err(BusError::EmptySource);
        }
        Ok(Self {
            event_type: new_type.unwrap_or(self.event_type),
            payload: new_payload.unwrap_or_else(|| self.payload.clone()),
            source: source.to_string(),
            timestamp: Utc::now(),
            correlation_id: self.correlation_id.clone(),
        })
    }

    pub fn to_json(&self) -> BusResult<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_json(json: &str) -> BusResult<Self> {
        Ok(serde_json::from_str(json)?)
    }

    // === Factories for the specialized events ===

    /// Emitted when the system starts
    pub fn system_start(source: &str, version: &str, configuration: Value) -> BusResult<Self> {
        let mut payload = Map::new();
        payload.insert("version".to_string(), Value::String(version.to_string()));
        payload.insert("configuration".to_string(), configuration);
        payload.insert("components".to_string(), Value::Array(Vec::new()));
        Self::from_parts(EventType::SystemStart, payload, source)
    }

    /// Emitted when the system is shutting down
    pub fn system_shutdown(source: &str, reason: &str, graceful: bool) -> BusResult<Self> {
        let mut payload = Map::new();
        payload.insert("reason".to_string(), Value::String(reason.to_string()));
        payload.insert("graceful".to_string(), Value::Bool(graceful));
        Self::from_parts(EventType::SystemShutdown, payload, source)
    }

    /// Emitted for each completed conversation interaction
    pub fn conversation_turn(
        source: &str,
        session_id: &str,
        user_input: &str,
        assistant_response: &str,
        intent: Option<Value>,
        processing_time_ms: f64,
    ) -> BusResult<Self> {
        let mut payload = Map::new();
        payload.insert("session_id".to_string(), Value::String(session_id.to_string()));
        payload.insert("user_input".to_string(), Value::String(user_input.to_string()));
        payload.insert(
            "assistant_response".to_string(),
            Value::String(assistant_response.to_string()),
        );
        payload.insert("intent".to_string(), intent.unwrap_or(Value::Null));
        payload.insert("processing_time".to_string(), processing_time_ms.into());
        Self::from_parts(EventType::ConversationTurn, payload, source)
    }

    /// Emitted when system state is modified
    pub fn state_updated(source: &str, changes: Value, entity_type: &str, entity_id: &str) -> BusResult<Self> {
        let mut payload = Map::new();
        payload.insert("changes".to_string(), changes);
        payload.insert("entity_type".to_string(), Value::String(entity_type.to_string()));
        payload.insert("entity_id".to_string(), Value::String(entity_id.to_string()));
        Self::from_parts(EventType::StateUpdated, payload, source)
    }
}

impl std::fmt::Display for Event {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} from {} at {}", self.event_type, self.source, self.timestamp)
    }
}
