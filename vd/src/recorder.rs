//! System event persistence
//!
//! Bridges the bus to the state store: every system-level event it sees is
//! appended to the `system_events` table. Store failures surface as handler
//! errors so the bus retry and dead-letter machinery applies to them.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tracing::debug;

use voxstore::{StateStore, SystemEventRecord};

use crate::bus::{BusResult, Event, EventBus, EventHandler};

/// Event types the recorder persists
const RECORDED_TYPES: &[&str] = &["system.start", "system.shutdown", "state.updated"];

/// Handler that writes system events into the state store
pub struct SystemEventRecorder {
    store: Arc<StateStore>,
}

impl SystemEventRecorder {
    pub fn new(store: Arc<StateStore>) -> Self {
        Self { store }
    }

    /// Subscribe a recorder to every system-level event type on the bus
    pub fn attach(bus: &EventBus, store: Arc<StateStore>) -> BusResult<Arc<Self>> {
        let recorder = Arc::new(Self::new(store));
        for event_type in RECORDED_TYPES {
            bus.subscribe(event_type, recorder.clone())?;
        }
        debug!(types = RECORDED_TYPES.len(), "system event recorder attached");
        Ok(recorder)
    }
}

#[async_trait]
impl EventHandler for SystemEventRecorder {
    fn name(&self) -> &str {
        "system_event_recorder"
    }

    async fn handle(&self, event: &Event) -> eyre::Result<()> {
        let record = SystemEventRecord {
            event_type: event.event_type.as_str().to_string(),
            payload: Value::Object(event.payload.clone()),
            timestamp: event.timestamp,
            source: event.source.clone(),
            correlation_id: Some(event.correlation_id.clone()),
        };
        self.store.log_system_event(&record)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::EventBusConfig;
    use serde_json::json;
    use std::time::Duration;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_recorder_persists_system_events() {
        let temp = tempdir().unwrap();
        let store = Arc::new(StateStore::open(temp.path().join("vox.db")).unwrap());
        let bus = EventBus::new(EventBusConfig {
            retry_delay: Duration::from_millis(10),
            ..Default::default()
        });
        bus.register_publisher("system", &["system.start", "system.shutdown"]).unwrap();
        SystemEventRecorder::attach(&bus, store.clone()).unwrap();

        let event = Event::system_start("system", "0.1.0", json!({"debug": false})).unwrap();
        let correlation_id = event.correlation_id.clone();
        bus.publish(event).await.unwrap();
        tokio::time::sleep(Duration::from_millis(100)).await;

        let recorded = store.system_events("system.start", 10).unwrap();
        assert_eq!(recorded.len(), 1);
        assert_eq!(recorded[0].source, "system");
        assert_eq!(recorded[0].correlation_id.as_deref(), Some(correlation_id.as_str()));
        assert_eq!(recorded[0].payload["version"], json!("0.1.0"));
        bus.shutdown().await;
    }

    #[tokio::test]
    async fn test_recorder_ignores_conversation_turns() {
        let temp = tempdir().unwrap();
        let store = Arc::new(StateStore::open(temp.path().join("vox.db")).unwrap());
        let bus = EventBus::with_defaults();
        SystemEventRecorder::attach(&bus, store.clone()).unwrap();

        assert_eq!(bus.subscriber_count("conversation.turn").unwrap(), 0);
        assert_eq!(bus.subscriber_count("system.start").unwrap(), 1);
        assert_eq!(bus.subscriber_count("state.updated").unwrap(), 1);
        bus.shutdown().await;
    }
}
