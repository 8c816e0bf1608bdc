//! Per-delivery bookkeeping
//!
//! One `DeliveryRecord` exists per (event, subscriber) pair, created at
//! dispatch time. It is discarded on success or moved to the dead-letter
//! queue once retries are exhausted.

use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use super::event::Event;
use super::handler::EventHandler;

/// Retry bookkeeping for one handler's processing of one event
pub struct DeliveryRecord {
    pub event: Event,
    /// Diagnostic name of the subscriber
    pub subscriber: String,
    pub(crate) handler: Arc<dyn EventHandler>,
    /// Delivery attempts made so far
    pub attempts: u32,
    pub last_attempt: Option<Instant>,
    /// Detail of the most recent failure
    pub error: Option<String>,
}

impl DeliveryRecord {
    pub(crate) fn new(event: Event, handler: Arc<dyn EventHandler>) -> Self {
        Self {
            event,
            subscriber: handler.name().to_string(),
            handler,
            attempts: 0,
            last_attempt: None,
            error: None,
        }
    }

    /// True iff another attempt is allowed and the retry delay has elapsed
    pub fn should_retry(&self, max_attempts: u32, delay: Duration) -> bool {
        if self.attempts >= max_attempts {
            return false;
        }
        match self.last_attempt {
            None => true,
            Some(at) => at.elapsed() >= delay,
        }
    }
}

impl fmt::Debug for DeliveryRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeliveryRecord")
            .field("event_type", &self.event.event_type)
            .field("subscriber", &self.subscriber)
            .field("attempts", &self.attempts)
            .field("last_attempt", &self.last_attempt)
            .field("error", &self.error)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use serde_json::Map;

    struct NoopHandler;

    #[async_trait]
    impl EventHandler for NoopHandler {
        fn name(&self) -> &str {
            "noop"
        }

        async fn handle(&self, _event: &Event) -> eyre::Result<()> {
            Ok(())
        }
    }

    fn record() -> DeliveryRecord {
        let event = Event::new("system.start", Map::new(), "test").unwrap();
        DeliveryRecord::new(event, Arc::new(NoopHandler))
    }

    #[test]
    fn test_fresh_record_should_retry() {
        let record = record();
        assert_eq!(record.attempts, 0);
        assert!(record.should_retry(3, Duration::from_secs(1)));
    }

    #[test]
    fn test_exhausted_record_should_not_retry() {
        let mut record = record();
        record.attempts = 3;
        assert!(!record.should_retry(3, Duration::from_secs(1)));
    }

    #[test]
    fn test_recent_attempt_blocks_retry() {
        let mut record = record();
        record.attempts = 1;
        record.last_attempt = Some(Instant::now());
        assert!(!record.should_retry(3, Duration::from_secs(60)));
        assert!(record.should_retry(3, Duration::ZERO));
    }
}
