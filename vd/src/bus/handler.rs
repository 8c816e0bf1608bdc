//! Subscriber capability
//!
//! A handler is any capability that can process an [`Event`]. The bus expects
//! handlers to be idempotent: delivery is at-least-once, and a handler that
//! fails is retried with the same event.

use async_trait::async_trait;

use super::event::Event;

/// The narrow interface every subscriber implements.
///
/// Handler identity is the `Arc` pointer: subscribing the same `Arc` twice is
/// a no-op, and `unsubscribe` takes the same `Arc` to remove it. `name()` is
/// used for logging and dead-letter bookkeeping only.
#[async_trait]
pub trait EventHandler: Send + Sync {
    /// Diagnostic name for this handler
    fn name(&self) -> &str;

    /// Process one event. Errors are retried per bus policy and never reach
    /// the publisher.
    async fn handle(&self, event: &Event) -> eyre::Result<()>;
}
