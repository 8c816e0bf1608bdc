//! In-process event bus with reliable, retrying delivery
//!
//! Components communicate through a typed publish/subscribe bus without
//! direct dependencies. Publishers must be registered for the event types
//! they emit; subscribers implement the [`EventHandler`] capability.
//!
//! ```text
//!  publish ──► bounded queue ──► dispatch loop ──► worker pool
//!                                                   │  retry × N
//!                                                   ▼
//!                                            dead-letter queue ◄─ sweep
//! ```
//!
//! Delivery is at-least-once: a failed handler is retried with the same event
//! until its attempts are exhausted, then the delivery is dead-lettered.
//! Handlers must be idempotent.

mod bus;
mod delivery;
mod error;
mod event;
mod handler;

pub use bus::{EventBus, EventBusConfig, DEFAULT_QUEUE_CAPACITY, DEFAULT_WORKERS};
pub use delivery::DeliveryRecord;
pub use error::{BusError, BusResult};
pub use event::{Event, EventType};
pub use handler::EventHandler;
