//! voxstore - embedded SQLite state store for the voxd orchestration core
//!
//! Durable, append-only persistence for conversation turns and system events:
//!
//! - **Connection pooling**: fixed-size, mutex-guarded pool that fails fast
//!   when exhausted instead of queuing
//! - **Schema migrations**: versioned, transactional, applied at open
//! - **Structured columns**: `metadata`/`payload`/`detected_intent` are JSON,
//!   parsed with serde on the way out
//!
//! The store is synchronous; async callers treat writes as best-effort and
//! must not let store failures reach the conversational path.

mod error;
mod migrations;
mod models;
mod pool;
mod queries;
mod store;

pub use error::{StoreError, StoreResult};
pub use migrations::{run_migrations, FutureExpansion, InitialSchema, Migration};
pub use models::{Alert, AlertSeverity, ConversationTurn, SystemEventRecord};
pub use pool::{ConnectionPool, PooledConnection};
pub use store::{StateStore, DEFAULT_POOL_SIZE};
