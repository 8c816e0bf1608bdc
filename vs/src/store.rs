//! SQLite-backed state store
//!
//! Append-only persistence for conversation turns and system events, plus the
//! alert table reserved for later phases. All writes go through the fixed-size
//! connection pool; migration failure at open is fatal.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Duration, Utc};
use rusqlite::params;
use tracing::{debug, info};

use crate::error::{StoreError, StoreResult};
use crate::migrations::run_migrations;
use crate::models::{Alert, ConversationTurn, SystemEventRecord};
use crate::pool::ConnectionPool;
use crate::queries;

/// Default maximum number of concurrent database connections
pub const DEFAULT_POOL_SIZE: usize = 5;

/// Persistent state store for the orchestration core
pub struct StateStore {
    pool: ConnectionPool,
    path: PathBuf,
}

impl StateStore {
    /// Open (or create) a store at the given path with the default pool size
    pub fn open(path: impl AsRef<Path>) -> StoreResult<Self> {
        Self::open_with_pool_size(path, DEFAULT_POOL_SIZE)
    }

    /// Open (or create) a store with an explicit pool size.
    ///
    /// Runs pending migrations; a migration failure aborts the open.
    pub fn open_with_pool_size(path: impl AsRef<Path>, pool_size: usize) -> StoreResult<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let pool = ConnectionPool::new(&path, pool_size);
        {
            let conn = pool.get()?;
            run_migrations(&conn)?;
        }
        info!(path = %path.display(), pool_size, "state store opened");

        Ok(Self { pool, path })
    }

    /// Record a completed conversation turn
    pub fn log_conversation_turn(&self, turn: &ConversationTurn) -> StoreResult<()> {
        debug!(session_id = %turn.session_id, "logging conversation turn");
        let conn = self.pool.get()?;
        conn.execute(
            queries::INSERT_CONVERSATION,
            params![
                turn.session_id,
                turn.user_input,
                turn.assistant_response,
                turn.detected_intent.as_ref().map(|v| v.to_string()),
                turn.processing_time_ms,
                turn.timestamp.to_rfc3339(),
                turn.metadata.as_ref().map(|v| v.to_string()),
            ],
        )
        .map_err(StoreError::Query)?;
        Ok(())
    }

    /// Get conversation history for a session, newest first
    pub fn conversation_history(&self, session_id: &str, limit: u32) -> StoreResult<Vec<ConversationTurn>> {
        let conn = self.pool.get()?;
        let mut stmt = conn
            .prepare(queries::GET_CONVERSATION_HISTORY)
            .map_err(StoreError::Query)?;
        let rows = stmt
            .query_map(params![session_id, limit], |row| ConversationTurn::from_row(row))
            .map_err(StoreError::Query)?;
        rows.collect::<rusqlite::Result<Vec<_>>>().map_err(StoreError::Query)
    }

    /// Record a system event
    pub fn log_system_event(&self, event: &SystemEventRecord) -> StoreResult<()> {
        debug!(event_type = %event.event_type, source = %event.source, "logging system event");
        let conn = self.pool.get()?;
        conn.execute(
            queries::INSERT_SYSTEM_EVENT,
            params![
                event.event_type,
                event.payload.to_string(),
                event.timestamp.to_rfc3339(),
                event.source,
                event.correlation_id,
            ],
        )
        .map_err(StoreError::Query)?;
        Ok(())
    }

    /// Get system events of a specific type, newest first
    pub fn system_events(&self, event_type: &str, limit: u32) -> StoreResult<Vec<SystemEventRecord>> {
        let conn = self.pool.get()?;
        let mut stmt = conn
            .prepare(queries::GET_SYSTEM_EVENTS)
            .map_err(StoreError::Query)?;
        let rows = stmt
            .query_map(params![event_type, limit], |row| SystemEventRecord::from_row(row))
            .map_err(StoreError::Query)?;
        rows.collect::<rusqlite::Result<Vec<_>>>().map_err(StoreError::Query)
    }

    /// Record an alert, returning its database id
    pub fn log_alert(&self, alert: &Alert) -> StoreResult<i64> {
        let conn = self.pool.get()?;
        conn.execute(
            queries::INSERT_ALERT,
            params![
                alert.alert_type,
                alert.severity.as_str(),
                alert.message,
                alert.timestamp.to_rfc3339(),
                alert.resolved_at.map(|t| t.to_rfc3339()),
                alert.metadata.as_ref().map(|v| v.to_string()),
            ],
        )
        .map_err(StoreError::Query)?;
        Ok(conn.last_insert_rowid())
    }

    /// All alerts without a resolution timestamp, newest first
    pub fn unresolved_alerts(&self) -> StoreResult<Vec<Alert>> {
        let conn = self.pool.get()?;
        let mut stmt = conn
            .prepare(queries::GET_UNRESOLVED_ALERTS)
            .map_err(StoreError::Query)?;
        let rows = stmt
            .query_map([], |row| Alert::from_row(row))
            .map_err(StoreError::Query)?;
        rows.collect::<rusqlite::Result<Vec<_>>>().map_err(StoreError::Query)
    }

    /// Mark an alert resolved
    pub fn resolve_alert(&self, alert_id: i64, resolved_at: DateTime<Utc>) -> StoreResult<()> {
        let conn = self.pool.get()?;
        conn.execute(queries::RESOLVE_ALERT, params![alert_id, resolved_at.to_rfc3339()])
            .map_err(StoreError::Query)?;
        Ok(())
    }

    /// Delete records older than the retention windows
    pub fn cleanup_old_data(&self, conversation_days: i64, event_days: i64) -> StoreResult<()> {
        let conn = self.pool.get()?;
        let conversation_cutoff = Utc::now() - Duration::days(conversation_days);
        let event_cutoff = Utc::now() - Duration::days(event_days);

        let turns = conn
            .execute(
                queries::CLEANUP_OLD_CONVERSATIONS,
                params![conversation_cutoff.to_rfc3339()],
            )
            .map_err(StoreError::Query)?;
        let events = conn
            .execute(queries::CLEANUP_OLD_EVENTS, params![event_cutoff.to_rfc3339()])
            .map_err(StoreError::Query)?;
        info!(turns, events, "cleaned up old records");
        Ok(())
    }

    /// Write a consistent snapshot of the database to `backup_path`
    pub fn backup_database(&self, backup_path: impl AsRef<Path>) -> StoreResult<()> {
        let conn = self.pool.get()?;
        conn.execute(
            "VACUUM INTO ?1",
            params![backup_path.as_ref().to_string_lossy()],
        )
        .map_err(StoreError::Query)?;
        Ok(())
    }

    /// Path of the backing database file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Close all idle connections
    pub fn close(&self) {
        self.pool.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::AlertSeverity;
    use serde_json::json;
    use tempfile::tempdir;

    fn open_store() -> (tempfile::TempDir, StateStore) {
        let temp = tempdir().unwrap();
        let store = StateStore::open(temp.path().join("vox.db")).unwrap();
        (temp, store)
    }

    fn sample_turn(session_id: &str) -> ConversationTurn {
        ConversationTurn {
            session_id: session_id.to_string(),
            user_input: "what time is it".to_string(),
            assistant_response: "It's 10:30 AM.".to_string(),
            detected_intent: Some(json!({"name": "time.query", "confidence": 0.8})),
            processing_time_ms: Some(12),
            timestamp: Utc::now(),
            metadata: None,
        }
    }

    #[test]
    fn test_conversation_turn_round_trip() {
        let (_temp, store) = open_store();
        let turn = sample_turn("session-1");
        store.log_conversation_turn(&turn).unwrap();

        let history = store.conversation_history("session-1", 10).unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].session_id, turn.session_id);
        assert_eq!(history[0].user_input, turn.user_input);
        assert_eq!(history[0].assistant_response, turn.assistant_response);
        assert_eq!(history[0].detected_intent, turn.detected_intent);
    }

    #[test]
    fn test_history_is_scoped_to_session() {
        let (_temp, store) = open_store();
        store.log_conversation_turn(&sample_turn("session-a")).unwrap();
        store.log_conversation_turn(&sample_turn("session-b")).unwrap();

        let history = store.conversation_history("session-a", 10).unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].session_id, "session-a");
    }

    #[test]
    fn test_history_respects_limit() {
        let (_temp, store) = open_store();
        for i in 0..5 {
            let mut turn = sample_turn("session-1");
            turn.timestamp = Utc::now() + Duration::milliseconds(i);
            store.log_conversation_turn(&turn).unwrap();
        }

        let history = store.conversation_history("session-1", 3).unwrap();
        assert_eq!(history.len(), 3);
    }

    #[test]
    fn test_system_event_round_trip() {
        let (_temp, store) = open_store();
        let event = SystemEventRecord {
            event_type: "system.start".to_string(),
            payload: json!({"version": "0.1.0"}),
            timestamp: Utc::now(),
            source: "system".to_string(),
            correlation_id: Some("corr-1".to_string()),
        };
        store.log_system_event(&event).unwrap();

        let events = store.system_events("system.start", 10).unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].payload, event.payload);
        assert_eq!(events[0].correlation_id, event.correlation_id);
    }

    #[test]
    fn test_alert_lifecycle() {
        let (_temp, store) = open_store();
        let alert = Alert::new("sensor.offline", AlertSeverity::High, "Kitchen sensor offline");
        let id = store.log_alert(&alert).unwrap();

        let unresolved = store.unresolved_alerts().unwrap();
        assert_eq!(unresolved.len(), 1);
        assert_eq!(unresolved[0].id, Some(id));
        assert_eq!(unresolved[0].severity, AlertSeverity::High);

        store.resolve_alert(id, Utc::now()).unwrap();
        assert!(store.unresolved_alerts().unwrap().is_empty());
    }

    #[test]
    fn test_cleanup_removes_old_records() {
        let (_temp, store) = open_store();
        let mut old_turn = sample_turn("session-1");
        old_turn.timestamp = Utc::now() - Duration::days(60);
        store.log_conversation_turn(&old_turn).unwrap();
        store.log_conversation_turn(&sample_turn("session-1")).unwrap();

        store.cleanup_old_data(30, 7).unwrap();

        let history = store.conversation_history("session-1", 10).unwrap();
        assert_eq!(history.len(), 1);
    }

    #[test]
    fn test_reopen_preserves_data() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("vox.db");
        {
            let store = StateStore::open(&path).unwrap();
            store.log_conversation_turn(&sample_turn("session-1")).unwrap();
        }

        let store = StateStore::open(&path).unwrap();
        let history = store.conversation_history("session-1", 10).unwrap();
        assert_eq!(history.len(), 1);
    }

    #[test]
    fn test_backup_database() {
        let (_temp, store) = open_store();
        store.log_conversation_turn(&sample_turn("session-1")).unwrap();

        let backup_dir = tempdir().unwrap();
        let backup_path = backup_dir.path().join("backup.db");
        store.backup_database(&backup_path).unwrap();

        let restored = StateStore::open(&backup_path).unwrap();
        assert_eq!(restored.conversation_history("session-1", 10).unwrap().len(), 1);
    }
}
