//! Versioned schema migrations
//!
//! Migrations run at store open, in version order, each inside its own
//! transaction. A failed migration aborts startup; partial application is
//! rolled back by the transaction.

use chrono::Utc;
use rusqlite::{params, Connection};
use tracing::{debug, info};

use crate::error::StoreError;
use crate::queries;

/// A single schema migration step
pub trait Migration {
    /// Monotonically increasing version number
    fn version(&self) -> i64;

    /// What this migration does, recorded in `schema_version`
    fn description(&self) -> &'static str;

    /// Apply the migration
    fn up(&self, conn: &Connection) -> rusqlite::Result<()>;

    /// Revert the migration
    fn down(&self, conn: &Connection) -> rusqlite::Result<()>;
}

/// Creates the core tables: conversations and system_events
pub struct InitialSchema;

impl Migration for InitialSchema {
    fn version(&self) -> i64 {
        1
    }

    fn description(&self) -> &'static str {
        "Initial schema creation"
    }

    fn up(&self, conn: &Connection) -> rusqlite::Result<()> {
        conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS conversations (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                session_id TEXT NOT NULL,
                user_input TEXT NOT NULL,
                assistant_response TEXT NOT NULL,
                detected_intent TEXT,
                processing_time INTEGER,
                timestamp TEXT NOT NULL,
                metadata TEXT,
                CONSTRAINT idx_session_timestamp UNIQUE (session_id, timestamp)
            );

            CREATE INDEX IF NOT EXISTS idx_timestamp ON conversations(timestamp);

            CREATE TABLE IF NOT EXISTS system_events (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                event_type TEXT NOT NULL,
                payload TEXT,
                timestamp TEXT NOT NULL,
                source TEXT NOT NULL,
                correlation_id TEXT,
                CONSTRAINT idx_event_type_timestamp UNIQUE (event_type, timestamp)
            );

            CREATE INDEX IF NOT EXISTS idx_correlation_id ON system_events(correlation_id);
            ",
        )
    }

    fn down(&self, conn: &Connection) -> rusqlite::Result<()> {
        conn.execute_batch(
            "
            DROP TABLE IF EXISTS system_events;
            DROP TABLE IF EXISTS conversations;
            ",
        )
    }
}

/// Adds the sensor_data and alerts tables reserved for later phases
pub struct FutureExpansion;

impl Migration for FutureExpansion {
    fn version(&self) -> i64 {
        2
    }

    fn description(&self) -> &'static str {
        "Sensor data and alert tables"
    }

    fn up(&self, conn: &Connection) -> rusqlite::Result<()> {
        conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS sensor_data (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                sensor_id TEXT NOT NULL,
                sensor_type TEXT NOT NULL,
                value REAL NOT NULL,
                unit TEXT,
                timestamp TEXT NOT NULL,
                metadata TEXT,
                CONSTRAINT idx_sensor_timestamp UNIQUE (sensor_id, timestamp)
            );

            CREATE TABLE IF NOT EXISTS alerts (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                alert_type TEXT NOT NULL,
                severity TEXT NOT NULL CHECK (severity IN ('low', 'medium', 'high', 'critical')),
                message TEXT NOT NULL,
                timestamp TEXT NOT NULL,
                resolved_at TEXT,
                metadata TEXT
            );
            ",
        )
    }

    fn down(&self, conn: &Connection) -> rusqlite::Result<()> {
        conn.execute_batch(
            "
            DROP TABLE IF EXISTS alerts;
            DROP TABLE IF EXISTS sensor_data;
            ",
        )
    }
}

fn all_migrations() -> Vec<Box<dyn Migration>> {
    vec![Box::new(InitialSchema), Box::new(FutureExpansion)]
}

/// Apply all pending migrations to the given connection
pub fn run_migrations(conn: &Connection) -> Result<(), StoreError> {
    conn.execute_batch(queries::CREATE_VERSION_TABLE)
        .map_err(StoreError::Query)?;

    let current: i64 = conn
        .query_row(queries::GET_SCHEMA_VERSION, [], |row| row.get(0))
        .map_err(StoreError::Query)?;
    if current < 0 {
        return Err(StoreError::InvalidSchemaVersion(current));
    }
    debug!(current, "checked schema version");

    for migration in all_migrations() {
        let version = migration.version();
        if version <= current {
            continue;
        }

        let tx = conn.unchecked_transaction().map_err(StoreError::Query)?;
        migration
            .up(&tx)
            .map_err(|source| StoreError::Migration { version, source })?;
        tx.execute(
            queries::INSERT_SCHEMA_VERSION,
            params![version, Utc::now().to_rfc3339(), migration.description()],
        )
        .map_err(|source| StoreError::Migration { version, source })?;
        tx.commit()
            .map_err(|source| StoreError::Migration { version, source })?;

        info!(version, description = migration.description(), "applied migration");
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_migrations_apply_in_order() {
        let conn = Connection::open_in_memory().unwrap();
        run_migrations(&conn).unwrap();

        let version: i64 = conn
            .query_row(queries::GET_SCHEMA_VERSION, [], |row| row.get(0))
            .unwrap();
        assert_eq!(version, 2);
    }

    #[test]
    fn test_migrations_are_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        run_migrations(&conn).unwrap();
        run_migrations(&conn).unwrap();

        let applied: i64 = conn
            .query_row("SELECT COUNT(*) FROM schema_version", [], |row| row.get(0))
            .unwrap();
        assert_eq!(applied, 2);
    }

    #[test]
    fn test_migrations_create_all_tables() {
        let conn = Connection::open_in_memory().unwrap();
        run_migrations(&conn).unwrap();

        for table in ["conversations", "system_events", "sensor_data", "alerts"] {
            let count: i64 = conn
                .query_row(
                    "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?1",
                    [table],
                    |row| row.get(0),
                )
                .unwrap();
            assert_eq!(count, 1, "table {table} should exist");
        }
    }

    #[test]
    fn test_migration_down_reverts() {
        let conn = Connection::open_in_memory().unwrap();
        run_migrations(&conn).unwrap();

        FutureExpansion.down(&conn).unwrap();
        let count: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = 'alerts'",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(count, 0);
    }
}
