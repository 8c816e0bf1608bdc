//! SQL statements for the state store
//!
//! Schema creation lives in the migrations; the statements here are the
//! runtime read/write paths.

/// Schema version bookkeeping, created before any migration runs
pub const CREATE_VERSION_TABLE: &str = "
CREATE TABLE IF NOT EXISTS schema_version (
    version INTEGER PRIMARY KEY,
    applied_at TEXT NOT NULL,
    description TEXT NOT NULL
);
";

pub const INSERT_SCHEMA_VERSION: &str = "
INSERT INTO schema_version (version, applied_at, description)
VALUES (?1, ?2, ?3);
";

pub const GET_SCHEMA_VERSION: &str = "
SELECT COALESCE(MAX(version), 0) FROM schema_version;
";

pub const INSERT_CONVERSATION: &str = "
INSERT INTO conversations (
    session_id, user_input, assistant_response,
    detected_intent, processing_time, timestamp, metadata
) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7);
";

pub const GET_CONVERSATION_HISTORY: &str = "
SELECT session_id, user_input, assistant_response,
       detected_intent, processing_time, timestamp, metadata
FROM conversations
WHERE session_id = ?1
ORDER BY timestamp DESC
LIMIT ?2;
";

pub const INSERT_SYSTEM_EVENT: &str = "
INSERT INTO system_events (
    event_type, payload, timestamp, source, correlation_id
) VALUES (?1, ?2, ?3, ?4, ?5);
";

pub const GET_SYSTEM_EVENTS: &str = "
SELECT event_type, payload, timestamp, source, correlation_id
FROM system_events
WHERE event_type = ?1
ORDER BY timestamp DESC
LIMIT ?2;
";

pub const INSERT_ALERT: &str = "
INSERT INTO alerts (
    alert_type, severity, message, timestamp, resolved_at, metadata
) VALUES (?1, ?2, ?3, ?4, ?5, ?6);
";

pub const GET_UNRESOLVED_ALERTS: &str = "
SELECT id, alert_type, severity, message, timestamp, resolved_at, metadata
FROM alerts
WHERE resolved_at IS NULL
ORDER BY timestamp DESC;
";

pub const RESOLVE_ALERT: &str = "
UPDATE alerts SET resolved_at = ?2 WHERE id = ?1;
";

pub const CLEANUP_OLD_CONVERSATIONS: &str = "
DELETE FROM conversations WHERE timestamp < ?1;
";

pub const CLEANUP_OLD_EVENTS: &str = "
DELETE FROM system_events WHERE timestamp < ?1;
";
