//! Persisted record types
//!
//! JSON columns (`detected_intent`, `payload`, `metadata`) hold structured
//! `serde_json` values; rows with malformed JSON fail the read instead of
//! being reinterpreted.

use chrono::{DateTime, Utc};
use rusqlite::types::Type;
use rusqlite::Row;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A single conversation interaction, written once per completed turn
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationTurn {
    pub session_id: String,
    pub user_input: String,
    pub assistant_response: String,
    /// Detected intent as structured JSON (name, confidence, entities)
    pub detected_intent: Option<Value>,
    /// Turn processing time in milliseconds
    pub processing_time_ms: Option<i64>,
    pub timestamp: DateTime<Utc>,
    pub metadata: Option<Value>,
}

impl ConversationTurn {
    pub(crate) fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            session_id: row.get(0)?,
            user_input: row.get(1)?,
            assistant_response: row.get(2)?,
            detected_intent: parse_json_column(row, 3)?,
            processing_time_ms: row.get(4)?,
            timestamp: parse_timestamp_column(row, 5)?,
            metadata: parse_json_column(row, 6)?,
        })
    }
}

/// A system event persisted for later inspection and replay
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SystemEventRecord {
    pub event_type: String,
    pub payload: Value,
    pub timestamp: DateTime<Utc>,
    pub source: String,
    pub correlation_id: Option<String>,
}

impl SystemEventRecord {
    pub(crate) fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            event_type: row.get(0)?,
            payload: parse_json_column(row, 1)?.unwrap_or(Value::Null),
            timestamp: parse_timestamp_column(row, 2)?,
            source: row.get(3)?,
            correlation_id: row.get(4)?,
        })
    }
}

/// Severity levels for alerts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl AlertSeverity {
    pub fn as_str(&self) -> &'static str {
        match self {
            AlertSeverity::Low => "low",
            AlertSeverity::Medium => "medium",
            AlertSeverity::High => "high",
            AlertSeverity::Critical => "critical",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "low" => Some(AlertSeverity::Low),
            "medium" => Some(AlertSeverity::Medium),
            "high" => Some(AlertSeverity::High),
            "critical" => Some(AlertSeverity::Critical),
            _ => None,
        }
    }
}

/// A severity-leveled alert (future expansion table)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alert {
    /// Database-assigned id, `None` until the alert is persisted
    pub id: Option<i64>,
    pub alert_type: String,
    pub severity: AlertSeverity,
    pub message: String,
    pub timestamp: DateTime<Utc>,
    pub resolved_at: Option<DateTime<Utc>>,
    pub metadata: Option<Value>,
}

impl Alert {
    pub fn new(alert_type: impl Into<String>, severity: AlertSeverity, message: impl Into<String>) -> Self {
        Self {
            id: None,
            alert_type: alert_type.into(),
            severity,
            message: message.into(),
            timestamp: Utc::now(),
            resolved_at: None,
            metadata: None,
        }
    }

    pub(crate) fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        let severity_text: String = row.get(2)?;
        let severity = AlertSeverity::parse(&severity_text).ok_or_else(|| {
            rusqlite::Error::FromSqlConversionFailure(
                2,
                Type::Text,
                format!("unknown alert severity: {severity_text}").into(),
            )
        })?;
        Ok(Self {
            id: Some(row.get(0)?),
            alert_type: row.get(1)?,
            severity,
            message: row.get(3)?,
            timestamp: parse_timestamp_column(row, 4)?,
            resolved_at: parse_optional_timestamp_column(row, 5)?,
            metadata: parse_json_column(row, 6)?,
        })
    }
}

fn parse_json_column(row: &Row<'_>, idx: usize) -> rusqlite::Result<Option<Value>> {
    let raw: Option<String> = row.get(idx)?;
    match raw {
        None => Ok(None),
        Some(text) => serde_json::from_str(&text)
            .map(Some)
            .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e))),
    }
}

fn parse_timestamp_column(row: &Row<'_>, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let raw: String = row.get(idx)?;
    DateTime::parse_from_rfc3339(&raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn parse_optional_timestamp_column(row: &Row<'_>, idx: usize) -> rusqlite::Result<Option<DateTime<Utc>>> {
    let raw: Option<String> = row.get(idx)?;
    match raw {
        None => Ok(None),
        Some(text) => DateTime::parse_from_rfc3339(&text)
            .map(|dt| Some(dt.with_timezone(&Utc)))
            .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e))),
    }
}
