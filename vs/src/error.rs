//! State store error types

use thiserror::Error;

/// Errors that can occur in the state store
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("failed to open database connection: {0}")]
    Connection(#[source] rusqlite::Error),

    #[error("connection pool exhausted ({size} connections in use)")]
    PoolExhausted { size: usize },

    #[error("query execution failed: {0}")]
    Query(#[source] rusqlite::Error),

    #[error("migration {version} failed: {source}")]
    Migration {
        version: i64,
        #[source]
        source: rusqlite::Error,
    },

    #[error("invalid schema version: {0}")]
    InvalidSchemaVersion(i64),

    #[error("invalid JSON in column {column}: {source}")]
    Json {
        column: &'static str,
        #[source]
        source: serde_json::Error,
    },

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl StoreError {
    /// Check if this error is retryable (transient failures)
    pub fn is_retryable(&self) -> bool {
        match self {
            StoreError::Connection(_) => true,
            StoreError::PoolExhausted { .. } => true,
            StoreError::Query(e) => matches!(
                e.sqlite_error_code(),
                Some(rusqlite::ErrorCode::DatabaseBusy) | Some(rusqlite::ErrorCode::DatabaseLocked)
            ),
            StoreError::Migration { .. } => false,
            StoreError::InvalidSchemaVersion(_) => false,
            StoreError::Json { .. } => false,
            StoreError::Io(_) => false,
        }
    }
}

/// Result alias for store operations
pub type StoreResult<T> = Result<T, StoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pool_exhausted_is_retryable() {
        assert!(StoreError::PoolExhausted { size: 5 }.is_retryable());
    }

    #[test]
    fn test_migration_is_not_retryable() {
        let err = StoreError::Migration {
            version: 1,
            source: rusqlite::Error::InvalidQuery,
        };
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_error_display() {
        let err = StoreError::PoolExhausted { size: 5 };
        assert_eq!(err.to_string(), "connection pool exhausted (5 connections in use)");
    }
}
