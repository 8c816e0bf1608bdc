//! Fixed-size SQLite connection pool
//!
//! Idle connections live on a stack behind a mutex. Acquiring beyond the pool
//! size fails fast with `PoolExhausted` instead of queuing; callers that want
//! to wait must retry themselves.

use std::ops::{Deref, DerefMut};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use rusqlite::Connection;
use tracing::debug;

use crate::error::StoreError;

struct PoolState {
    idle: Vec<Connection>,
    in_use: usize,
}

struct PoolInner {
    path: PathBuf,
    size: usize,
    state: Mutex<PoolState>,
}

/// Mutex-guarded pool of SQLite connections with a hard size cap
#[derive(Clone)]
pub struct ConnectionPool {
    inner: Arc<PoolInner>,
}

impl ConnectionPool {
    pub fn new(path: impl AsRef<Path>, size: usize) -> Self {
        Self {
            inner: Arc::new(PoolInner {
                path: path.as_ref().to_path_buf(),
                size,
                state: Mutex::new(PoolState {
                    idle: Vec::new(),
                    in_use: 0,
                }),
            }),
        }
    }

    /// Get a connection, reusing an idle one or opening a new one.
    ///
    /// Fails with `PoolExhausted` when every slot is checked out.
    pub fn get(&self) -> Result<PooledConnection, StoreError> {
        let mut state = self.inner.state.lock().expect("pool lock poisoned");

        if let Some(conn) = state.idle.pop() {
            state.in_use += 1;
            return Ok(PooledConnection {
                conn: Some(conn),
                pool: Arc::clone(&self.inner),
            });
        }

        if state.in_use >= self.inner.size {
            return Err(StoreError::PoolExhausted {
                size: self.inner.size,
            });
        }

        let conn = Connection::open(&self.inner.path).map_err(StoreError::Connection)?;
        conn.pragma_update(None, "foreign_keys", true)
            .map_err(StoreError::Connection)?;
        conn.busy_timeout(std::time::Duration::from_secs(5))
            .map_err(StoreError::Connection)?;
        debug!(path = %self.inner.path.display(), "opened new pool connection");

        state.in_use += 1;
        Ok(PooledConnection {
            conn: Some(conn),
            pool: Arc::clone(&self.inner),
        })
    }

    /// Number of idle connections currently held
    pub fn idle_count(&self) -> usize {
        self.inner.state.lock().expect("pool lock poisoned").idle.len()
    }

    /// Number of connections currently checked out
    pub fn in_use_count(&self) -> usize {
        self.inner.state.lock().expect("pool lock poisoned").in_use
    }

    /// Maximum number of concurrent connections
    pub fn size(&self) -> usize {
        self.inner.size
    }

    /// Drop all idle connections; checked-out connections close on return
    pub fn close(&self) {
        let mut state = self.inner.state.lock().expect("pool lock poisoned");
        state.idle.clear();
    }
}

/// A connection checked out of the pool, returned on drop
pub struct PooledConnection {
    conn: Option<Connection>,
    pool: Arc<PoolInner>,
}

impl std::fmt::Debug for PooledConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PooledConnection")
            .field("checked_out", &self.conn.is_some())
            .finish()
    }
}

impl Deref for PooledConnection {
    type Target = Connection;

    fn deref(&self) -> &Connection {
        self.conn.as_ref().expect("connection already returned")
    }
}

impl DerefMut for PooledConnection {
    fn deref_mut(&mut self) -> &mut Connection {
        self.conn.as_mut().expect("connection already returned")
    }
}

impl Drop for PooledConnection {
    fn drop(&mut self) {
        if let Some(conn) = self.conn.take() {
            let mut state = self.pool.state.lock().expect("pool lock poisoned");
            state.in_use = state.in_use.saturating_sub(1);
            if state.idle.len() < self.pool.size {
                state.idle.push(conn);
            }
        }
    }
}
