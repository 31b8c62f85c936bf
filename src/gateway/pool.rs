//! Small blocking pool of read-only SQLite connections.
//!
//! Each checkout hands out a connection exclusively; it goes back to the idle
//! list when the guard drops. At most `max_idle` connections are retained, any
//! extra ones opened under contention are closed on return.

#![allow(missing_docs)]

use std::ops::Deref;
use std::path::{Path, PathBuf};
use std::time::Duration;

use parking_lot::Mutex;
use rusqlite::{Connection, OpenFlags};

use crate::core::config::StoreConfig;
use crate::core::errors::{Result, TpmsError};

pub struct ConnectionPool {
    path: PathBuf,
    busy_timeout: Duration,
    max_idle: usize,
    idle: Mutex<Vec<Connection>>,
}

impl std::fmt::Debug for ConnectionPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionPool")
            .field("path", &self.path)
            .field("max_idle", &self.max_idle)
            .field("idle", &self.idle_count())
            .finish()
    }
}

impl ConnectionPool {
    /// Opens one connection eagerly so a missing or unreadable database fails here.
    pub fn open(path: &Path, max_idle: usize, busy_timeout: Duration) -> Result<Self> {
        let pool = Self {
            path: path.to_path_buf(),
            busy_timeout,
            max_idle: max_idle.max(1),
            idle: Mutex::new(Vec::with_capacity(max_idle)),
        };
        let first = pool.connect()?;
        pool.idle.lock().push(first);
        Ok(pool)
    }

    pub fn from_config(cfg: &StoreConfig) -> Result<Self> {
        Self::open(
            &cfg.database,
            cfg.pool_size,
            Duration::from_millis(cfg.busy_timeout_ms),
        )
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    #[must_use]
    pub fn idle_count(&self) -> usize {
        self.idle.lock().len()
    }

    pub fn checkout(&self) -> Result<PooledConnection<'_>> {
        let reused = self.idle.lock().pop();
        let conn = match reused {
            Some(conn) => conn,
            None => self.connect()?,
        };
        Ok(PooledConnection {
            conn: Some(conn),
            pool: self,
        })
    }

    fn connect(&self) -> Result<Connection> {
        if !self.path.exists() {
            return Err(TpmsError::QueryExecution {
                sql: None,
                details: format!("telemetry database not found: {}", self.path.display()),
            });
        }
        let conn = Connection::open_with_flags(
            &self.path,
            OpenFlags::SQLITE_OPEN_READ_ONLY
                | OpenFlags::SQLITE_OPEN_NO_MUTEX
                | OpenFlags::SQLITE_OPEN_URI,
        )?;
        conn.busy_timeout(self.busy_timeout)?;
        conn.execute_batch("PRAGMA query_only = ON;")?;
        Ok(conn)
    }

    fn give_back(&self, conn: Connection) {
        let mut idle = self.idle.lock();
        if idle.len() < self.max_idle {
            idle.push(conn);
        }
    }
}

/// Exclusive checkout; returned to the pool on drop.
pub struct PooledConnection<'p> {
    conn: Option<Connection>,
    pool: &'p ConnectionPool,
}

impl Deref for PooledConnection<'_> {
    type Target = Connection;

    fn deref(&self) -> &Connection {
        // Only `Drop` takes the connection out.
        self.conn.as_ref().unwrap_or_else(|| unreachable!())
    }
}

impl Drop for PooledConnection<'_> {
    fn drop(&mut self) {
        if let Some(conn) = self.conn.take() {
            self.pool.give_back(conn);
        }
    }
}
