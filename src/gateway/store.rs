//! Store boundary: run one SQL statement and return its rows.

#![allow(missing_docs)]

use crate::core::errors::Result;
use crate::gateway::value::RowSet;

/// Anything that can execute a single read-only statement.
///
/// Implementations make exactly one attempt per call and report failures as
/// `TpmsError::QueryExecution` carrying the store's cause.
pub trait TelemetryStore {
    fn execute(&self, sql: &str) -> Result<RowSet>;
}

impl<T: TelemetryStore + ?Sized> TelemetryStore for &T {
    fn execute(&self, sql: &str) -> Result<RowSet> {
        (**self).execute(sql)
    }
}

impl<T: TelemetryStore + ?Sized> TelemetryStore for Box<T> {
    fn execute(&self, sql: &str) -> Result<RowSet> {
        (**self).execute(sql)
    }
}

#[cfg(feature = "sqlite")]
pub use sqlite::SqliteStore;

#[cfg(feature = "sqlite")]
mod sqlite {
    use rusqlite::Connection;

    use super::TelemetryStore;
    use crate::core::config::StoreConfig;
    use crate::core::errors::{Result, TpmsError};
    use crate::gateway::pool::ConnectionPool;
    use crate::gateway::value::{CellValue, RowSet};

    /// SQLite-backed store over a pool of read-only connections.
    #[derive(Debug)]
    pub struct SqliteStore {
        pool: ConnectionPool,
    }

    impl SqliteStore {
        pub fn open(cfg: &StoreConfig) -> Result<Self> {
            Ok(Self {
                pool: ConnectionPool::from_config(cfg)?,
            })
        }

        #[must_use]
        pub const fn from_pool(pool: ConnectionPool) -> Self {
            Self { pool }
        }

        #[must_use]
        pub const fn pool(&self) -> &ConnectionPool {
            &self.pool
        }
    }

    impl TelemetryStore for SqliteStore {
        fn execute(&self, sql: &str) -> Result<RowSet> {
            let conn = self.pool.checkout()?;
            run(&conn, sql).map_err(|e| e.with_sql(sql))
        }
    }

    fn run(conn: &Connection, sql: &str) -> Result<RowSet> {
        let mut stmt = conn.prepare(sql)?;
        if !stmt.readonly() {
            return Err(TpmsError::QueryExecution {
                sql: None,
                details: "statement would modify the database".to_string(),
            });
        }
        let columns: Vec<String> = stmt
            .column_names()
            .into_iter()
            .map(str::to_string)
            .collect();
        let width = columns.len();

        let mut rows = Vec::new();
        let mut cursor = stmt.query([])?;
        while let Some(row) = cursor.next()? {
            let cells = (0..width)
                .map(|idx| row.get_ref(idx).map(CellValue::from))
                .collect::<std::result::Result<Vec<_>, _>>()?;
            rows.push(cells);
        }
        Ok(RowSet::new(columns, rows))
    }
}
