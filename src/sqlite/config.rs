use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::LazyTxError;

use super::connection::SqliteConnection;

/// Connection handle shared between the async wrapper and `spawn_blocking` workers.
pub(crate) type SharedSqliteConnection = Arc<tokio::sync::Mutex<rusqlite::Connection>>;

/// Path understood by `rusqlite` as a private in-memory database.
pub const IN_MEMORY: &str = ":memory:";

/// Options for opening a `SQLite` connection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SqliteOptions {
    pub db_path: String,
    /// How long `SQLite` waits on a locked database before returning `SQLITE_BUSY`.
    #[serde(default)]
    pub busy_timeout: Option<Duration>,
}

impl SqliteOptions {
    #[must_use]
    pub fn new(db_path: String) -> Self {
        Self {
            db_path,
            busy_timeout: None,
        }
    }

    #[must_use]
    pub fn in_memory() -> Self {
        Self::new(IN_MEMORY.to_string())
    }

    #[must_use]
    pub fn with_busy_timeout(mut self, timeout: Duration) -> Self {
        self.busy_timeout = Some(timeout);
        self
    }
}

/// Fluent builder for `SQLite` options.
#[derive(Debug, Clone)]
pub struct SqliteOptionsBuilder {
    opts: SqliteOptions,
}

impl SqliteOptionsBuilder {
    #[must_use]
    pub fn new(db_path: String) -> Self {
        Self {
            opts: SqliteOptions::new(db_path),
        }
    }

    #[must_use]
    pub fn busy_timeout(mut self, timeout: Duration) -> Self {
        self.opts.busy_timeout = Some(timeout);
        self
    }

    #[must_use]
    pub fn finish(self) -> SqliteOptions {
        self.opts
    }

    /// Open a connection with these options.
    ///
    /// # Errors
    ///
    /// Returns `LazyTxError` if the database cannot be opened or configured.
    pub async fn build(self) -> Result<SqliteConnection, LazyTxError> {
        SqliteConnection::open(self.finish()).await
    }
}

pub(crate) async fn open_shared(opts: &SqliteOptions) -> Result<SharedSqliteConnection, LazyTxError> {
    if opts.db_path.is_empty() {
        return Err(LazyTxError::ConfigError(
            "SQLite db_path must not be empty".into(),
        ));
    }
    let path = opts.db_path.clone();
    let busy_timeout = opts.busy_timeout;
    let conn = tokio::task::spawn_blocking(move || -> Result<_, LazyTxError> {
        let conn = if path == IN_MEMORY {
            rusqlite::Connection::open_in_memory()?
        } else {
            rusqlite::Connection::open(&path)?
        };
        if let Some(timeout) = busy_timeout {
            conn.busy_timeout(timeout)?;
        }
        Ok(conn)
    })
    .await
    .map_err(|e| LazyTxError::ConnectionError(format!("sqlite open join error: {e}")))??;
    Ok(Arc::new(tokio::sync::Mutex::new(conn)))
}
