use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::action::{IsolationLevel, SavepointName};
use crate::connection::{Prepare, TransactionalConnection};
use crate::error::LazyTxError;
use crate::results::ResultSet;
use crate::types::RowValues;

use super::config::{SharedSqliteConnection, SqliteOptions, open_shared};
use super::params::convert_params;
use super::prepared::SqlitePreparedStatement;
use super::query::{build_result_set, execute_dml};

/// Async wrapper over a single `rusqlite` connection.
///
/// Blocking `SQLite` work runs on tokio's blocking pool. Transaction state is tracked here so
/// unbalanced commits and savepoints fail with a clear error instead of a driver message.
pub struct SqliteConnection {
    pub(crate) conn: SharedSqliteConnection,
    pub(crate) in_transaction: bool,
    pub(crate) savepoints: Vec<SavepointName>,
    /// `PRAGMA read_uncommitted` was switched on for the current transaction.
    read_uncommitted: bool,
}

impl SqliteConnection {
    /// Open a connection described by `opts`.
    ///
    /// # Errors
    /// Returns `LazyTxError` if the database cannot be opened.
    pub async fn open(opts: SqliteOptions) -> Result<Self, LazyTxError> {
        let conn = open_shared(&opts).await?;
        debug!(db_path = %opts.db_path, "opened sqlite connection");
        Ok(Self {
            conn,
            in_transaction: false,
            savepoints: Vec::new(),
            read_uncommitted: false,
        })
    }

    /// Open a private in-memory database.
    ///
    /// # Errors
    /// Returns `LazyTxError` if `SQLite` fails to initialise.
    pub async fn open_in_memory() -> Result<Self, LazyTxError> {
        Self::open(SqliteOptions::in_memory()).await
    }

    #[must_use]
    pub fn in_transaction(&self) -> bool {
        self.in_transaction
    }

    #[must_use]
    pub fn savepoint_depth(&self) -> usize {
        self.savepoints.len()
    }

    /// Run synchronous `rusqlite` logic against the connection.
    ///
    /// # Errors
    /// Propagates the callback's error or a join error from the blocking pool.
    pub async fn with_connection<F, R>(&self, func: F) -> Result<R, LazyTxError>
    where
        F: FnOnce(&mut rusqlite::Connection) -> Result<R, LazyTxError> + Send + 'static,
        R: Send + 'static,
    {
        run_blocking(Arc::clone(&self.conn), func).await
    }

    async fn batch(&self, sql: String) -> Result<(), LazyTxError> {
        run_blocking(Arc::clone(&self.conn), move |guard| {
            guard.execute_batch(&sql)?;
            Ok(())
        })
        .await
    }

    fn ensure_in_tx(&self, ctx: &str) -> Result<(), LazyTxError> {
        if self.in_transaction {
            Ok(())
        } else {
            Err(LazyTxError::TransactionError(format!(
                "SQLite transaction not active ({ctx})"
            )))
        }
    }

    fn savepoint_index(&self, name: &SavepointName) -> Result<usize, LazyTxError> {
        self.savepoints
            .iter()
            .rposition(|sp| sp == name)
            .ok_or_else(|| {
                LazyTxError::TransactionError(format!("SQLite savepoint {name} not active"))
            })
    }

    async fn finish_transaction(&mut self, sql: &'static str) -> Result<(), LazyTxError> {
        self.ensure_in_tx(sql)?;
        let reset = std::mem::take(&mut self.read_uncommitted);
        let result = run_blocking(Arc::clone(&self.conn), move |guard| {
            guard.execute_batch(sql)?;
            if reset {
                guard.execute_batch("PRAGMA read_uncommitted = OFF")?;
            }
            Ok(())
        })
        .await;
        // A failed COMMIT may leave the transaction open; ask the driver.
        self.in_transaction = if result.is_ok() {
            false
        } else {
            self.driver_in_transaction().await
        };
        if !self.in_transaction {
            self.savepoints.clear();
        }
        result
    }

    async fn driver_in_transaction(&self) -> bool {
        let probe = run_blocking(Arc::clone(&self.conn), |guard| Ok(!guard.is_autocommit())).await;
        still_in_transaction(probe)
    }
}

impl fmt::Debug for SqliteConnection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SqliteConnection")
            .field("in_transaction", &self.in_transaction)
            .field("savepoints", &self.savepoints)
            .finish_non_exhaustive()
    }
}

/// Transaction state after a failed COMMIT/ROLLBACK. When the driver cannot be asked,
/// assume the transaction is still open so a later ROLLBACK is not rejected.
fn still_in_transaction(probe: Result<bool, LazyTxError>) -> bool {
    match probe {
        Ok(open) => open,
        Err(err) => {
            warn!(error = %err, "could not read sqlite autocommit state; assuming transaction open");
            true
        }
    }
}

pub(crate) async fn run_blocking<F, R>(
    conn: SharedSqliteConnection,
    func: F,
) -> Result<R, LazyTxError>
where
    F: FnOnce(&mut rusqlite::Connection) -> Result<R, LazyTxError> + Send + 'static,
    R: Send + 'static,
{
    tokio::task::spawn_blocking(move || {
        let mut guard = conn.blocking_lock();
        func(&mut guard)
    })
    .await
    .map_err(|e| LazyTxError::ExecutionError(format!("sqlite spawn_blocking join error: {e}")))?
}

#[async_trait]
impl TransactionalConnection for SqliteConnection {
    async fn begin(&mut self, isolation: Option<IsolationLevel>) -> Result<(), LazyTxError> {
        if self.in_transaction {
            return Err(LazyTxError::TransactionError(
                "SQLite transaction already in progress".into(),
            ));
        }
        // SQLite transactions are serializable; read-uncommitted is the only other mode.
        let read_uncommitted = match isolation {
            None | Some(IsolationLevel::Serializable) => false,
            Some(IsolationLevel::ReadUncommitted) => true,
            Some(level) => {
                return Err(LazyTxError::TransactionError(format!(
                    "SQLite does not support isolation level {}",
                    level.as_sql()
                )));
            }
        };
        run_blocking(Arc::clone(&self.conn), move |guard| {
            if read_uncommitted {
                guard.execute_batch("PRAGMA read_uncommitted = ON")?;
            }
            if let Err(err) = guard.execute_batch("BEGIN") {
                // The pragma is connection-wide; it must not outlive a failed begin.
                if read_uncommitted {
                    if let Err(reset) = guard.execute_batch("PRAGMA read_uncommitted = OFF") {
                        warn!(error = %reset, "failed to reset read_uncommitted after BEGIN error");
                    }
                }
                return Err(err.into());
            }
            Ok(())
        })
        .await?;
        self.in_transaction = true;
        self.read_uncommitted = read_uncommitted;
        Ok(())
    }

    async fn commit(&mut self) -> Result<(), LazyTxError> {
        self.finish_transaction("COMMIT").await
    }

    async fn rollback(&mut self) -> Result<(), LazyTxError> {
        self.finish_transaction("ROLLBACK").await
    }

    async fn create_savepoint(&mut self, name: &SavepointName) -> Result<(), LazyTxError> {
        self.ensure_in_tx("savepoint")?;
        self.batch(format!("SAVEPOINT {name}")).await?;
        self.savepoints.push(name.clone());
        Ok(())
    }

    async fn release_savepoint(&mut self, name: &SavepointName) -> Result<(), LazyTxError> {
        self.ensure_in_tx("release savepoint")?;
        let idx = self.savepoint_index(name)?;
        self.batch(format!("RELEASE SAVEPOINT {name}")).await?;
        self.savepoints.truncate(idx);
        Ok(())
    }

    async fn rollback_to_savepoint(&mut self, name: &SavepointName) -> Result<(), LazyTxError> {
        self.ensure_in_tx("rollback to savepoint")?;
        let idx = self.savepoint_index(name)?;
        self.batch(format!("ROLLBACK TO SAVEPOINT {name}")).await?;
        self.savepoints.truncate(idx + 1);
        Ok(())
    }

    async fn execute_batch(&mut self, query: &str) -> Result<(), LazyTxError> {
        self.batch(query.to_owned()).await
    }

    async fn execute_dml(
        &mut self,
        query: &str,
        params: &[RowValues],
    ) -> Result<usize, LazyTxError> {
        let sql = query.to_owned();
        let values = convert_params(params);
        run_blocking(Arc::clone(&self.conn), move |guard| {
            let mut stmt = guard.prepare_cached(&sql)?;
            execute_dml(&mut stmt, &values)
        })
        .await
    }

    async fn execute_select(
        &mut self,
        query: &str,
        params: &[RowValues],
    ) -> Result<ResultSet, LazyTxError> {
        let sql = query.to_owned();
        let values = convert_params(params);
        run_blocking(Arc::clone(&self.conn), move |guard| {
            let mut stmt = guard.prepare_cached(&sql)?;
            build_result_set(&mut stmt, &values)
        })
        .await
    }
}

#[async_trait]
impl Prepare for SqliteConnection {
    type Statement = SqlitePreparedStatement;

    /// Prepares into `rusqlite`'s statement cache so later executions skip parsing.
    async fn prepare(&mut self, query: &str) -> Result<Self::Statement, LazyTxError> {
        let sql = Arc::new(query.to_owned());
        let warm = Arc::clone(&sql);
        run_blocking(Arc::clone(&self.conn), move |guard| {
            guard.prepare_cached(warm.as_str())?;
            Ok(())
        })
        .await?;
        Ok(SqlitePreparedStatement::new(Arc::clone(&self.conn), sql))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn unbalanced_transaction_calls_are_rejected() {
        let mut conn = SqliteConnection::open_in_memory().await.unwrap();
        assert!(matches!(
            conn.commit().await,
            Err(LazyTxError::TransactionError(_))
        ));
        let sp = SavepointName::new("sp").unwrap();
        assert!(conn.create_savepoint(&sp).await.is_err());

        conn.begin(None).await.unwrap();
        assert!(conn.begin(None).await.is_err());
        assert!(conn.release_savepoint(&sp).await.is_err());
        conn.rollback().await.unwrap();
        assert!(!conn.in_transaction());
    }

    #[tokio::test]
    async fn unsupported_isolation_level_is_rejected() {
        let mut conn = SqliteConnection::open_in_memory().await.unwrap();
        let err = conn
            .begin(Some(IsolationLevel::RepeatableRead))
            .await
            .unwrap_err();
        assert!(matches!(err, LazyTxError::TransactionError(_)));
        assert!(!conn.in_transaction());

        conn.begin(Some(IsolationLevel::ReadUncommitted)).await.unwrap();
        conn.commit().await.unwrap();
        let flag = conn
            .with_connection(|c| {
                Ok(c.query_row("PRAGMA read_uncommitted", [], |row| row.get::<_, i64>(0))?)
            })
            .await
            .unwrap();
        assert_eq!(flag, 0);
    }

    #[tokio::test]
    async fn failed_read_uncommitted_begin_resets_pragma() {
        let mut conn = SqliteConnection::open_in_memory().await.unwrap();
        // Open a transaction behind the wrapper's back so its BEGIN fails.
        conn.with_connection(|c| Ok(c.execute_batch("BEGIN")?))
            .await
            .unwrap();

        let err = conn
            .begin(Some(IsolationLevel::ReadUncommitted))
            .await
            .unwrap_err();
        assert!(matches!(err, LazyTxError::SqliteError(_)));
        assert!(!conn.in_transaction());

        let flag = conn
            .with_connection(|c| {
                c.execute_batch("COMMIT")?;
                Ok(c.query_row("PRAGMA read_uncommitted", [], |row| row.get::<_, i64>(0))?)
            })
            .await
            .unwrap();
        assert_eq!(flag, 0);
    }

    #[test]
    fn unknown_driver_state_counts_as_open() {
        assert!(still_in_transaction(Ok(true)));
        assert!(!still_in_transaction(Ok(false)));
        assert!(still_in_transaction(Err(LazyTxError::ExecutionError(
            "join error".into()
        ))));
    }

    #[tokio::test]
    async fn savepoints_roll_back_independently() {
        let mut conn = SqliteConnection::open_in_memory().await.unwrap();
        conn.execute_batch("CREATE TABLE t (a INTEGER)").await.unwrap();
        let sp = SavepointName::new("sp_1").unwrap();

        conn.begin(None).await.unwrap();
        conn.execute_dml("INSERT INTO t VALUES (?1)", &[RowValues::Int(1)])
            .await
            .unwrap();
        conn.create_savepoint(&sp).await.unwrap();
        conn.execute_dml("INSERT INTO t VALUES (?1)", &[RowValues::Int(2)])
            .await
            .unwrap();
        conn.rollback_to_savepoint(&sp).await.unwrap();
        assert_eq!(conn.savepoint_depth(), 1);
        conn.release_savepoint(&sp).await.unwrap();
        conn.commit().await.unwrap();

        let rs = conn.execute_select("SELECT a FROM t", &[]).await.unwrap();
        assert_eq!(rs.len(), 1);
        assert_eq!(rs.results[0].get("a"), Some(&RowValues::Int(1)));
    }
}
