use std::sync::Arc;

use async_trait::async_trait;

use crate::connection::PreparedStatement;
use crate::error::LazyTxError;
use crate::results::ResultSet;
use crate::types::RowValues;

use super::config::SharedSqliteConnection;
use super::connection::run_blocking;
use super::params::convert_params;
use super::query::{build_result_set, execute_dml};

/// Handle to a prepared `SQLite` statement.
///
/// The handle owns a reference to the connection, not a borrow, so it can be wrapped in a
/// [`StatementProxy`](crate::proxy::StatementProxy). Dropping it just releases the reference;
/// `rusqlite`'s `prepare_cached` keeps the compiled statement around.
#[derive(Clone)]
pub struct SqlitePreparedStatement {
    connection: SharedSqliteConnection,
    query: Arc<String>,
}

impl SqlitePreparedStatement {
    pub(crate) fn new(connection: SharedSqliteConnection, query: Arc<String>) -> Self {
        Self { connection, query }
    }
}

impl std::fmt::Debug for SqlitePreparedStatement {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqlitePreparedStatement")
            .field("query", &self.query)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl PreparedStatement for SqlitePreparedStatement {
    fn sql(&self) -> &str {
        self.query.as_str()
    }

    async fn execute(&mut self, params: &[RowValues]) -> Result<usize, LazyTxError> {
        let values = convert_params(params);
        let query = Arc::clone(&self.query);
        run_blocking(Arc::clone(&self.connection), move |guard| {
            let mut stmt = guard.prepare_cached(query.as_str())?;
            execute_dml(&mut stmt, &values)
        })
        .await
    }

    async fn query(&mut self, params: &[RowValues]) -> Result<ResultSet, LazyTxError> {
        let values = convert_params(params);
        let query = Arc::clone(&self.query);
        run_blocking(Arc::clone(&self.connection), move |guard| {
            let mut stmt = guard.prepare_cached(query.as_str())?;
            build_result_set(&mut stmt, &values)
        })
        .await
    }
}
