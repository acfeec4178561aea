use async_trait::async_trait;

use crate::action::{IsolationLevel, SavepointName};
use crate::error::LazyTxError;
use crate::results::ResultSet;
use crate::types::RowValues;

/// The operations a live database connection exposes to the proxy.
///
/// Backends implement this once; [`ConnectionProxy`](crate::proxy::ConnectionProxy)
/// implements it as well, forwarding every method after materializing deferred
/// transaction starts.
#[async_trait]
pub trait TransactionalConnection: Send {
    /// Start a transaction, optionally at a caller-chosen isolation level.
    async fn begin(&mut self, isolation: Option<IsolationLevel>) -> Result<(), LazyTxError>;

    async fn commit(&mut self) -> Result<(), LazyTxError>;

    async fn rollback(&mut self) -> Result<(), LazyTxError>;

    async fn create_savepoint(&mut self, name: &SavepointName) -> Result<(), LazyTxError>;

    async fn release_savepoint(&mut self, name: &SavepointName) -> Result<(), LazyTxError>;

    async fn rollback_to_savepoint(&mut self, name: &SavepointName) -> Result<(), LazyTxError>;

    /// Executes a batch of SQL statements. No parameters are supported.
    async fn execute_batch(&mut self, query: &str) -> Result<(), LazyTxError>;

    /// Executes a single DML statement and returns the number of rows affected.
    async fn execute_dml(&mut self, query: &str, params: &[RowValues])
    -> Result<usize, LazyTxError>;

    /// Executes a single SELECT statement and returns the result set.
    async fn execute_select(
        &mut self,
        query: &str,
        params: &[RowValues],
    ) -> Result<ResultSet, LazyTxError>;
}

/// Connections that can hand out prepared statements.
///
/// Statements are owned values: they must not borrow the connection, since the proxy
/// keeps its own mutable borrow to materialize transactions before each execution.
#[async_trait]
pub trait Prepare: TransactionalConnection {
    type Statement: PreparedStatement;

    async fn prepare(&mut self, query: &str) -> Result<Self::Statement, LazyTxError>;
}

/// A prepared statement (or cursor) produced by a [`Prepare`] connection.
#[async_trait]
pub trait PreparedStatement: Send {
    /// Raw SQL the statement was prepared from.
    fn sql(&self) -> &str;

    /// Run the statement as DML and return the affected row count.
    async fn execute(&mut self, params: &[RowValues]) -> Result<usize, LazyTxError>;

    /// Run the statement as a query and collect its rows.
    async fn query(&mut self, params: &[RowValues]) -> Result<ResultSet, LazyTxError>;
}
