use std::fmt;

use async_trait::async_trait;

use crate::connection::{Prepare, PreparedStatement};
use crate::error::LazyTxError;
use crate::results::ResultSet;
use crate::types::RowValues;

use super::ConnectionProxy;

/// Prepared statement that materializes its owner's queued begins before each run.
///
/// Holds the owning proxy by mutable borrow, so nothing else can use the connection while
/// the statement is alive. Drop it (or call [`into_inner`](Self::into_inner)) to release
/// the proxy.
pub struct StatementProxy<'a, C>
where
    C: Prepare,
{
    statement: C::Statement,
    owner: &'a mut ConnectionProxy<C>,
}

impl<'a, C> StatementProxy<'a, C>
where
    C: Prepare,
{
    pub fn new(statement: C::Statement, owner: &'a mut ConnectionProxy<C>) -> Self {
        Self { statement, owner }
    }

    /// Release the owner borrow and return the raw statement.
    pub fn into_inner(self) -> C::Statement {
        self.statement
    }

    #[must_use]
    pub fn owner(&self) -> &ConnectionProxy<C> {
        self.owner
    }
}

#[async_trait]
impl<'a, C> PreparedStatement for StatementProxy<'a, C>
where
    C: Prepare,
{
    fn sql(&self) -> &str {
        self.statement.sql()
    }

    async fn execute(&mut self, params: &[RowValues]) -> Result<usize, LazyTxError> {
        self.owner.materialize_transactions().await?;
        self.statement.execute(params).await
    }

    async fn query(&mut self, params: &[RowValues]) -> Result<ResultSet, LazyTxError> {
        self.owner.materialize_transactions().await?;
        self.statement.query(params).await
    }
}

impl<C> fmt::Debug for StatementProxy<'_, C>
where
    C: Prepare,
    C::Statement: fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StatementProxy")
            .field("statement", &self.statement)
            .field("owner_pending", &self.owner.pending_len())
            .finish()
    }
}
