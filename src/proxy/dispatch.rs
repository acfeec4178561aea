use async_trait::async_trait;

use crate::action::{IsolationLevel, SavepointName};
use crate::connection::{Prepare, TransactionalConnection};
use crate::error::LazyTxError;
use crate::results::ResultSet;
use crate::types::RowValues;

use super::{ConnectionProxy, StatementProxy};

// Every forwarded operation needs a live transaction, so queued begins run first.
#[async_trait]
impl<C> TransactionalConnection for ConnectionProxy<C>
where
    C: TransactionalConnection,
{
    async fn begin(&mut self, isolation: Option<IsolationLevel>) -> Result<(), LazyTxError> {
        self.materialize_transactions().await?;
        self.underlying.begin(isolation).await
    }

    async fn commit(&mut self) -> Result<(), LazyTxError> {
        self.materialize_transactions().await?;
        self.underlying.commit().await
    }

    async fn rollback(&mut self) -> Result<(), LazyTxError> {
        self.materialize_transactions().await?;
        self.underlying.rollback().await
    }

    async fn create_savepoint(&mut self, name: &SavepointName) -> Result<(), LazyTxError> {
        self.materialize_transactions().await?;
        self.underlying.create_savepoint(name).await
    }

    async fn release_savepoint(&mut self, name: &SavepointName) -> Result<(), LazyTxError> {
        self.materialize_transactions().await?;
        self.underlying.release_savepoint(name).await
    }

    async fn rollback_to_savepoint(&mut self, name: &SavepointName) -> Result<(), LazyTxError> {
        self.materialize_transactions().await?;
        self.underlying.rollback_to_savepoint(name).await
    }

    async fn execute_batch(&mut self, query: &str) -> Result<(), LazyTxError> {
        self.materialize_transactions().await?;
        self.underlying.execute_batch(query).await
    }

    async fn execute_dml(
        &mut self,
        query: &str,
        params: &[RowValues],
    ) -> Result<usize, LazyTxError> {
        self.materialize_transactions().await?;
        self.underlying.execute_dml(query, params).await
    }

    async fn execute_select(
        &mut self,
        query: &str,
        params: &[RowValues],
    ) -> Result<ResultSet, LazyTxError> {
        self.materialize_transactions().await?;
        self.underlying.execute_select(query, params).await
    }
}

impl<C> ConnectionProxy<C>
where
    C: Prepare,
{
    /// Materialize queued begins, then prepare `query`.
    ///
    /// The returned [`StatementProxy`] materializes again before each run, which matters
    /// for statements kept around (see [`StatementProxy::into_inner`]) and re-wrapped after
    /// new begins were queued.
    ///
    /// # Errors
    /// Returns the materialization error, or the connection's error if preparing fails.
    pub async fn prepare(&mut self, query: &str) -> Result<StatementProxy<'_, C>, LazyTxError> {
        self.materialize_transactions().await?;
        let statement = self.underlying.prepare(query).await?;
        Ok(StatementProxy::new(statement, self))
    }
}
