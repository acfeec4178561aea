//! In-memory connection double that records every call it receives.
//!
//! Compiled for unit tests and behind the `test-utils` feature for downstream tests.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::action::{IsolationLevel, SavepointName, TxAction};
use crate::connection::{Prepare, PreparedStatement, TransactionalConnection};
use crate::error::LazyTxError;
use crate::results::ResultSet;
use crate::types::RowValues;

/// One observed call on a [`RecordingConnection`] or its statements.
#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    Tx(TxAction),
    Batch(String),
    Dml(String),
    Select(String),
    Prepare(String),
    StatementExecute(String),
    StatementQuery(String),
}

/// Shared, cloneable view of the calls recorded so far.
#[derive(Debug, Clone, Default)]
pub struct CallLog {
    calls: Arc<Mutex<Vec<Call>>>,
}

impl CallLog {
    fn push(&self, call: Call) {
        self.calls.lock().expect("call log lock").push(call);
    }

    #[must_use]
    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().expect("call log lock").clone()
    }

    /// Only the transaction-control calls, in order.
    #[must_use]
    pub fn tx_calls(&self) -> Vec<TxAction> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                Call::Tx(action) => Some(action),
                _ => None,
            })
            .collect()
    }

    pub fn clear(&self) {
        self.calls.lock().expect("call log lock").clear();
    }
}

/// Connection double with just enough bookkeeping to reject unbalanced transaction calls.
#[derive(Debug, Default)]
pub struct RecordingConnection {
    log: CallLog,
    fail_on: Option<TxAction>,
    stall_on: Option<TxAction>,
    in_transaction: bool,
    savepoints: Vec<SavepointName>,
}

impl RecordingConnection {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail (after recording) whenever `action` is applied.
    #[must_use]
    pub fn fail_on(mut self, action: TxAction) -> Self {
        self.fail_on = Some(action);
        self
    }

    /// Never complete (after recording) whenever `action` is applied.
    #[must_use]
    pub fn stall_on(mut self, action: TxAction) -> Self {
        self.stall_on = Some(action);
        self
    }

    #[must_use]
    pub fn log(&self) -> CallLog {
        self.log.clone()
    }

    #[must_use]
    pub fn in_transaction(&self) -> bool {
        self.in_transaction
    }

    #[must_use]
    pub fn savepoint_depth(&self) -> usize {
        self.savepoints.len()
    }

    async fn record_tx(&mut self, action: TxAction) -> Result<(), LazyTxError> {
        self.log.push(Call::Tx(action.clone()));
        if self.stall_on.as_ref() == Some(&action) {
            std::future::pending::<()>().await;
        }
        if self.fail_on.as_ref() == Some(&action) {
            return Err(LazyTxError::ExecutionError(format!(
                "injected failure: {action}"
            )));
        }
        Ok(())
    }

    fn require_transaction(&self, ctx: &str) -> Result<(), LazyTxError> {
        if self.in_transaction {
            Ok(())
        } else {
            Err(LazyTxError::TransactionError(format!(
                "no transaction active ({ctx})"
            )))
        }
    }

    fn savepoint_index(&self, name: &SavepointName) -> Result<usize, LazyTxError> {
        self.savepoints
            .iter()
            .rposition(|sp| sp == name)
            .ok_or_else(|| LazyTxError::TransactionError(format!("no such savepoint: {name}")))
    }
}

#[async_trait]
impl TransactionalConnection for RecordingConnection {
    async fn begin(&mut self, isolation: Option<IsolationLevel>) -> Result<(), LazyTxError> {
        self.record_tx(TxAction::Begin { isolation }).await?;
        if self.in_transaction {
            return Err(LazyTxError::TransactionError(
                "transaction already in progress".into(),
            ));
        }
        self.in_transaction = true;
        Ok(())
    }

    async fn commit(&mut self) -> Result<(), LazyTxError> {
        self.record_tx(TxAction::Commit).await?;
        self.require_transaction("commit")?;
        self.in_transaction = false;
        self.savepoints.clear();
        Ok(())
    }

    async fn rollback(&mut self) -> Result<(), LazyTxError> {
        self.record_tx(TxAction::Rollback).await?;
        self.require_transaction("rollback")?;
        self.in_transaction = false;
        self.savepoints.clear();
        Ok(())
    }

    async fn create_savepoint(&mut self, name: &SavepointName) -> Result<(), LazyTxError> {
        self.record_tx(TxAction::Savepoint { name: name.clone() })
            .await?;
        self.require_transaction("savepoint")?;
        self.savepoints.push(name.clone());
        Ok(())
    }

    async fn release_savepoint(&mut self, name: &SavepointName) -> Result<(), LazyTxError> {
        self.record_tx(TxAction::ReleaseSavepoint { name: name.clone() })
            .await?;
        let idx = self.savepoint_index(name)?;
        self.savepoints.truncate(idx);
        Ok(())
    }

    async fn rollback_to_savepoint(&mut self, name: &SavepointName) -> Result<(), LazyTxError> {
        self.record_tx(TxAction::RollbackToSavepoint { name: name.clone() })
            .await?;
        let idx = self.savepoint_index(name)?;
        self.savepoints.truncate(idx + 1);
        Ok(())
    }

    async fn execute_batch(&mut self, query: &str) -> Result<(), LazyTxError> {
        self.log.push(Call::Batch(query.to_string()));
        Ok(())
    }

    /// Reports one affected row per bound parameter.
    async fn execute_dml(
        &mut self,
        query: &str,
        params: &[RowValues],
    ) -> Result<usize, LazyTxError> {
        self.log.push(Call::Dml(query.to_string()));
        Ok(params.len())
    }

    async fn execute_select(
        &mut self,
        query: &str,
        _params: &[RowValues],
    ) -> Result<ResultSet, LazyTxError> {
        self.log.push(Call::Select(query.to_string()));
        Ok(ResultSet::default())
    }
}

#[async_trait]
impl Prepare for RecordingConnection {
    type Statement = RecordingStatement;

    async fn prepare(&mut self, query: &str) -> Result<Self::Statement, LazyTxError> {
        self.log.push(Call::Prepare(query.to_string()));
        Ok(RecordingStatement {
            sql: query.to_string(),
            log: self.log.clone(),
        })
    }
}

/// Statement handed out by [`RecordingConnection::prepare`].
#[derive(Debug, Clone)]
pub struct RecordingStatement {
    sql: String,
    log: CallLog,
}

#[async_trait]
impl PreparedStatement for RecordingStatement {
    fn sql(&self) -> &str {
        &self.sql
    }

    async fn execute(&mut self, params: &[RowValues]) -> Result<usize, LazyTxError> {
        self.log.push(Call::StatementExecute(self.sql.clone()));
        Ok(params.len())
    }

    /// Echoes the parameters back as a single row.
    async fn query(&mut self, params: &[RowValues]) -> Result<ResultSet, LazyTxError> {
        self.log.push(Call::StatementQuery(self.sql.clone()));
        let mut rs = ResultSet::with_capacity(1);
        let columns = (1..=params.len()).map(|i| format!("p{i}")).collect();
        rs.set_column_names(Arc::new(columns));
        rs.add_row_values(params.to_vec());
        Ok(rs)
    }
}
