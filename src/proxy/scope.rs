use tracing::debug;

use crate::action::{IsolationLevel, SavepointName, TxAction};
use crate::connection::TransactionalConnection;
use crate::error::LazyTxError;

use super::ConnectionProxy;

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum ScopeKind {
    Transaction,
    Savepoint(SavepointName),
}

impl<C> ConnectionProxy<C>
where
    C: TransactionalConnection,
{
    /// Open a nested scope: a transaction at depth 0, a savepoint
    /// (`<prefix>_<depth>`) below that. The start is deferred like any other begin.
    ///
    /// # Errors
    /// Returns [`LazyTxError::TransactionError`] if `isolation` is given for a nested scope,
    /// or the connection's error when lazy mode is off and the start fails.
    pub async fn begin_scope(
        &mut self,
        isolation: Option<IsolationLevel>,
    ) -> Result<(), LazyTxError> {
        let depth = self.scopes.len();
        let (action, kind) = if depth == 0 {
            (TxAction::Begin { isolation }, ScopeKind::Transaction)
        } else {
            if isolation.is_some() {
                return Err(LazyTxError::TransactionError(
                    "isolation level can only be set on the outermost transaction".into(),
                ));
            }
            let name = SavepointName::new(format!("{}_{depth}", self.options.savepoint_prefix))?;
            (
                TxAction::Savepoint { name: name.clone() },
                ScopeKind::Savepoint(name),
            )
        };

        self.begin_transaction(action).await?;
        self.scopes.push(kind);
        debug!(depth = self.scopes.len(), "opened transaction scope");
        Ok(())
    }

    /// Commit the innermost scope (`COMMIT` or `RELEASE SAVEPOINT`).
    ///
    /// # Errors
    /// Returns [`LazyTxError::TransactionError`] with no open scope, or the connection's
    /// error. The scope is closed either way.
    pub async fn commit_scope(&mut self) -> Result<(), LazyTxError> {
        let action = match self.pop_scope("commit")? {
            ScopeKind::Transaction => TxAction::Commit,
            ScopeKind::Savepoint(name) => TxAction::ReleaseSavepoint { name },
        };
        self.end_transaction(action).await
    }

    /// Roll back the innermost scope (`ROLLBACK` or `ROLLBACK TO SAVEPOINT`).
    ///
    /// # Errors
    /// Returns [`LazyTxError::TransactionError`] with no open scope, or the connection's
    /// error. The scope is closed either way.
    pub async fn rollback_scope(&mut self) -> Result<(), LazyTxError> {
        let action = match self.pop_scope("rollback")? {
            ScopeKind::Transaction => TxAction::Rollback,
            ScopeKind::Savepoint(name) => TxAction::RollbackToSavepoint { name },
        };
        self.end_transaction(action).await
    }

    fn pop_scope(&mut self, verb: &str) -> Result<ScopeKind, LazyTxError> {
        self.scopes.pop().ok_or_else(|| {
            LazyTxError::TransactionError(format!("{verb} without an open transaction scope"))
        })
    }
}

impl<C> ConnectionProxy<C> {
    /// Number of scopes opened with `begin_scope` and not yet closed.
    #[must_use]
    pub fn scope_depth(&self) -> usize {
        self.scopes.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::options::LazyTxOptionsBuilder;
    use crate::test_utils::{Call, RecordingConnection};
    use crate::types::RowValues;

    #[tokio::test]
    async fn empty_scopes_never_touch_the_connection() {
        let conn = RecordingConnection::new();
        let log = conn.log();
        let mut proxy = ConnectionProxy::new(conn);

        proxy.begin_scope(None).await.unwrap();
        proxy.begin_scope(None).await.unwrap();
        assert_eq!(proxy.scope_depth(), 2);
        proxy.rollback_scope().await.unwrap();
        proxy.commit_scope().await.unwrap();

        assert!(log.calls().is_empty());
        assert_eq!(proxy.scope_depth(), 0);
    }

    #[tokio::test]
    async fn nested_scope_uses_numbered_savepoints() {
        let conn = RecordingConnection::new();
        let log = conn.log();
        let opts = LazyTxOptionsBuilder::new()
            .savepoint_prefix("app_sp")
            .build()
            .unwrap();
        let mut proxy = ConnectionProxy::with_options(conn, opts).unwrap();

        proxy.begin_scope(None).await.unwrap();
        proxy.begin_scope(None).await.unwrap();
        proxy.execute_dml("DELETE FROM t", &[]).await.unwrap();
        proxy.rollback_scope().await.unwrap();
        proxy.commit_scope().await.unwrap();

        assert_eq!(
            log.calls(),
            vec![
                Call::Tx(TxAction::begin()),
                Call::Tx(TxAction::savepoint("app_sp_1").unwrap()),
                Call::Dml("DELETE FROM t".into()),
                Call::Tx(TxAction::rollback_to_savepoint("app_sp_1").unwrap()),
                Call::Tx(TxAction::Commit),
            ]
        );
    }

    #[tokio::test]
    async fn inner_scope_cancelled_when_only_outer_was_used() {
        let conn = RecordingConnection::new();
        let log = conn.log();
        let mut proxy = ConnectionProxy::new(conn);

        proxy.begin_scope(None).await.unwrap();
        proxy
            .execute_select("SELECT 1", &[RowValues::Null])
            .await
            .unwrap();
        proxy.begin_scope(None).await.unwrap();
        proxy.commit_scope().await.unwrap();
        proxy.commit_scope().await.unwrap();

        assert_eq!(
            log.calls(),
            vec![
                Call::Tx(TxAction::begin()),
                Call::Select("SELECT 1".into()),
                Call::Tx(TxAction::Commit),
            ]
        );
    }

    #[tokio::test]
    async fn isolation_only_allowed_on_outer_scope() {
        let mut proxy = ConnectionProxy::new(RecordingConnection::new());
        proxy
            .begin_scope(Some(IsolationLevel::Serializable))
            .await
            .unwrap();
        let err = proxy
            .begin_scope(Some(IsolationLevel::ReadCommitted))
            .await
            .unwrap_err();
        assert!(matches!(err, LazyTxError::TransactionError(_)));
        assert_eq!(proxy.scope_depth(), 1);
        assert_eq!(proxy.pending_len(), 1);
    }

    #[tokio::test]
    async fn closing_without_scope_is_an_error() {
        let mut proxy = ConnectionProxy::new(RecordingConnection::new());
        assert!(matches!(
            proxy.commit_scope().await,
            Err(LazyTxError::TransactionError(_))
        ));
        assert!(matches!(
            proxy.rollback_scope().await,
            Err(LazyTxError::TransactionError(_))
        ));
    }
}
