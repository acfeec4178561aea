use std::collections::VecDeque;
use std::fmt;

use tracing::{debug, trace, warn};

use crate::action::TxAction;
use crate::connection::TransactionalConnection;
use crate::error::LazyTxError;
use crate::options::LazyTxOptions;

use super::scope::ScopeKind;

/// Where a [`ConnectionProxy`] currently sits in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProxyState {
    /// Lazy mode, nothing queued.
    LazyIdle,
    /// Lazy mode with at least one transaction start waiting to run.
    LazyPending,
    /// A drain of the queue is in flight.
    Materializing,
    /// Lazy mode disabled; transaction starts run immediately.
    Eager,
}

/// Proxy over a single connection that defers transaction and savepoint starts until
/// something actually needs them.
///
/// Begins passed to [`begin_transaction`](Self::begin_transaction) are queued. Any other
/// operation (the [`TransactionalConnection`] methods implemented on the proxy, or running a
/// statement through a [`StatementProxy`](super::StatementProxy)) first replays the queue
/// oldest-first. An [`end_transaction`](Self::end_transaction) that arrives while begins are
/// still queued cancels the newest one instead of touching the database.
///
/// The proxy is move-only and every operation takes `&mut self`: one owner at a time.
pub struct ConnectionProxy<C> {
    pub(crate) underlying: C,
    pub(crate) pending: VecDeque<TxAction>,
    pub(crate) materializing: bool,
    pub(crate) lazy_enabled: bool,
    pub(crate) options: LazyTxOptions,
    pub(crate) scopes: Vec<ScopeKind>,
}

/// Clears the reentrancy flag on every exit path, including a dropped drain future.
struct MaterializingGuard<'a> {
    flag: &'a mut bool,
}

impl<'a> MaterializingGuard<'a> {
    fn engage(flag: &'a mut bool) -> Self {
        *flag = true;
        Self { flag }
    }
}

impl Drop for MaterializingGuard<'_> {
    fn drop(&mut self) {
        *self.flag = false;
    }
}

impl<C> ConnectionProxy<C>
where
    C: TransactionalConnection,
{
    /// Wrap `underlying` with default options (lazy mode on).
    #[must_use]
    pub fn new(underlying: C) -> Self {
        Self::from_parts(underlying, LazyTxOptions::default())
    }

    /// Wrap `underlying` using `options`.
    ///
    /// # Errors
    /// Returns [`LazyTxError::ConfigError`] if the options fail validation.
    pub fn with_options(underlying: C, options: LazyTxOptions) -> Result<Self, LazyTxError> {
        options.validate()?;
        Ok(Self::from_parts(underlying, options))
    }

    fn from_parts(underlying: C, options: LazyTxOptions) -> Self {
        Self {
            underlying,
            pending: VecDeque::new(),
            materializing: false,
            lazy_enabled: options.lazy_transactions,
            options,
            scopes: Vec::new(),
        }
    }

    /// Queue `action` in lazy mode, or run it right away in eager mode.
    ///
    /// # Errors
    /// Queueing never fails. In eager mode the connection's error for `action` is returned.
    pub async fn begin_transaction(&mut self, action: TxAction) -> Result<(), LazyTxError> {
        if self.lazy_enabled {
            debug!(%action, depth = self.pending.len() + 1, "deferring transaction start");
            self.pending.push_back(action);
            Ok(())
        } else {
            debug!(%action, "running transaction start eagerly");
            action.apply(&mut self.underlying).await
        }
    }

    /// Close the innermost transaction scope.
    ///
    /// If begins are still queued, the newest one is dropped and `action` is discarded with
    /// it; neither reaches the database. Otherwise `action` runs now.
    ///
    /// # Errors
    /// Returns the connection's error when `action` runs and fails.
    pub async fn end_transaction(&mut self, action: TxAction) -> Result<(), LazyTxError> {
        match self.pending.pop_back() {
            Some(cancelled) => {
                debug!(%cancelled, discarded = %action, "cancelled deferred transaction start");
                Ok(())
            }
            None => action.apply(&mut self.underlying).await,
        }
    }

    /// Run every queued begin, oldest first.
    ///
    /// A call made while a drain is already in flight returns immediately.
    ///
    /// # Cancellation
    /// Dropping the returned future only clears the reentrancy flag. The action being
    /// applied at that moment is already off the queue and is not restored, and a backend
    /// that hands work to another thread (the `SQLite` backend uses `spawn_blocking`) may
    /// still run it. The connection's transaction state is unknown afterwards; roll back
    /// or discard the connection rather than reuse it.
    ///
    /// # Errors
    /// The first failing action's error is returned unchanged. That action is consumed;
    /// anything queued behind it stays queued.
    pub async fn materialize_transactions(&mut self) -> Result<(), LazyTxError> {
        if self.materializing || self.pending.is_empty() {
            return Ok(());
        }

        debug!(pending = self.pending.len(), "materializing deferred transactions");
        let _guard = MaterializingGuard::engage(&mut self.materializing);
        while let Some(action) = self.pending.pop_front() {
            trace!(%action, "applying deferred transaction start");
            if let Err(err) = action.apply(&mut self.underlying).await {
                warn!(%action, error = %err, remaining = self.pending.len(), "deferred transaction start failed");
                return Err(err);
            }
        }
        Ok(())
    }

    /// Materialize anything queued, then run future begins immediately.
    ///
    /// # Errors
    /// Returns the materialization error; lazy mode stays on in that case.
    pub async fn disable_lazy_transactions(&mut self) -> Result<(), LazyTxError> {
        self.materialize_transactions().await?;
        self.lazy_enabled = false;
        Ok(())
    }

    /// Resume queueing begins. Already queued or materialized work is untouched.
    pub fn enable_lazy_transactions(&mut self) {
        self.lazy_enabled = true;
    }

    /// Disable lazy mode and borrow the wrapped connection directly.
    ///
    /// # Errors
    /// Returns the materialization error if queued begins fail to run.
    pub async fn proxied_connection(&mut self) -> Result<&mut C, LazyTxError> {
        self.disable_lazy_transactions().await?;
        Ok(&mut self.underlying)
    }

    /// Disable lazy mode and give back the wrapped connection.
    ///
    /// # Errors
    /// Returns the materialization error if queued begins fail to run.
    pub async fn into_inner(mut self) -> Result<C, LazyTxError> {
        self.disable_lazy_transactions().await?;
        Ok(self.underlying)
    }
}

impl<C> ConnectionProxy<C> {
    /// Shared access to the wrapped connection. Does not materialize anything.
    #[must_use]
    pub fn underlying(&self) -> &C {
        &self.underlying
    }

    #[must_use]
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    #[must_use]
    pub fn has_pending(&self) -> bool {
        !self.pending.is_empty()
    }

    /// Queued begins, oldest first.
    pub fn pending(&self) -> impl Iterator<Item = &TxAction> {
        self.pending.iter()
    }

    #[must_use]
    pub fn is_lazy_enabled(&self) -> bool {
        self.lazy_enabled
    }

    #[must_use]
    pub fn is_materializing(&self) -> bool {
        self.materializing
    }

    #[must_use]
    pub fn options(&self) -> &LazyTxOptions {
        &self.options
    }

    #[must_use]
    pub fn state(&self) -> ProxyState {
        if self.materializing {
            ProxyState::Materializing
        } else if !self.lazy_enabled {
            ProxyState::Eager
        } else if self.pending.is_empty() {
            ProxyState::LazyIdle
        } else {
            ProxyState::LazyPending
        }
    }
}

impl<C: fmt::Debug> fmt::Debug for ConnectionProxy<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionProxy")
            .field("underlying", &self.underlying)
            .field("pending", &self.pending)
            .field("materializing", &self.materializing)
            .field("lazy_enabled", &self.lazy_enabled)
            .field("scopes", &self.scopes.len())
            .finish()
    }
}
