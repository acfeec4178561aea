use serde::{Deserialize, Serialize};

use crate::action::SavepointName;
use crate::error::LazyTxError;

/// Default prefix for savepoints opened by nested scopes (`lazy_tx_sp_1`, `lazy_tx_sp_2`, ...).
pub const DEFAULT_SAVEPOINT_PREFIX: &str = "lazy_tx_sp";

/// Options for configuring a [`ConnectionProxy`](crate::proxy::ConnectionProxy).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LazyTxOptions {
    /// Queue transaction starts instead of running them immediately.
    pub lazy_transactions: bool,
    pub savepoint_prefix: String,
}

impl Default for LazyTxOptions {
    fn default() -> Self {
        Self {
            lazy_transactions: true,
            savepoint_prefix: DEFAULT_SAVEPOINT_PREFIX.to_string(),
        }
    }
}

impl LazyTxOptions {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_lazy_transactions(mut self, lazy: bool) -> Self {
        self.lazy_transactions = lazy;
        self
    }

    /// Check that savepoint names generated from the prefix will be valid identifiers.
    ///
    /// # Errors
    /// Returns [`LazyTxError::ConfigError`] if the prefix cannot form a savepoint name.
    pub fn validate(&self) -> Result<(), LazyTxError> {
        // Leave room for the `_<depth>` suffix.
        let probe = format!("{}_{}", self.savepoint_prefix, u32::MAX);
        SavepointName::new(probe).map(|_| ()).map_err(|_| {
            LazyTxError::ConfigError(format!(
                "savepoint prefix {:?} is not a usable identifier",
                self.savepoint_prefix
            ))
        })
    }
}

/// Fluent builder for [`LazyTxOptions`].
#[derive(Debug, Clone, Default)]
pub struct LazyTxOptionsBuilder {
    opts: LazyTxOptions,
}

impl LazyTxOptionsBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn lazy(mut self, lazy: bool) -> Self {
        self.opts.lazy_transactions = lazy;
        self
    }

    #[must_use]
    pub fn savepoint_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.opts.savepoint_prefix = prefix.into();
        self
    }

    #[must_use]
    pub fn finish(self) -> LazyTxOptions {
        self.opts
    }

    /// Finish and validate the options.
    ///
    /// # Errors
    /// Returns [`LazyTxError::ConfigError`] if the savepoint prefix is unusable.
    pub fn build(self) -> Result<LazyTxOptions, LazyTxError> {
        self.opts.validate()?;
        Ok(self.opts)
    }
}
