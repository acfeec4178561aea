use std::fmt;

use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::connection::TransactionalConnection;
use crate::error::LazyTxError;

lazy_static! {
    static ref SAVEPOINT_NAME_RE: Regex =
        Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("savepoint name regex");
}

/// Longest identifier accepted by the backends we target (Postgres truncates at 63 bytes).
pub const MAX_SAVEPOINT_NAME_LEN: usize = 63;

/// Isolation level requested for an outermost transaction.
///
/// The proxy never chooses a level; it only carries the caller's choice to the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IsolationLevel {
    ReadUncommitted,
    ReadCommitted,
    RepeatableRead,
    Serializable,
}

impl IsolationLevel {
    #[must_use]
    pub fn as_sql(self) -> &'static str {
        match self {
            IsolationLevel::ReadUncommitted => "READ UNCOMMITTED",
            IsolationLevel::ReadCommitted => "READ COMMITTED",
            IsolationLevel::RepeatableRead => "REPEATABLE READ",
            IsolationLevel::Serializable => "SERIALIZABLE",
        }
    }
}

/// A savepoint identifier that is safe to splice into `SAVEPOINT <name>`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct SavepointName(String);

impl SavepointName {
    /// Validate and wrap a savepoint name.
    ///
    /// # Errors
    /// Returns [`LazyTxError::InvalidSavepointName`] if the name is empty, too long, or not a
    /// plain identifier.
    pub fn new(name: impl Into<String>) -> Result<Self, LazyTxError> {
        let name = name.into();
        if name.len() > MAX_SAVEPOINT_NAME_LEN || !SAVEPOINT_NAME_RE.is_match(&name) {
            return Err(LazyTxError::InvalidSavepointName(name));
        }
        Ok(Self(name))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SavepointName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for SavepointName {
    type Error = LazyTxError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        SavepointName::new(value)
    }
}

impl From<SavepointName> for String {
    fn from(value: SavepointName) -> Self {
        value.0
    }
}

/// A transaction-control operation captured by value so it can run later.
///
/// Begin-side variants are what [`ConnectionProxy::begin_transaction`] queues; end-side
/// variants are what [`ConnectionProxy::end_transaction`] runs once the matching begin has
/// reached the database.
///
/// [`ConnectionProxy::begin_transaction`]: crate::proxy::ConnectionProxy::begin_transaction
/// [`ConnectionProxy::end_transaction`]: crate::proxy::ConnectionProxy::end_transaction
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TxAction {
    Begin { isolation: Option<IsolationLevel> },
    Savepoint { name: SavepointName },
    Commit,
    Rollback,
    ReleaseSavepoint { name: SavepointName },
    RollbackToSavepoint { name: SavepointName },
}

impl TxAction {
    #[must_use]
    pub fn begin() -> Self {
        TxAction::Begin { isolation: None }
    }

    #[must_use]
    pub fn begin_with(isolation: IsolationLevel) -> Self {
        TxAction::Begin {
            isolation: Some(isolation),
        }
    }

    /// # Errors
    /// Returns [`LazyTxError::InvalidSavepointName`] if `name` is not a valid identifier.
    pub fn savepoint(name: impl Into<String>) -> Result<Self, LazyTxError> {
        Ok(TxAction::Savepoint {
            name: SavepointName::new(name)?,
        })
    }

    /// # Errors
    /// Returns [`LazyTxError::InvalidSavepointName`] if `name` is not a valid identifier.
    pub fn release_savepoint(name: impl Into<String>) -> Result<Self, LazyTxError> {
        Ok(TxAction::ReleaseSavepoint {
            name: SavepointName::new(name)?,
        })
    }

    /// # Errors
    /// Returns [`LazyTxError::InvalidSavepointName`] if `name` is not a valid identifier.
    pub fn rollback_to_savepoint(name: impl Into<String>) -> Result<Self, LazyTxError> {
        Ok(TxAction::RollbackToSavepoint {
            name: SavepointName::new(name)?,
        })
    }

    /// True for the variants that open a transaction or savepoint.
    #[must_use]
    pub fn is_begin(&self) -> bool {
        matches!(self, TxAction::Begin { .. } | TxAction::Savepoint { .. })
    }

    /// Run this action against `conn`.
    ///
    /// # Errors
    /// Propagates whatever the connection returns for the corresponding call.
    pub async fn apply<C>(&self, conn: &mut C) -> Result<(), LazyTxError>
    where
        C: TransactionalConnection + ?Sized,
    {
        match self {
            TxAction::Begin { isolation } => conn.begin(*isolation).await,
            TxAction::Savepoint { name } => conn.create_savepoint(name).await,
            TxAction::Commit => conn.commit().await,
            TxAction::Rollback => conn.rollback().await,
            TxAction::ReleaseSavepoint { name } => conn.release_savepoint(name).await,
            TxAction::RollbackToSavepoint { name } => conn.rollback_to_savepoint(name).await,
        }
    }
}

impl fmt::Display for TxAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TxAction::Begin { isolation: None } => f.write_str("BEGIN"),
            TxAction::Begin {
                isolation: Some(level),
            } => write!(f, "BEGIN ({})", level.as_sql()),
            TxAction::Savepoint { name } => write!(f, "SAVEPOINT {name}"),
            TxAction::Commit => f.write_str("COMMIT"),
            TxAction::Rollback => f.write_str("ROLLBACK"),
            TxAction::ReleaseSavepoint { name } => write!(f, "RELEASE SAVEPOINT {name}"),
            TxAction::RollbackToSavepoint { name } => write!(f, "ROLLBACK TO SAVEPOINT {name}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn savepoint_names_must_be_identifiers() {
        assert!(SavepointName::new("sp_1").is_ok());
        assert!(SavepointName::new("_inner").is_ok());
        for bad in ["", "1sp", "sp-1", "sp; DROP TABLE t", "sp 1"] {
            assert!(
                matches!(
                    SavepointName::new(bad),
                    Err(LazyTxError::InvalidSavepointName(_))
                ),
                "{bad:?} should be rejected"
            );
        }
        assert!(SavepointName::new("a".repeat(MAX_SAVEPOINT_NAME_LEN)).is_ok());
        assert!(SavepointName::new("a".repeat(MAX_SAVEPOINT_NAME_LEN + 1)).is_err());
    }

    #[test]
    fn begin_side_variants() {
        assert!(TxAction::begin().is_begin());
        assert!(TxAction::savepoint("sp").unwrap().is_begin());
        assert!(!TxAction::Commit.is_begin());
        assert!(!TxAction::rollback_to_savepoint("sp").unwrap().is_begin());
    }

    #[test]
    fn display_reads_like_sql() {
        assert_eq!(
            TxAction::begin_with(IsolationLevel::Serializable).to_string(),
            "BEGIN (SERIALIZABLE)"
        );
        assert_eq!(
            TxAction::release_savepoint("sp_2").unwrap().to_string(),
            "RELEASE SAVEPOINT sp_2"
        );
    }

    #[test]
    fn deserializing_rejects_bad_savepoint_names() {
        let ok: TxAction =
            serde_json::from_str(r#"{"type":"savepoint","name":"sp_1"}"#).unwrap();
        assert_eq!(ok, TxAction::savepoint("sp_1").unwrap());
        let bad = serde_json::from_str::<TxAction>(r#"{"type":"savepoint","name":"x y"}"#);
        assert!(bad.is_err());
    }
}
