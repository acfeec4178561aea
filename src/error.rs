use thiserror::Error;

#[derive(Debug, Error)]
pub enum LazyTxError {
    #[cfg(feature = "sqlite")]
    #[error(transparent)]
    SqliteError(#[from] rusqlite::Error),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Connection error: {0}")]
    ConnectionError(String),

    #[error("SQL execution error: {0}")]
    ExecutionError(String),

    #[error("Transaction error: {0}")]
    TransactionError(String),

    #[error("Invalid savepoint name: {0:?}")]
    InvalidSavepointName(String),

    #[error("Other database error: {0}")]
    Other(String),
}
