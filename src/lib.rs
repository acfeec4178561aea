//! Lazy transaction materialization for async database connections.
//!
//! [`ConnectionProxy`] wraps a connection and queues transaction and savepoint starts
//! instead of sending them. The queue is replayed, oldest first, right before the first
//! operation that needs a live transaction; closing a scope whose start is still queued
//! simply drops it, so transaction blocks that never touch the database cost nothing.
//!
//! ```rust,no_run
//! # #[cfg(feature = "sqlite")]
//! # async fn demo() -> Result<(), lazy_tx::LazyTxError> {
//! use lazy_tx::prelude::*;
//!
//! let conn = SqliteConnection::open_in_memory().await?;
//! let mut proxy = ConnectionProxy::new(conn);
//!
//! proxy.begin_transaction(TxAction::begin()).await?;
//! // nothing sent yet; this rollback is a no-op
//! proxy.end_transaction(TxAction::Rollback).await?;
//!
//! proxy.begin_transaction(TxAction::begin()).await?;
//! proxy.execute_batch("CREATE TABLE t (a INTEGER)").await?; // BEGIN runs first
//! proxy.end_transaction(TxAction::Commit).await?;
//! # Ok(())
//! # }
//! ```

pub mod action;
pub mod connection;
pub mod error;
pub mod options;
pub mod prelude;
pub mod proxy;
pub mod results;
#[cfg(feature = "sqlite")]
pub mod sqlite;
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;
pub mod types;

pub use action::{IsolationLevel, SavepointName, TxAction};
pub use connection::{Prepare, PreparedStatement, TransactionalConnection};
pub use error::LazyTxError;
pub use options::{LazyTxOptions, LazyTxOptionsBuilder};
pub use proxy::{ConnectionProxy, ProxyState, StatementProxy};
pub use results::{DbRow, ResultSet};
pub use types::RowValues;
