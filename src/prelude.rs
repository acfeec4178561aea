//! Convenient imports for common functionality.

pub use crate::action::{IsolationLevel, SavepointName, TxAction};
pub use crate::connection::{Prepare, PreparedStatement, TransactionalConnection};
pub use crate::error::LazyTxError;
pub use crate::options::{LazyTxOptions, LazyTxOptionsBuilder};
pub use crate::proxy::{ConnectionProxy, ProxyState, StatementProxy};
pub use crate::results::{DbRow, ResultSet};
pub use crate::types::RowValues;

#[cfg(feature = "sqlite")]
pub use crate::sqlite::{
    LazySqliteConnection, SqliteConnection, SqliteOptions, SqliteOptionsBuilder,
    SqlitePreparedStatement, connect_lazy,
};
