//! `SQLite` backend built on `rusqlite`.

mod config;
mod connection;
mod params;
mod prepared;
mod query;

pub use config::{IN_MEMORY, SqliteOptions, SqliteOptionsBuilder};
pub use connection::SqliteConnection;
pub use params::{convert_params, row_value_to_sqlite_value};
pub use prepared::SqlitePreparedStatement;
pub use query::{build_result_set, sqlite_extract_value};

/// A lazily-transacting proxy over a `SQLite` connection.
pub type LazySqliteConnection = crate::proxy::ConnectionProxy<SqliteConnection>;

/// Open a `SQLite` connection and wrap it in a [`ConnectionProxy`](crate::proxy::ConnectionProxy).
///
/// # Errors
/// Returns `LazyTxError` if the database cannot be opened or `options` are invalid.
pub async fn connect_lazy(
    sqlite: SqliteOptions,
    options: crate::options::LazyTxOptions,
) -> Result<LazySqliteConnection, crate::error::LazyTxError> {
    let conn = SqliteConnection::open(sqlite).await?;
    crate::proxy::ConnectionProxy::with_options(conn, options)
}
