mod core;
mod dispatch;
mod scope;
mod statement;

pub use self::core::{ConnectionProxy, ProxyState};
pub use self::statement::StatementProxy;
