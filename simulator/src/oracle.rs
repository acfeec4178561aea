use lazy_tx::prelude::*;

use crate::plan::Action;

pub(crate) struct Oracle;

impl Oracle {
    /// Invariants of the lazy proxy after `action` completed successfully.
    pub(crate) fn check(proxy: &LazySqliteConnection, action: &Action) -> Result<(), String> {
        if proxy.is_materializing() {
            return Err("materializing flag left set after step".to_string());
        }
        if proxy.pending_len() > proxy.scope_depth() {
            return Err(format!(
                "{} pending begins but only {} open scopes",
                proxy.pending_len(),
                proxy.scope_depth()
            ));
        }
        if action.touches_database() && proxy.has_pending() {
            return Err(format!(
                "{action:?} ran with {} begins still pending",
                proxy.pending_len()
            ));
        }
        let conn = proxy.underlying();
        if conn.in_transaction() && proxy.scope_depth() == 0 {
            return Err("connection in transaction with no open scope".to_string());
        }
        let started = proxy.scope_depth() - proxy.pending_len();
        if proxy.scope_depth() > 0 && (started > 0) != conn.in_transaction() {
            return Err(format!(
                "{started} scopes started but in_transaction={}",
                conn.in_transaction()
            ));
        }
        Ok(())
    }
}
