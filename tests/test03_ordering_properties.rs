#![cfg(feature = "test-utils")]

use lazy_tx::prelude::*;
use lazy_tx::test_utils::{Call, RecordingConnection};

fn savepoints(n: usize) -> Vec<TxAction> {
    let mut actions = vec![TxAction::begin()];
    actions.extend((1..n).map(|i| TxAction::savepoint(format!("sp_{i}")).unwrap()));
    actions
}

#[tokio::test]
async fn drain_preserves_begin_order_for_any_depth() {
    for depth in 1..=8 {
        let conn = RecordingConnection::new();
        let log = conn.log();
        let mut proxy = ConnectionProxy::new(conn);
        let actions = savepoints(depth);

        for action in &actions {
            proxy.begin_transaction(action.clone()).await.unwrap();
        }
        assert_eq!(proxy.pending_len(), depth);
        proxy.materialize_transactions().await.unwrap();

        assert_eq!(log.tx_calls(), actions, "depth {depth}");
    }
}

#[tokio::test]
async fn each_end_cancels_the_innermost_pending_begin() {
    for depth in 1..=6 {
        for ends in 0..=depth {
            let conn = RecordingConnection::new();
            let log = conn.log();
            let mut proxy = ConnectionProxy::new(conn);
            let actions = savepoints(depth);

            for action in &actions {
                proxy.begin_transaction(action.clone()).await.unwrap();
            }
            for _ in 0..ends {
                proxy.end_transaction(TxAction::Rollback).await.unwrap();
            }
            assert!(log.calls().is_empty());

            proxy.materialize_transactions().await.unwrap();
            assert_eq!(log.tx_calls(), actions[..depth - ends].to_vec());
        }
    }
}

#[tokio::test]
async fn any_forwarded_operation_drains_before_running() {
    let conn = RecordingConnection::new();
    let log = conn.log();
    let mut proxy = ConnectionProxy::new(conn);

    for action in savepoints(3) {
        proxy.begin_transaction(action).await.unwrap();
    }
    proxy.execute_batch("SELECT 1").await.unwrap();

    let calls = log.calls();
    assert_eq!(calls.len(), 4);
    assert_eq!(calls[3], Call::Batch("SELECT 1".into()));
    assert!(
        calls[..3]
            .iter()
            .all(|call| matches!(call, Call::Tx(action) if action.is_begin()))
    );
}
