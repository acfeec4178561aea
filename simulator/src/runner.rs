use lazy_tx::prelude::*;

use crate::comparator::{Observation, StepResult, compare_step, rows_to_ids};
use crate::logging::EventLog;
use crate::oracle::Oracle;
use crate::plan::{Action, Plan};

const SCHEMA: &str = "CREATE TABLE sim (id INTEGER PRIMARY KEY, value TEXT NOT NULL);";
const INSERT: &str = "INSERT INTO sim (id, value) VALUES (?1, ?2)";
const SELECT: &str = "SELECT id FROM sim ORDER BY id";

#[derive(Debug, Default, Clone, Copy)]
pub(crate) struct RunStats {
    pub(crate) steps: usize,
    pub(crate) rows: usize,
}

async fn open_side(lazy: bool) -> Result<LazySqliteConnection, LazyTxError> {
    let options = LazyTxOptionsBuilder::new().lazy(lazy).build()?;
    let mut proxy = connect_lazy(SqliteOptions::in_memory(), options).await?;
    proxy.execute_batch(SCHEMA).await?;
    Ok(proxy)
}

async fn apply(proxy: &mut LazySqliteConnection, action: &Action) -> StepResult {
    match action {
        Action::BeginScope => {
            StepResult::from_result(proxy.begin_scope(None).await, |()| Observation::Simple)
        }
        Action::CommitScope => {
            StepResult::from_result(proxy.commit_scope().await, |()| Observation::Simple)
        }
        Action::RollbackScope => {
            StepResult::from_result(proxy.rollback_scope().await, |()| Observation::Simple)
        }
        Action::Insert { id } => StepResult::from_result(
            proxy
                .execute_dml(INSERT, &[RowValues::Int(*id), RowValues::Text(format!("v{id}"))])
                .await,
            Observation::Affected,
        ),
        Action::Select => StepResult::from_result(
            proxy.execute_select(SELECT, &[]).await,
            |rs| Observation::Rows(rows_to_ids(&rs)),
        ),
        Action::PreparedInsert { id } => {
            let result = match proxy.prepare(INSERT).await {
                Ok(mut stmt) => {
                    stmt.execute(&[RowValues::Int(*id), RowValues::Text(format!("p{id}"))])
                        .await
                }
                Err(err) => Err(err),
            };
            StepResult::from_result(result, Observation::Affected)
        }
    }
}

/// Replay `plan` against a lazy and an eager proxy and compare them step by step.
pub(crate) async fn run_plan(plan: &Plan, events: &mut EventLog) -> Result<RunStats, String> {
    let mut lazy = open_side(true).await.map_err(|e| e.to_string())?;
    let mut eager = open_side(false).await.map_err(|e| e.to_string())?;

    for (step, action) in plan.actions.iter().enumerate() {
        let lazy_result = apply(&mut lazy, action).await;
        let eager_result = apply(&mut eager, action).await;
        events.record(format!(
            "step={step} action={action:?} lazy={lazy_result:?} pending={} depth={}",
            lazy.pending_len(),
            lazy.scope_depth()
        ));

        compare_step(step, &lazy_result, &eager_result)?;
        if matches!(lazy_result, StepResult::Ok(_)) {
            Oracle::check(&lazy, action).map_err(|reason| format!("step {step}: {reason}"))?;
        }
    }

    let final_lazy = lazy
        .execute_select(SELECT, &[])
        .await
        .map_err(|e| e.to_string())?;
    let final_eager = eager
        .execute_select(SELECT, &[])
        .await
        .map_err(|e| e.to_string())?;
    let (lazy_ids, eager_ids) = (rows_to_ids(&final_lazy), rows_to_ids(&final_eager));
    if lazy_ids != eager_ids {
        return Err(format!(
            "final table mismatch: lazy={lazy_ids:?} eager={eager_ids:?}"
        ));
    }

    Ok(RunStats {
        steps: plan.actions.len(),
        rows: lazy_ids.len(),
    })
}
