use lazy_tx::prelude::*;

/// What one side observed for a single step.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum StepResult {
    Ok(Observation),
    Err(String),
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Observation {
    Simple,
    Affected(usize),
    Rows(Vec<i64>),
}

impl StepResult {
    pub(crate) fn from_result<T>(
        result: Result<T, LazyTxError>,
        observe: impl FnOnce(T) -> Observation,
    ) -> Self {
        match result {
            Ok(value) => StepResult::Ok(observe(value)),
            Err(err) => StepResult::Err(err.to_string()),
        }
    }
}

pub(crate) fn rows_to_ids(rs: &ResultSet) -> Vec<i64> {
    rs.results
        .iter()
        .filter_map(|row| row.get_by_index(0).and_then(RowValues::as_int).copied())
        .collect()
}

/// Lazy and eager runs must agree on every step; only the timing of BEGIN differs.
pub(crate) fn compare_step(
    step: usize,
    lazy: &StepResult,
    eager: &StepResult,
) -> Result<(), String> {
    match (lazy, eager) {
        (StepResult::Ok(left), StepResult::Ok(right)) if left == right => Ok(()),
        (StepResult::Ok(left), StepResult::Ok(right)) => Err(format!(
            "step {step}: observation mismatch: lazy={left:?} eager={right:?}"
        )),
        (StepResult::Err(_), StepResult::Err(_)) => Ok(()),
        (StepResult::Ok(_), StepResult::Err(err)) => {
            Err(format!("step {step}: lazy ok, eager error: {err}"))
        }
        (StepResult::Err(err), StepResult::Ok(_)) => {
            Err(format!("step {step}: lazy error, eager ok: {err}"))
        }
    }
}
