use rand::Rng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::args::SimConfig;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct Plan {
    pub(crate) actions: Vec<Action>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub(crate) enum Action {
    BeginScope,
    CommitScope,
    RollbackScope,
    Insert { id: i64 },
    Select,
    PreparedInsert { id: i64 },
}

impl Action {
    pub(crate) fn touches_database(&self) -> bool {
        matches!(
            self,
            Action::Insert { .. } | Action::Select | Action::PreparedInsert { .. }
        )
    }
}

impl Plan {
    pub(crate) fn from_json_path(path: &Path) -> Result<Self, String> {
        let content = fs::read_to_string(path)
            .map_err(|err| format!("failed to read plan file {}: {err}", path.display()))?;
        serde_json::from_str(&content)
            .map_err(|err| format!("failed to parse plan JSON {}: {err}", path.display()))
    }

    pub(crate) fn write_json_path(&self, path: &Path) -> Result<(), String> {
        let content = serde_json::to_string_pretty(self)
            .map_err(|err| format!("failed to serialize plan: {err}"))?;
        fs::write(path, content)
            .map_err(|err| format!("failed to write plan file {}: {err}", path.display()))
    }
}

/// Build a properly nested plan; scopes still open after `steps` actions are rolled back.
pub(crate) fn generate_plan(config: &SimConfig, rng: &mut ChaCha8Rng) -> Plan {
    let mut actions = Vec::with_capacity(config.steps + config.max_depth);
    let mut depth = 0usize;
    let mut next_id = 1i64;

    for _ in 0..config.steps {
        let action = if rng.random::<f64>() < config.statement_rate {
            next_statement(rng, &mut next_id)
        } else if depth == 0 || (depth < config.max_depth && rng.random_bool(0.5)) {
            depth += 1;
            Action::BeginScope
        } else {
            depth -= 1;
            if rng.random::<f64>() < config.rollback_rate {
                Action::RollbackScope
            } else {
                Action::CommitScope
            }
        };
        actions.push(action);
    }

    actions.extend(std::iter::repeat_n(Action::RollbackScope, depth));
    Plan { actions }
}

fn next_statement(rng: &mut ChaCha8Rng, next_id: &mut i64) -> Action {
    let roll = rng.random_range(0..3);
    match roll {
        0 => Action::Select,
        1 => {
            let id = *next_id;
            *next_id += 1;
            Action::PreparedInsert { id }
        }
        _ => {
            let id = *next_id;
            *next_id += 1;
            Action::Insert { id }
        }
    }
}
