use clap::Parser;
use serde::Serialize;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(author, version, about = "Deterministic lazy-tx simulator: lazy vs eager proxies")]
pub(crate) struct Args {
    #[arg(long)]
    pub(crate) seed: Option<u64>,
    /// Number of independent plans to run.
    #[arg(long, default_value_t = 200)]
    pub(crate) runs: u64,
    /// Actions per plan, before closing any scopes left open.
    #[arg(long, default_value_t = 60)]
    pub(crate) steps: usize,
    #[arg(long, default_value_t = 4)]
    pub(crate) max_depth: usize,
    /// Probability that a step touches the database instead of opening/closing a scope.
    #[arg(long, default_value_t = 0.35)]
    pub(crate) statement_rate: f64,
    #[arg(long, default_value_t = 0.4)]
    pub(crate) rollback_rate: f64,
    /// Replay a plan previously written with `--dump-plan` instead of generating one.
    #[arg(long)]
    pub(crate) plan: Option<PathBuf>,
    #[arg(long)]
    pub(crate) dump_plan: Option<PathBuf>,
    #[arg(long)]
    pub(crate) log: Option<PathBuf>,
    #[arg(long)]
    pub(crate) quick: bool,
}

#[derive(Debug, Clone, Serialize)]
pub(crate) struct SimConfig {
    pub(crate) seed: u64,
    pub(crate) runs: u64,
    pub(crate) steps: usize,
    pub(crate) max_depth: usize,
    pub(crate) statement_rate: f64,
    pub(crate) rollback_rate: f64,
    pub(crate) plan: Option<PathBuf>,
    pub(crate) dump_plan: Option<PathBuf>,
    pub(crate) log: Option<PathBuf>,
    pub(crate) preset: Option<String>,
    pub(crate) tail_steps: usize,
}

impl SimConfig {
    pub(crate) fn from_args(args: Args) -> Self {
        let mut config = SimConfig {
            seed: args.seed.unwrap_or_else(random_seed),
            runs: args.runs.max(1),
            steps: args.steps.max(1),
            max_depth: args.max_depth.max(1),
            statement_rate: clamp_rate(args.statement_rate),
            rollback_rate: clamp_rate(args.rollback_rate),
            plan: args.plan,
            dump_plan: args.dump_plan,
            log: args.log,
            preset: None,
            tail_steps: 40,
        };

        if args.quick {
            config.apply_quick();
        }

        config
    }

    fn apply_quick(&mut self) {
        self.preset = Some("quick".to_string());
        self.runs = 20;
        self.steps = 30;
        self.max_depth = 3;
    }
}

fn clamp_rate(value: f64) -> f64 {
    if value.is_nan() { 0.0 } else { value.clamp(0.0, 1.0) }
}

fn random_seed() -> u64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    let now = SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default();
    now.as_secs() ^ u64::from(now.subsec_nanos())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clamp_rate_limits_bounds() {
        assert_eq!(clamp_rate(-1.0), 0.0);
        assert_eq!(clamp_rate(2.0), 1.0);
        assert_eq!(clamp_rate(0.5), 0.5);
        assert_eq!(clamp_rate(f64::NAN), 0.0);
    }

    #[test]
    fn quick_preset_shrinks_the_run() {
        let args = Args::parse_from(["simulator", "--seed", "7", "--quick"]);
        let config = SimConfig::from_args(args);
        assert_eq!(config.seed, 7);
        assert_eq!(config.runs, 20);
        assert_eq!(config.preset.as_deref(), Some("quick"));
    }
}
