mod args;
mod comparator;
mod logging;
mod oracle;
mod plan;
mod runner;

use clap::Parser;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use tracing::Level;

use crate::args::{Args, SimConfig};
use crate::logging::{EventLog, LogWriter};
use crate::plan::{Plan, generate_plan};
use crate::runner::run_plan;

fn main() {
    let args = Args::parse();
    let config = SimConfig::from_args(args);
    let writer = LogWriter::new(config.log.clone()).unwrap_or_else(|err| {
        eprintln!("failed to open log file: {err}");
        std::process::exit(1);
    });

    tracing_subscriber::fmt()
        .with_writer(writer)
        .with_target(false)
        .with_max_level(Level::INFO)
        .init();

    let config_json = serde_json::to_string_pretty(&config).unwrap_or_else(|_| "{}".to_string());
    tracing::info!("config: {}", config_json);

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap_or_else(|err| {
            eprintln!("failed to build tokio runtime: {err}");
            std::process::exit(1);
        });

    if let Err(reason) = runtime.block_on(run(&config)) {
        tracing::error!("simulation failed: {reason}");
        std::process::exit(1);
    }
}

async fn run(config: &SimConfig) -> Result<(), String> {
    if let Some(path) = &config.plan {
        let plan = Plan::from_json_path(path)?;
        return run_one(config, 0, &plan).await;
    }

    let mut rng = ChaCha8Rng::seed_from_u64(config.seed);
    let mut total_steps = 0usize;
    for run_index in 0..config.runs {
        let plan = generate_plan(config, &mut rng);
        total_steps += plan.actions.len();
        run_one(config, run_index, &plan).await?;
    }

    tracing::info!(
        "all {} runs passed (seed={}, steps={total_steps})",
        config.runs,
        config.seed
    );
    Ok(())
}

async fn run_one(config: &SimConfig, run_index: u64, plan: &Plan) -> Result<(), String> {
    let mut events = EventLog::new(config.tail_steps);
    match run_plan(plan, &mut events).await {
        Ok(stats) => {
            tracing::debug!(
                "run {run_index}: {} steps, {} rows committed",
                stats.steps,
                stats.rows
            );
            Ok(())
        }
        Err(reason) => {
            events.dump_failure(&reason);
            if let Some(path) = &config.dump_plan {
                plan.write_json_path(path)?;
                tracing::error!("failing plan written to {}", path.display());
            }
            Err(format!("run {run_index} (seed={}): {reason}", config.seed))
        }
    }
}
