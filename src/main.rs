use std::{env, num::NonZeroUsize, str::FromStr};

use anyhow::Context;
use log::info;
use tokio::task::JoinSet;

use steady_state::{
    LocalGroup, StepContext, StepMetrics, SteadyStateConfig, SteadyStateController,
    metrics::MetricKeys,
};

const DEFAULT_WORLD_SIZE: NonZeroUsize = NonZeroUsize::new(4).unwrap();
const DEFAULT_NUM_NODES: usize = 1;
const DEFAULT_MAX_STEPS: u64 = 500;
const DEFAULT_BATCH_SIZE: usize = 8;
const MODEL_PARAMS: u64 = 125_000_000;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::init();

    let config = match env::var("STEADY_STATE_CONFIG") {
        Ok(path) => SteadyStateConfig::from_path(&path)
            .with_context(|| format!("loading config from {path}"))?,
        Err(_) => SteadyStateConfig::default(),
    };

    let world_size: NonZeroUsize = env_or("WORLD_SIZE", DEFAULT_WORLD_SIZE)?;
    let num_nodes: usize = env_or("NUM_NODES", DEFAULT_NUM_NODES)?;
    let max_steps: u64 = env_or("MAX_STEPS", DEFAULT_MAX_STEPS)?;

    info!(
        "simulating {world_size} ranks on {num_nodes} node(s) for at most {max_steps} steps, mode={}",
        config.mode
    );

    let mut ranks = JoinSet::new();
    for group in LocalGroup::new(world_size) {
        let controller = SteadyStateController::new(config.clone(), group)?;
        ranks.spawn(run_rank(controller, num_nodes, max_steps));
    }

    let mut halted_at = Vec::new();
    while let Some(ret) = ranks.join_next().await {
        halted_at.push(ret.context("rank task panicked")??);
    }

    if halted_at.windows(2).any(|w| w[0] != w[1]) {
        anyhow::bail!("ranks disagreed on the halt step: {halted_at:?}");
    }

    match halted_at.first().copied().flatten() {
        Some(step) => info!("all ranks halted at step {step}"),
        None => info!("steady state not reached within {max_steps} steps"),
    }

    Ok(())
}

/// Drives one rank through the synthetic training run.
///
/// # Returns
/// The step the run was halted at, if any.
async fn run_rank(
    mut controller: SteadyStateController<LocalGroup>,
    num_nodes: usize,
    max_steps: u64,
) -> anyhow::Result<Option<u64>> {
    let rank = controller.rank();
    let world_size = controller.world_size();
    let keys = controller.config().keys();
    let batch = controller
        .config()
        .batch_size
        .map_or(DEFAULT_BATCH_SIZE, NonZeroUsize::get);

    for step in 0..max_steps {
        let metrics = synthetic_metrics(&keys, step, world_size);
        let ctx = StepContext::new(step, &MODEL_PARAMS, &batch).with_num_nodes(num_nodes);

        let decision = controller
            .on_step_end(&metrics, &ctx)
            .await
            .with_context(|| format!("rank {rank} failed at step {step}"))?;

        if decision.should_stop {
            return Ok(Some(step));
        }
    }

    Ok(None)
}

/// A run whose iteration time decays towards 0.25s while utilization climbs to 95%.
fn synthetic_metrics(keys: &MetricKeys, step: u64, world_size: usize) -> StepMetrics {
    let warmup = (-(step as f64) / 15.0).exp();
    let wobble = 1e-4 * (step as f64).sin();

    let mut metrics = StepMetrics::new();
    metrics.insert(keys.speed(), 0.25 + 0.75 * warmup + wobble);

    for rank in 0..world_size {
        metrics.insert(keys.utilization(rank), 95.0 - 60.0 * warmup + wobble);
    }

    metrics
}

fn env_or<T>(key: &str, default: T) -> anyhow::Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match env::var(key) {
        Ok(value) => value
            .parse()
            .with_context(|| format!("invalid value for {key}: {value}")),
        Err(_) => Ok(default),
    }
}
