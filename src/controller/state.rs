use log::{debug, info};

use super::{HaltSummary, StepContext};
use crate::{
    config::SteadyStateConfig,
    detection::{Strategy, Tolerance},
    error::Result,
    estimation::{estimated_hours_remaining, required_samples},
    metrics::{MetricKeys, StepMetrics},
    window::MetricWindows,
};

/// Immutable settings resolved once from the configuration.
pub(super) struct Settings {
    pub config: SteadyStateConfig,
    pub keys: MetricKeys,
    pub tolerance: Tolerance,
    pub strategy: Strategy,
}

impl Settings {
    pub fn new(config: SteadyStateConfig) -> Self {
        Self {
            keys: config.keys(),
            tolerance: config.tolerance(),
            strategy: config.mode.strategy(),
            config,
        }
    }
}

/// The coordinator's view of a step, before agreement.
#[derive(Debug, Default)]
pub(super) struct Observation {
    pub local_stop: bool,
    pub estimated_total_hours: Option<f64>,
    pub summary: Option<HaltSummary>,
}

/// All mutable monitoring state, owned by the coordinating process only.
#[derive(Debug)]
pub(super) struct CoordinatorState {
    pub windows: MetricWindows,
    /// Latched once, never reset within a run.
    pub achieved: bool,
    pub steps_since_achieved: u64,
    pub num_params: Option<u64>,
    pub batch_size: Option<usize>,
}

impl CoordinatorState {
    pub fn new(config: &SteadyStateConfig) -> Self {
        Self {
            windows: MetricWindows::new(config.window_size),
            achieved: false,
            steps_since_achieved: 0,
            num_params: config.num_params.map(|n| n.get()),
            batch_size: config.batch_size.map(|n| n.get()),
        }
    }

    pub fn observe(
        &mut self,
        settings: &Settings,
        metrics: &StepMetrics,
        ctx: &StepContext<'_>,
        world_size: usize,
    ) -> Result<Observation> {
        if self.num_params.is_none() {
            self.num_params = Some(ctx.model.trainable_parameters()).filter(|&n| n > 0);
        }

        if self.batch_size.is_none() {
            self.batch_size = Some(ctx.batch.batch_size()).filter(|&bs| bs > 0);
        }

        if self.achieved {
            self.steps_since_achieved += 1;
        } else {
            self.ingest(&settings.keys, metrics, ctx.global_step, world_size);

            if (settings.strategy)(&self.windows, settings.tolerance) {
                self.achieved = true;
                info!(
                    step = ctx.global_step, mode = settings.config.mode.as_str();
                    "steady state achieved"
                );
            }
        }

        if !self.achieved {
            return Ok(Observation::default());
        }

        let config = &settings.config;
        let seconds_per_batch = metrics
            .get(&settings.keys.speed_averaged(Some(config.summary_average)))
            .or_else(|| self.windows.iteration_speed().mean());

        let estimated_total_hours = match config.target_loss {
            Some(target_loss) => {
                self.estimate(target_loss, seconds_per_batch, ctx.global_step, world_size)?
            }
            None => None,
        };

        let local_stop =
            config.stop_on_steady_state && self.steps_since_achieved >= config.steps_before_stop;

        let summary = local_stop.then(|| HaltSummary {
            estimated_total_hours,
            num_nodes: ctx.num_nodes,
            world_size,
            batch_size: self.batch_size,
            seconds_per_batch,
            gpu_utilization: metrics.get(
                &settings
                    .keys
                    .utilization_averaged(0, Some(config.summary_average)),
            ),
            max_memory_gb: metrics.get(&config.memory_key),
        });

        Ok(Observation {
            local_stop,
            estimated_total_hours,
            summary,
        })
    }

    fn ingest(&mut self, keys: &MetricKeys, metrics: &StepMetrics, step: u64, world_size: usize) {
        for rank in 0..world_size {
            if let Some(util) = metrics.get(&keys.utilization(rank)) {
                self.windows.push_utilization(rank, step, util);
            }
        }

        if let Some(speed) = metrics.get(&keys.speed()) {
            self.windows.push_iteration_speed(step, speed);
        }

        debug!(
            step = step, speed_samples = self.windows.iteration_speed().len();
            "ingested step metrics"
        );
    }

    /// Hours left to reach the target loss, `None` while batch size or speed are unknown.
    fn estimate(
        &self,
        target_loss: f64,
        seconds_per_batch: Option<f64>,
        global_step: u64,
        world_size: usize,
    ) -> Result<Option<f64>> {
        let (Some(batch_size), Some(seconds_per_batch)) = (self.batch_size, seconds_per_batch)
        else {
            return Ok(None);
        };

        let required = required_samples(target_loss, self.num_params)?;
        let consumed = global_step
            .saturating_mul(batch_size as u64)
            .saturating_mul(world_size as u64);

        Ok(Some(estimated_hours_remaining(
            required.saturating_sub(consumed),
            world_size,
            batch_size,
            seconds_per_batch,
        )))
    }
}
