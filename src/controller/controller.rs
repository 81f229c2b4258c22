use log::{info, warn};

use super::{
    StepContext, StepDecision,
    state::{CoordinatorState, Observation, Settings},
};
use crate::{
    collective::Collective,
    config::SteadyStateConfig,
    detection::DetectionMode,
    error::{Result, SteadyStateError},
    estimation::required_samples,
    metrics::StepMetrics,
    window::MetricWindows,
};

/// The rank that watches the metrics and decides when to stop.
pub const COORDINATOR_RANK: usize = 0;

enum Role {
    Coordinator(CoordinatorState),
    Replica,
}

/// Detects steady state in model training and coordinates stopping it.
///
/// Steady state is the point where the iteration speed (or optionally the GPU
/// utilization) stops changing. Only the coordinator ingests metrics and keeps state;
/// every process takes part in the agreement on each step so the halt decision is
/// identical everywhere.
pub struct SteadyStateController<C> {
    settings: Settings,
    role: Role,
    collective: C,
}

impl<C: Collective> SteadyStateController<C> {
    /// Creates a new `SteadyStateController`.
    ///
    /// # Args
    /// * `config` - The run configuration.
    /// * `collective` - This process' handle on the communication group.
    ///
    /// # Errors
    /// `InvalidConfig` if the configuration doesn't validate.
    pub fn new(config: SteadyStateConfig, collective: C) -> Result<Self> {
        config.validate()?;

        if config.mode == DetectionMode::Utilization {
            warn!(
                "GPU utilization as a proxy metric for steady state may not be optimal, it can \
                 differ a lot depending on the cluster configuration and backend parameters. \
                 Please consider using `iter_speed` as the detection mode"
            );
        }

        let role = if collective.rank() == COORDINATOR_RANK {
            Role::Coordinator(CoordinatorState::new(&config))
        } else {
            Role::Replica
        };

        Ok(Self {
            settings: Settings::new(config),
            role,
            collective,
        })
    }

    pub fn config(&self) -> &SteadyStateConfig {
        &self.settings.config
    }

    pub fn rank(&self) -> usize {
        self.collective.rank()
    }

    pub fn world_size(&self) -> usize {
        self.collective.world_size()
    }

    pub fn is_coordinator(&self) -> bool {
        matches!(self.role, Role::Coordinator(_))
    }

    pub fn steady_state_achieved(&self) -> bool {
        self.coordinator().is_some_and(|s| s.achieved)
    }

    pub fn steps_since_achieved(&self) -> u64 {
        self.coordinator().map_or(0, |s| s.steps_since_achieved)
    }

    pub fn num_params(&self) -> Option<u64> {
        self.coordinator().and_then(|s| s.num_params)
    }

    pub fn batch_size(&self) -> Option<usize> {
        self.coordinator().and_then(|s| s.batch_size)
    }

    /// The coordinator's metric windows, `None` on other ranks.
    pub fn windows(&self) -> Option<&MetricWindows> {
        self.coordinator().map(|s| &s.windows)
    }

    /// Training samples needed to reach the configured target loss.
    ///
    /// # Errors
    /// `InvalidConfig` without a target loss, `MissingParameterCount` before the
    /// parameter count is known.
    pub fn num_samples_required(&self) -> Result<u64> {
        let target_loss = self.settings.config.target_loss.ok_or_else(|| {
            SteadyStateError::InvalidConfig("no target loss configured".to_string())
        })?;
        required_samples(target_loss, self.num_params())
    }

    /// Runs the per-step procedure; must be called by every process on every step.
    ///
    /// The coordinator ingests this step's metrics and evaluates its local stop
    /// decision, which is then broadcast and OR-reduced across the group.
    ///
    /// # Args
    /// * `metrics` - The metrics published on the bus for this step.
    /// * `ctx` - The training loop's view of the step.
    ///
    /// # Returns
    /// The step decision, `should_stop` is identical on every process.
    ///
    /// # Errors
    /// Collective failures, and on the coordinator any estimation failure. The latter
    /// is reported after the collectives so no process is left waiting on this step.
    pub async fn on_step_end(
        &mut self,
        metrics: &StepMetrics,
        ctx: &StepContext<'_>,
    ) -> Result<StepDecision> {
        let world_size = self.collective.world_size();

        let observed = match &mut self.role {
            Role::Coordinator(state) => state.observe(&self.settings, metrics, ctx, world_size),
            Role::Replica => Ok(Observation::default()),
        };

        let local_stop = observed.as_ref().is_ok_and(|o| o.local_stop);
        let stop = self.collective.broadcast(local_stop, COORDINATOR_RANK).await?;
        let should_stop = self.collective.reduce_any(stop).await?;

        let observed = observed?;

        if should_stop {
            match &observed.summary {
                Some(summary) => info!("{summary}"),
                None => info!(
                    rank = self.collective.rank(), step = ctx.global_step;
                    "halting on the coordinator's request"
                ),
            }
        }

        Ok(StepDecision {
            should_stop,
            steady_state_achieved: self.steady_state_achieved(),
            estimated_total_hours: observed.estimated_total_hours,
            summary: observed.summary,
        })
    }

    fn coordinator(&self) -> Option<&CoordinatorState> {
        match &self.role {
            Role::Coordinator(state) => Some(state),
            Role::Replica => None,
        }
    }
}
