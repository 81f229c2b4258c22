use std::fmt;

use crate::metrics::{ESTIMATED_TOTAL_TIME, STEADY_STATE_ACHIEVED};

/// Outcome of a monitored step, identical on every process for `should_stop`.
#[derive(Debug, Clone, PartialEq)]
pub struct StepDecision {
    /// The globally agreed halt decision.
    pub should_stop: bool,
    /// This process' steady-state latch, only ever set on the coordinator.
    pub steady_state_achieved: bool,
    /// Estimated total training time in hours, coordinator only.
    pub estimated_total_hours: Option<f64>,
    /// Set on the coordinator on the step it requests the halt.
    pub summary: Option<HaltSummary>,
}

impl StepDecision {
    /// The metrics this step publishes to the bus.
    pub fn published_metrics(&self) -> Vec<(&'static str, f64)> {
        let mut metrics = vec![(
            STEADY_STATE_ACHIEVED,
            if self.steady_state_achieved { 1.0 } else { 0.0 },
        )];

        if let Some(hours) = self.estimated_total_hours {
            metrics.push((ESTIMATED_TOTAL_TIME, hours));
        }

        metrics
    }
}

/// Human-readable report emitted when training halts on steady state.
#[derive(Debug, Clone, PartialEq)]
pub struct HaltSummary {
    pub estimated_total_hours: Option<f64>,
    pub num_nodes: usize,
    pub world_size: usize,
    pub batch_size: Option<usize>,
    pub seconds_per_batch: Option<f64>,
    pub gpu_utilization: Option<f64>,
    pub max_memory_gb: Option<f64>,
}

impl fmt::Display for HaltSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Stopping training due to steady state achieved! ")?;

        if let Some(hours) = self.estimated_total_hours {
            write!(f, "Estimated total time: {hours:.2} hours! ")?;
        }

        write!(
            f,
            "Training on {} nodes with a total of {} parallel training processes! ",
            self.num_nodes, self.world_size
        )?;

        write!(f, "Speed / Batch (bs=")?;
        write_opt(f, self.batch_size)?;
        write!(f, "): ")?;
        write_opt(f, self.seconds_per_batch)?;
        write!(f, " seconds.")?;

        if let Some(util) = self.gpu_utilization {
            write!(f, " The GPU utilization is {util}% on average.")?;
        }

        if let Some(memory) = self.max_memory_gb {
            write!(f, " Maximally used GPU Memory: {memory} GB")?;
        }

        Ok(())
    }
}

fn write_opt<T: fmt::Display>(f: &mut fmt::Formatter<'_>, value: Option<T>) -> fmt::Result {
    match value {
        Some(v) => write!(f, "{v}"),
        None => f.write_str("unknown"),
    }
}
