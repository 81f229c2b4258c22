use std::{
    fs,
    num::{NonZeroU64, NonZeroUsize},
    path::Path,
};

use serde::{Deserialize, Serialize};

use crate::{
    detection::{DetectionMode, Tolerance},
    error::{Result, SteadyStateError},
    metrics::MetricKeys,
};

pub const DEFAULT_RTOL: f64 = 0.015;
pub const DEFAULT_WINDOW_SIZE: usize = 10;
pub const DEFAULT_STEPS_BEFORE_STOP: u64 = 10;
pub const DEFAULT_SUMMARY_AVERAGE: u32 = 10;
pub const DEFAULT_UTILIZATION_KEY: &str = "gpu_stats/utilization";
pub const DEFAULT_SPEED_KEY: &str = "time/seconds_per_iter";
pub const DEFAULT_MEMORY_KEY: &str = "gpu_stats/max_memory_rank0";

/// Parameters of a steady-state monitored run, fixed at controller construction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SteadyStateConfig {
    /// Loss the run should eventually reach, enables the training-time estimate.
    pub target_loss: Option<f64>,
    /// Per-process batch size, inferred from the first batch if absent.
    pub batch_size: Option<NonZeroUsize>,
    /// Trainable parameter count, inferred from the model summary if absent.
    pub num_params: Option<NonZeroU64>,
    pub rtol: f64,
    pub atol: Option<f64>,
    pub mode: DetectionMode,
    /// `_averaged{N}` suffix of the ingested metrics, raw metrics if absent.
    pub average: Option<u32>,
    pub window_size: NonZeroUsize,
    pub stop_on_steady_state: bool,
    /// Steps to keep training after steady state is reached before stopping.
    pub steps_before_stop: u64,
    pub utilization_key: String,
    pub speed_key: String,
    /// `_averaged{N}` suffix of the metrics reported in the estimate and halt summary.
    pub summary_average: u32,
    pub memory_key: String,
}

impl Default for SteadyStateConfig {
    fn default() -> Self {
        Self {
            target_loss: None,
            batch_size: None,
            num_params: None,
            rtol: DEFAULT_RTOL,
            atol: None,
            mode: DetectionMode::default(),
            average: None,
            window_size: NonZeroUsize::new(DEFAULT_WINDOW_SIZE).unwrap_or(NonZeroUsize::MIN),
            stop_on_steady_state: true,
            steps_before_stop: DEFAULT_STEPS_BEFORE_STOP,
            utilization_key: DEFAULT_UTILIZATION_KEY.to_string(),
            speed_key: DEFAULT_SPEED_KEY.to_string(),
            summary_average: DEFAULT_SUMMARY_AVERAGE,
            memory_key: DEFAULT_MEMORY_KEY.to_string(),
        }
    }
}

impl SteadyStateConfig {
    /// Parses and validates a configuration from a JSON document.
    ///
    /// Missing fields take their default values.
    ///
    /// # Errors
    /// `InvalidConfig` on malformed JSON, an unknown detection mode or an invalid value.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads and validates a JSON configuration file.
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let json = fs::read_to_string(path).map_err(|e| {
            SteadyStateError::InvalidConfig(format!("cannot read {}: {e}", path.display()))
        })?;
        Self::from_json_str(&json)
    }

    /// Checks the numeric bounds that the type system doesn't.
    pub fn validate(&self) -> Result<()> {
        if !(self.rtol.is_finite() && self.rtol >= 0.0) {
            return invalid(format!("rtol must be a non-negative number, got {}", self.rtol));
        }

        if let Some(atol) = self.atol
            && !(atol.is_finite() && atol >= 0.0)
        {
            return invalid(format!("atol must be a non-negative number, got {atol}"));
        }

        if let Some(loss) = self.target_loss
            && !(loss.is_finite() && loss > 0.0)
        {
            return invalid(format!("target_loss must be a positive number, got {loss}"));
        }

        Ok(())
    }

    pub fn tolerance(&self) -> Tolerance {
        Tolerance::new(self.rtol, self.atol)
    }

    pub fn keys(&self) -> MetricKeys {
        MetricKeys::new(&*self.utilization_key, &*self.speed_key, self.average)
    }
}

fn invalid<T>(msg: String) -> Result<T> {
    Err(SteadyStateError::InvalidConfig(msg))
}
