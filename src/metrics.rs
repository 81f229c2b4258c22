//! Metrics-bus snapshot consumed on every step, and the naming of the keys read from it.

use std::collections::HashMap;

/// Key under which the steady-state latch is published (0/1) on every step.
pub const STEADY_STATE_ACHIEVED: &str = "steady_state_achieved";

/// Key under which the estimated total training time (hours) is published.
pub const ESTIMATED_TOTAL_TIME: &str = "estimated_total_time";

/// The scalar metrics published on the bus for the current step.
#[derive(Debug, Clone, Default)]
pub struct StepMetrics {
    values: HashMap<String, f64>,
}

impl StepMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl Into<String>, value: f64) {
        self.values.insert(key.into(), value);
    }

    pub fn get(&self, key: &str) -> Option<f64> {
        self.values.get(key).copied()
    }
}

impl<K: Into<String>> FromIterator<(K, f64)> for StepMetrics {
    fn from_iter<T: IntoIterator<Item = (K, f64)>>(iter: T) -> Self {
        Self {
            values: iter.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        }
    }
}

/// Builds the metric keys the controller reads.
///
/// Keys follow `{utilization}_rank{i}[_averaged{N}]` and `{speed}[_averaged{N}]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetricKeys {
    utilization: String,
    speed: String,
    average: Option<u32>,
}

impl MetricKeys {
    /// Creates a new `MetricKeys`.
    ///
    /// # Args
    /// * `utilization` - Base name of the per-rank GPU utilization metric.
    /// * `speed` - Base name of the seconds-per-iteration metric.
    /// * `average` - Moving-average suffix of the ingested metrics, if any.
    pub fn new(utilization: impl Into<String>, speed: impl Into<String>, average: Option<u32>) -> Self {
        Self {
            utilization: utilization.into(),
            speed: speed.into(),
            average,
        }
    }

    pub fn utilization(&self, rank: usize) -> String {
        self.utilization_averaged(rank, self.average)
    }

    pub fn speed(&self) -> String {
        self.speed_averaged(self.average)
    }

    pub fn utilization_averaged(&self, rank: usize, average: Option<u32>) -> String {
        with_average(format!("{}_rank{rank}", self.utilization), average)
    }

    pub fn speed_averaged(&self, average: Option<u32>) -> String {
        with_average(self.speed.clone(), average)
    }
}

fn with_average(mut key: String, average: Option<u32>) -> String {
    if let Some(n) = average {
        key.push_str(&format!("_averaged{n}"));
    }
    key
}
