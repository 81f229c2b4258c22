use std::{collections::BTreeMap, num::NonZeroUsize};

use super::{MetricSample, MovingWindow};

/// The moving windows watched by the coordinator: one per worker rank for GPU
/// utilization, created on first observation, and a single one for iteration speed.
#[derive(Debug, Clone)]
pub struct MetricWindows {
    capacity: NonZeroUsize,
    utilization: BTreeMap<usize, MovingWindow>,
    iteration_speed: MovingWindow,
}

impl MetricWindows {
    pub fn new(capacity: NonZeroUsize) -> Self {
        Self {
            capacity,
            utilization: BTreeMap::new(),
            iteration_speed: MovingWindow::new(capacity),
        }
    }

    pub fn push_utilization(&mut self, rank: usize, step: u64, value: f64) {
        let capacity = self.capacity;
        self.utilization
            .entry(rank)
            .or_insert_with(|| MovingWindow::new(capacity))
            .push(MetricSample::for_rank(step, rank, value));
    }

    pub fn push_iteration_speed(&mut self, step: u64, value: f64) {
        self.iteration_speed.push(MetricSample::new(step, value));
    }

    /// The per-rank utilization windows observed so far, ordered by rank.
    pub fn utilization(&self) -> impl Iterator<Item = (usize, &MovingWindow)> {
        self.utilization.iter().map(|(rank, w)| (*rank, w))
    }

    pub fn utilization_for(&self, rank: usize) -> Option<&MovingWindow> {
        self.utilization.get(&rank)
    }

    pub fn iteration_speed(&self) -> &MovingWindow {
        &self.iteration_speed
    }
}
