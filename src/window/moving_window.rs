use std::{collections::VecDeque, num::NonZeroUsize};

/// A scalar metric value observed at a given training step.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MetricSample {
    pub step: u64,
    /// The producing worker, only set for per-rank streams.
    pub rank: Option<usize>,
    pub value: f64,
}

impl MetricSample {
    pub fn new(step: u64, value: f64) -> Self {
        Self {
            step,
            rank: None,
            value,
        }
    }

    pub fn for_rank(step: u64, rank: usize, value: f64) -> Self {
        Self {
            step,
            rank: Some(rank),
            value,
        }
    }
}

/// Fixed-capacity FIFO of the most recent samples of one metric stream.
#[derive(Debug, Clone)]
pub struct MovingWindow {
    samples: VecDeque<MetricSample>,
    capacity: NonZeroUsize,
}

impl MovingWindow {
    /// Creates a new, empty `MovingWindow`.
    ///
    /// # Args
    /// * `capacity` - The maximum amount of samples kept.
    ///
    /// # Returns
    /// A new `MovingWindow` instance.
    pub fn new(capacity: NonZeroUsize) -> Self {
        Self {
            samples: VecDeque::with_capacity(capacity.get() + 1),
            capacity,
        }
    }

    /// Appends `sample`, evicting the oldest one if the window overflows.
    pub fn push(&mut self, sample: MetricSample) {
        self.samples.push_back(sample);

        if self.samples.len() > self.capacity.get() {
            self.samples.pop_front();
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity.get()
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.samples.len() == self.capacity.get()
    }

    /// Iterates the window samples, oldest first.
    pub fn samples(&self) -> impl Iterator<Item = &MetricSample> {
        self.samples.iter()
    }

    /// Iterates the window values, oldest first.
    pub fn values(&self) -> impl Iterator<Item = f64> + '_ {
        self.samples.iter().map(|s| s.value)
    }

    /// The moving average over the current window, `None` while empty.
    pub fn mean(&self) -> Option<f64> {
        if self.samples.is_empty() {
            return None;
        }

        Some(self.values().sum::<f64>() / self.samples.len() as f64)
    }
}
