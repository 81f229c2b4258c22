/// Source of the model's trainable parameter count.
pub trait ModelSummary {
    fn trainable_parameters(&self) -> u64;
}

/// A parameter count known up front.
impl ModelSummary for u64 {
    fn trainable_parameters(&self) -> u64 {
        *self
    }
}

/// Extracts the amount of samples in a raw training batch.
pub trait BatchSize {
    fn batch_size(&self) -> usize;
}

impl<T> BatchSize for Vec<T> {
    fn batch_size(&self) -> usize {
        self.len()
    }
}

impl<T, const N: usize> BatchSize for [T; N] {
    fn batch_size(&self) -> usize {
        N
    }
}

/// A batch only described by its size.
impl BatchSize for usize {
    fn batch_size(&self) -> usize {
        *self
    }
}

/// What the training loop knows about the step that just ended.
pub struct StepContext<'a> {
    /// Optimizer steps completed so far.
    pub global_step: u64,
    pub num_nodes: usize,
    pub model: &'a (dyn ModelSummary + Sync),
    pub batch: &'a (dyn BatchSize + Sync),
}

impl<'a> StepContext<'a> {
    pub fn new(
        global_step: u64,
        model: &'a (dyn ModelSummary + Sync),
        batch: &'a (dyn BatchSize + Sync),
    ) -> Self {
        Self {
            global_step,
            num_nodes: 1,
            model,
            batch,
        }
    }

    pub fn with_num_nodes(mut self, num_nodes: usize) -> Self {
        self.num_nodes = num_nodes;
        self
    }
}
