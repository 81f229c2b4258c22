mod context;
mod controller;
mod decision;
mod state;

pub use context::{BatchSize, ModelSummary, StepContext};
pub use controller::{COORDINATOR_RANK, SteadyStateController};
pub use decision::{HaltSummary, StepDecision};
