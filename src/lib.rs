//! Training-loop instrumentation for distributed training: detects when per-step
//! timing or GPU utilization has settled, estimates the training time left to a
//! target loss, and agrees across all processes on stopping the run.

pub mod collective;
pub mod config;
pub mod controller;
pub mod detection;
pub mod error;
pub mod estimation;
pub mod metrics;
pub mod window;

pub use collective::{Collective, LocalGroup, Solo, StarCollective};
pub use config::SteadyStateConfig;
pub use controller::{StepContext, StepDecision, SteadyStateController};
pub use detection::DetectionMode;
pub use error::{Result, SteadyStateError};
pub use metrics::StepMetrics;
