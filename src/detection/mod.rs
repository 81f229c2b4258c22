mod evaluator;
mod mode;
mod tolerance;

pub use evaluator::is_steady_state;
pub use mode::{DetectionMode, Strategy};
pub use tolerance::{Tolerance, within_tolerance};
