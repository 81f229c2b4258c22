mod metric_windows;
mod moving_window;

pub use metric_windows::MetricWindows;
pub use moving_window::{MetricSample, MovingWindow};
