use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use super::{Tolerance, is_steady_state};
use crate::{error::SteadyStateError, window::MetricWindows};

/// Convergence test over the coordinator's metric windows.
pub type Strategy = fn(&MetricWindows, Tolerance) -> bool;

/// The metric stream steady state is detected on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DetectionMode {
    /// Seconds per training iteration, a single global stream.
    #[default]
    IterSpeed,
    /// GPU utilization, one stream per worker rank.
    Utilization,
}

impl DetectionMode {
    /// Resolves the convergence test for this mode.
    pub fn strategy(self) -> Strategy {
        match self {
            Self::IterSpeed => iteration_speed_is_steady,
            Self::Utilization => utilization_is_steady,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::IterSpeed => "iter_speed",
            Self::Utilization => "utilization",
        }
    }
}

impl fmt::Display for DetectionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DetectionMode {
    type Err = SteadyStateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "iter_speed" => Ok(Self::IterSpeed),
            "utilization" => Ok(Self::Utilization),
            other => Err(SteadyStateError::InvalidConfig(format!(
                "detection mode must be either 'utilization' or 'iter_speed', not '{other}'"
            ))),
        }
    }
}

fn iteration_speed_is_steady(windows: &MetricWindows, tol: Tolerance) -> bool {
    let window = windows.iteration_speed();
    window.is_full() && is_steady_state(window.values(), tol.rtol(), tol.atol())
}

/// Every observed rank must have a full, converged window. No observed rank is not steady.
fn utilization_is_steady(windows: &MetricWindows, tol: Tolerance) -> bool {
    let mut observed = false;

    for (_, window) in windows.utilization() {
        observed = true;
        if !window.is_full() || !is_steady_state(window.values(), tol.rtol(), tol.atol()) {
            return false;
        }
    }

    observed
}
