/// Relative and absolute bounds two metric values must satisfy to be considered equal.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Tolerance {
    rtol: f64,
    atol: Option<f64>,
}

impl Tolerance {
    /// Creates a new `Tolerance`.
    ///
    /// # Args
    /// * `rtol` - Relative tolerance, scaled by the reference value.
    /// * `atol` - Optional absolute tolerance, `None` disables the absolute check.
    ///
    /// # Returns
    /// A new `Tolerance` instance.
    pub const fn new(rtol: f64, atol: Option<f64>) -> Self {
        Self { rtol, atol }
    }

    pub fn rtol(&self) -> f64 {
        self.rtol
    }

    pub fn atol(&self) -> Option<f64> {
        self.atol
    }

    /// Checks `value` against `reference` under both bounds.
    ///
    /// The relative bound is scaled by `reference`, so the argument order matters.
    pub fn within(&self, value: f64, reference: f64) -> bool {
        within_tolerance(value, reference, self.rtol, self.atol)
    }
}

/// Returns whether `a` lies within tolerance of `b`.
///
/// The absolute check passes when `atol` is unset or `|a - b| <= atol`. The relative
/// check passes when `|a - b| <= rtol * b`. Both must pass.
///
/// # Args
/// * `a` - The compared value.
/// * `b` - The reference value, the relative bound is scaled by it.
/// * `rtol` - Relative tolerance.
/// * `atol` - Optional absolute tolerance.
pub fn within_tolerance(a: f64, b: f64, rtol: f64, atol: Option<f64>) -> bool {
    within_atol(a, b, atol) && within_rtol(a, b, rtol)
}

fn within_atol(a: f64, b: f64, atol: Option<f64>) -> bool {
    atol.is_none_or(|atol| (a - b).abs() <= atol)
}

fn within_rtol(a: f64, b: f64, rtol: f64) -> bool {
    (a - b).abs() <= rtol * b
}
