use super::Tolerance;

/// Decides whether a window of samples has converged.
///
/// The spread above the mean (`max` against `mean`) and below it (`mean` against `min`)
/// must each lie within tolerance. An empty window is never steady.
///
/// # Args
/// * `samples` - The window contents, oldest first.
/// * `rtol` - Relative tolerance.
/// * `atol` - Optional absolute tolerance.
///
/// # Returns
/// `true` if the window is within tolerance of its mean on both sides.
pub fn is_steady_state<I>(samples: I, rtol: f64, atol: Option<f64>) -> bool
where
    I: IntoIterator<Item = f64>,
{
    let Some(stats) = Spread::of(samples) else {
        return false;
    };

    let tol = Tolerance::new(rtol, atol);
    let mean = stats.mean();
    tol.within(stats.max, mean) && tol.within(mean, stats.min)
}

struct Spread {
    sum: f64,
    count: usize,
    min: f64,
    max: f64,
}

impl Spread {
    fn of<I>(samples: I) -> Option<Self>
    where
        I: IntoIterator<Item = f64>,
    {
        let mut iter = samples.into_iter();
        let first = iter.next()?;

        let init = Self {
            sum: first,
            count: 1,
            min: first,
            max: first,
        };

        Some(iter.fold(init, |acc, x| Self {
            sum: acc.sum + x,
            count: acc.count + 1,
            min: acc.min.min(x),
            max: acc.max.max(x),
        }))
    }

    fn mean(&self) -> f64 {
        self.sum / self.count as f64
    }
}
