//! Closed-form training-time estimates.

use crate::error::{Result, SteadyStateError};

/// Solves the Chinchilla scaling law for the amount of training samples needed to
/// reach `target_loss` with a model of `num_params` parameters:
///
/// `D = (410 / (L - 1.69 - 406.4 / N^0.34)) ^ (1 / 0.27)`, rounded up.
///
/// # Errors
/// `MissingParameterCount` if `num_params` is unknown, `UnreachableLoss` if the
/// denominator is not positive (the target is at or below the irreducible loss for
/// this model size), `SampleCountOverflow` if the count exceeds `u64::MAX`.
pub fn required_samples(target_loss: f64, num_params: Option<u64>) -> Result<u64> {
    let num_params = num_params.ok_or(SteadyStateError::MissingParameterCount)?;

    let denom = target_loss - 1.69 - 406.4 / (num_params as f64).powf(0.34);
    let samples = (410.0 / denom).powf(1.0 / 0.27).ceil();

    if !(denom > 0.0 && samples.is_finite()) {
        return Err(SteadyStateError::UnreachableLoss {
            target_loss,
            num_params,
        });
    }

    if samples >= u64::MAX as f64 {
        return Err(SteadyStateError::SampleCountOverflow {
            target_loss,
            samples,
        });
    }

    Ok(samples as u64)
}

/// Wall-clock hours needed to process `remaining_samples` spread over `num_workers`
/// workers, each stepping `batch_size` samples every `seconds_per_batch` seconds.
pub fn estimated_hours_remaining(
    remaining_samples: u64,
    num_workers: usize,
    batch_size: usize,
    seconds_per_batch: f64,
) -> f64 {
    let samples_per_worker = remaining_samples as f64 / num_workers as f64;
    let batches = samples_per_worker / batch_size as f64;
    seconds_per_batch * batches / 60.0 / 60.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hours_remaining() {
        assert_eq!(estimated_hours_remaining(0, 1, 1, 1.0), 0.0);
        assert_eq!(estimated_hours_remaining(1, 1, 1, 0.0), 0.0);
        assert_eq!(estimated_hours_remaining(3600, 1, 1, 1.0), 1.0);
        assert_eq!(estimated_hours_remaining(3600, 1, 1, 2.0), 2.0);
        assert_eq!(estimated_hours_remaining(3600, 1, 2, 1.0), 0.5);
        assert_eq!(estimated_hours_remaining(3600, 2, 1, 1.0), 0.5);
    }

    #[test]
    fn required_samples_needs_param_count() {
        assert!(matches!(
            required_samples(2.5, None),
            Err(SteadyStateError::MissingParameterCount)
        ));
    }

    #[test]
    fn required_samples_for_a_billion_params() {
        let samples = required_samples(2.5, Some(1_000_000_000)).unwrap();
        // ~8.708e10 samples
        assert!((87_000_000_000..87_200_000_000).contains(&samples), "{samples}");
    }

    #[test]
    fn lower_loss_needs_more_samples() {
        let n = Some(125_000_000);
        let loose = required_samples(3.5, n).unwrap();
        let tight = required_samples(3.0, n).unwrap();
        assert!(tight > loose);
    }

    #[test]
    fn loss_below_the_model_floor_is_unreachable() {
        assert!(matches!(
            required_samples(2.0, Some(1_000_000_000)),
            Err(SteadyStateError::UnreachableLoss { .. })
        ));
    }

    #[test]
    fn loss_just_above_the_floor_overflows() {
        let floor = 1.69 + 406.4 / 1e9_f64.powf(0.34);
        // ~6.1e20 samples, past u64::MAX.
        assert!(matches!(
            required_samples(floor + 1e-3, Some(1_000_000_000)),
            Err(SteadyStateError::SampleCountOverflow { .. })
        ));
    }

    #[test]
    fn zero_params_is_unreachable() {
        assert!(matches!(
            required_samples(3.0, Some(0)),
            Err(SteadyStateError::UnreachableLoss { num_params: 0, .. })
        ));
    }
}
