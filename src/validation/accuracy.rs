use rand::Rng;
use rand_distr::{Distribution, Normal};
use serde::Serialize;
use tracing::debug;

use crate::algorithms::engine::LocalizationEngine;
use crate::algorithms::projection::great_circle_distance;
use crate::core::GeographicPoint;

/// Accuracy statistics over repeated noisy fixes
#[derive(Debug, Clone, Serialize)]
pub struct AccuracyStatistics {
    /// Mean horizontal error (meters)
    pub mean_error: f64,
    /// Standard deviation of the horizontal error (meters)
    pub std_dev_error: f64,
    /// Root mean square error (meters)
    pub rmse: f64,
    /// 95th percentile error (meters)
    pub error_95_percentile: f64,
    pub max_error: f64,
    pub min_error: f64,
    /// Fixes that produced an estimate
    pub sample_count: usize,
    /// Fixes rejected by the engine
    pub failures: usize,
    /// Fixes returned with `converged = false`
    pub unconverged: usize,
}

/// Monte-Carlo accuracy evaluation of the engine under Gaussian timing noise
pub struct AccuracyValidator<'a> {
    engine: &'a LocalizationEngine,
    signal_speed: f64,
}

impl<'a> AccuracyValidator<'a> {
    pub fn new(engine: &'a LocalizationEngine, signal_speed: f64) -> Self {
        Self { engine, signal_speed }
    }

    /// Simulate `trials` fixes of `source`, perturbing every arrival time
    /// with zero-mean Gaussian noise of `timing_sigma_s` seconds.
    ///
    /// Returns `None` if the noise parameter is invalid or no trial produced
    /// an estimate.
    pub fn simulate<R: Rng + ?Sized>(
        &self,
        receivers: &[GeographicPoint],
        source: &GeographicPoint,
        timing_sigma_s: f64,
        trials: usize,
        rng: &mut R,
    ) -> Option<AccuracyStatistics> {
        let noise = Normal::new(0.0, timing_sigma_s).ok()?;
        let true_arrivals: Vec<f64> = receivers
            .iter()
            .map(|r| great_circle_distance(r, source) / self.signal_speed)
            .collect();

        let mut errors = Vec::with_capacity(trials);
        let mut failures = 0;
        let mut unconverged = 0;

        for _ in 0..trials {
            let noisy: Vec<f64> = true_arrivals.iter().map(|t| t + noise.sample(rng)).collect();
            match self.engine.localize_arrivals(receivers, &noisy, self.signal_speed) {
                Ok(result) => {
                    if !result.converged {
                        unconverged += 1;
                    }
                    errors.push(great_circle_distance(&result.estimated_position, source));
                }
                Err(err) => {
                    debug!(error = %err, "simulated fix rejected");
                    failures += 1;
                }
            }
        }

        Self::statistics(errors, failures, unconverged)
    }

    fn statistics(mut errors: Vec<f64>, failures: usize, unconverged: usize) -> Option<AccuracyStatistics> {
        if errors.is_empty() {
            return None;
        }
        let n = errors.len() as f64;
        let mean_error = errors.iter().sum::<f64>() / n;
        let variance = errors.iter().map(|e| (e - mean_error).powi(2)).sum::<f64>() / n;
        let rmse = (errors.iter().map(|e| e * e).sum::<f64>() / n).sqrt();

        errors.sort_by(|a, b| a.total_cmp(b));
        let p95_index = ((errors.len() as f64 * 0.95).ceil() as usize).clamp(1, errors.len()) - 1;

        Some(AccuracyStatistics {
            mean_error,
            std_dev_error: variance.sqrt(),
            rmse,
            error_95_percentile: errors[p95_index],
            max_error: errors[errors.len() - 1],
            min_error: errors[0],
            sample_count: errors.len(),
            failures,
            unconverged,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::SPEED_OF_LIGHT;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn receivers() -> Vec<GeographicPoint> {
        vec![
            GeographicPoint::new(55.751244, 37.618423),
            GeographicPoint::new(55.759000, 37.618423),
            GeographicPoint::new(55.751244, 37.630000),
            GeographicPoint::new(55.759000, 37.630000),
        ]
    }

    #[test]
    fn test_error_grows_smoothly_with_noise() {
        let engine = LocalizationEngine::default();
        let validator = AccuracyValidator::new(&engine, SPEED_OF_LIGHT);
        let source = GeographicPoint::new(55.755, 37.625);
        let mut rng = StdRng::seed_from_u64(42);

        let quiet = validator.simulate(&receivers(), &source, 1e-10, 100, &mut rng).unwrap();
        let noisy = validator.simulate(&receivers(), &source, 1e-9, 100, &mut rng).unwrap();

        assert_eq!(quiet.failures, 0);
        assert_eq!(noisy.failures, 0);
        assert!(quiet.rmse < noisy.rmse);
        assert!(noisy.max_error < 20.0);
        assert!(noisy.min_error <= noisy.error_95_percentile && noisy.error_95_percentile <= noisy.max_error);
    }

    #[test]
    fn test_invalid_noise_is_rejected() {
        let engine = LocalizationEngine::default();
        let validator = AccuracyValidator::new(&engine, SPEED_OF_LIGHT);
        let mut rng = StdRng::seed_from_u64(1);
        let source = GeographicPoint::new(55.755, 37.625);
        assert!(validator.simulate(&receivers(), &source, -1.0, 10, &mut rng).is_none());
        assert!(validator.simulate(&receivers(), &source, 1e-9, 0, &mut rng).is_none());
    }

    #[test]
    fn test_statistics() {
        let stats = AccuracyValidator::statistics(vec![3.0, 1.0, 2.0, 4.0], 1, 0).unwrap();
        assert_eq!(stats.sample_count, 4);
        assert_eq!(stats.failures, 1);
        assert_eq!(stats.min_error, 1.0);
        assert_eq!(stats.max_error, 4.0);
        assert_eq!(stats.error_95_percentile, 4.0);
        assert!((stats.mean_error - 2.5).abs() < 1e-12);
    }
}
