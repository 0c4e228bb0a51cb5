//! TDoA localization engine
//!
//! Composes the local projection, the residual model and the solver:
//! geographic receivers are projected into a frame centered on their mean
//! position, the planar problem is solved, and the estimate is projected
//! back. The engine holds only immutable configuration, so one instance can
//! serve concurrent callers.

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::algorithms::dop::DilutionOfPrecision;
use crate::algorithms::projection::LocalFrame;
use crate::algorithms::residual::ResidualModel;
use crate::algorithms::solver::{LevenbergMarquardt, SolverConfig};
use crate::core::{GeographicPoint, LocalizationResult, PlanarPoint, ReceiverObservation, MIN_RECEIVERS};
use crate::validation::{LocalizationError, ObservationValidator};

/// Engine configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Minimum receivers per fix, reference included (never below 3)
    pub min_receivers: usize,
    /// Turn `converged = false` into a `NonConvergence` error
    pub strict_convergence: bool,
    pub solver: SolverConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            min_receivers: MIN_RECEIVERS,
            strict_convergence: false,
            solver: SolverConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct LocalizationEngine {
    validator: ObservationValidator,
    solver: LevenbergMarquardt,
    strict_convergence: bool,
}

impl LocalizationEngine {
    pub fn new(config: EngineConfig) -> Self {
        Self {
            validator: ObservationValidator::new(config.min_receivers),
            solver: LevenbergMarquardt::new(config.solver),
            strict_convergence: config.strict_convergence,
        }
    }

    /// Locate the emitter from an ordered observation set (index 0 is the
    /// TDoA reference), starting from the receiver centroid.
    pub fn localize(&self, observations: &[ReceiverObservation]) -> Result<LocalizationResult, LocalizationError> {
        self.localize_from(observations, None)
    }

    /// Same as [`localize`](Self::localize) with an optional geographic
    /// starting point for the solver.
    pub fn localize_from(
        &self,
        observations: &[ReceiverObservation],
        initial_guess: Option<GeographicPoint>,
    ) -> Result<LocalizationResult, LocalizationError> {
        self.validator.validate(observations)?;

        let positions: Vec<GeographicPoint> = observations.iter().map(|o| o.position).collect();
        let frame = LocalFrame::centered_on(&positions)?;
        let planar: Vec<PlanarPoint> = positions.iter().map(|p| frame.forward(p)).collect();

        let range_differences: Vec<f64> = observations[1..].iter().map(|o| o.range_difference).collect();
        let model = ResidualModel::new(planar[0], &planar[1..], &range_differences)?;

        let start = match initial_guess {
            Some(guess) if guess.is_valid() => Some(frame.forward(&guess)),
            Some(guess) => {
                warn!(?guess, "ignoring invalid initial guess, starting from receiver centroid");
                None
            }
            None => None,
        };

        let outcome = self.solver.solve(&model, start).map_err(|err| {
            debug!(error = %err, receivers = observations.len(), "solver rejected receiver geometry");
            err
        })?;

        let estimated_position = frame.inverse(&outcome.position)?;
        debug!(
            origin = ?frame.origin(),
            x = outcome.position.x,
            y = outcome.position.y,
            residual_norm = outcome.residual_norm,
            iterations = outcome.iterations,
            converged = outcome.converged,
            "localization solved"
        );

        if !outcome.converged {
            warn!(
                iterations = outcome.iterations,
                residual_norm = outcome.residual_norm,
                "solver stopped before convergence"
            );
            if self.strict_convergence {
                return Err(LocalizationError::NonConvergence {
                    iterations: outcome.iterations,
                    residual_norm: outcome.residual_norm,
                });
            }
        }

        Ok(LocalizationResult {
            estimated_position,
            residual_norm: outcome.residual_norm,
            converged: outcome.converged,
            iterations: outcome.iterations,
            predicted_range_differences: model.predicted(&outcome.position),
            hdop: DilutionOfPrecision::at(&model, &outcome.position).map(|dop| dop.hdop),
        })
    }

    /// Locate the emitter from raw arrival times (seconds, any common epoch)
    /// and a propagation speed (m/s). Receiver 0 is the reference.
    pub fn localize_arrivals(
        &self,
        positions: &[GeographicPoint],
        arrival_times_s: &[f64],
        signal_speed: f64,
    ) -> Result<LocalizationResult, LocalizationError> {
        self.validator.validate_arrivals(positions.len(), arrival_times_s)?;
        let observations = observations_from_arrivals(positions, arrival_times_s, signal_speed);
        self.localize(&observations)
    }
}

/// `speed × (t_i − t_0)` for every receiver; the reference yields 0
pub fn range_differences_from_arrivals(arrival_times_s: &[f64], signal_speed: f64) -> Vec<f64> {
    match arrival_times_s.first() {
        Some(&reference) => arrival_times_s.iter().map(|t| signal_speed * (t - reference)).collect(),
        None => Vec::new(),
    }
}

/// Pair receiver positions with range differences derived from arrival times
pub fn observations_from_arrivals(
    positions: &[GeographicPoint],
    arrival_times_s: &[f64],
    signal_speed: f64,
) -> Vec<ReceiverObservation> {
    positions
        .iter()
        .zip(range_differences_from_arrivals(arrival_times_s, signal_speed))
        .map(|(position, range_difference)| ReceiverObservation::new(*position, range_difference))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algorithms::projection::great_circle_distance;
    use crate::core::SPEED_OF_LIGHT;
    use approx::assert_abs_diff_eq;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use rand_distr::{Distribution, Normal};

    fn moscow_receivers() -> Vec<GeographicPoint> {
        vec![
            GeographicPoint::new(55.751244, 37.618423),
            GeographicPoint::new(55.759000, 37.618423),
            GeographicPoint::new(55.751244, 37.630000),
        ]
    }

    fn exact_observations(receivers: &[GeographicPoint], source: &GeographicPoint) -> Vec<ReceiverObservation> {
        let arrivals: Vec<f64> = receivers.iter().map(|r| great_circle_distance(r, source) / SPEED_OF_LIGHT).collect();
        observations_from_arrivals(receivers, &arrivals, SPEED_OF_LIGHT)
    }

    #[test]
    fn test_moscow_scenario() {
        let engine = LocalizationEngine::default();
        let source = GeographicPoint::new(55.755, 37.625);
        let result = engine.localize(&exact_observations(&moscow_receivers(), &source)).unwrap();

        assert!(result.converged);
        assert!(great_circle_distance(&result.estimated_position, &source) < 1.0);
        assert!(result.residual_norm < 1e-3);
        assert_eq!(result.predicted_range_differences.len(), 2);
        assert!(result.hdop.is_some());
    }

    #[test]
    fn test_zero_noise_recovery_with_more_receivers() {
        let receivers = vec![
            GeographicPoint::new(48.8566, 2.3522),
            GeographicPoint::new(48.8650, 2.3400),
            GeographicPoint::new(48.8480, 2.3700),
            GeographicPoint::new(48.8700, 2.3650),
            GeographicPoint::new(48.8500, 2.3350),
        ];
        let source = GeographicPoint::new(48.8600, 2.3550);
        let result = LocalizationEngine::default().localize(&exact_observations(&receivers, &source)).unwrap();

        assert!(result.converged);
        assert!(great_circle_distance(&result.estimated_position, &source) < 0.1);
    }

    #[test]
    fn test_insufficient_receivers() {
        let receivers = &moscow_receivers()[..2];
        let source = GeographicPoint::new(55.755, 37.625);
        let err = LocalizationEngine::default().localize(&exact_observations(receivers, &source)).unwrap_err();
        assert_eq!(err, LocalizationError::InsufficientReceivers { available: 2, required: 3 });
    }

    #[test]
    fn test_collinear_receivers_are_flagged() {
        // Same meridian: the projected receivers share x = 0
        let receivers = vec![
            GeographicPoint::new(55.750, 37.620),
            GeographicPoint::new(55.755, 37.620),
            GeographicPoint::new(55.760, 37.620),
        ];
        let source = GeographicPoint::new(55.756, 37.628);
        let err = LocalizationEngine::default()
            .localize(&exact_observations(&receivers, &source))
            .unwrap_err();
        assert!(matches!(err, LocalizationError::SingularJacobian { .. }), "unexpected error: {err}");
    }

    #[test]
    fn test_diagonal_receivers_are_flagged() {
        // Evenly spaced in lat/lon: the middle receiver sits centimeters off
        // the line in the local frame, so the mirror fix is equally plausible
        let receivers = vec![
            GeographicPoint::new(55.750, 37.600),
            GeographicPoint::new(55.755, 37.610),
            GeographicPoint::new(55.760, 37.620),
        ];
        let source = GeographicPoint::new(55.758, 37.604);
        let err = LocalizationEngine::default()
            .localize(&exact_observations(&receivers, &source))
            .unwrap_err();
        assert!(matches!(err, LocalizationError::SingularJacobian { iterations: 0, .. }));
    }

    #[test]
    fn test_collinear_with_initial_guess_is_flagged() {
        let receivers = vec![
            GeographicPoint::new(55.750, 37.620),
            GeographicPoint::new(55.755, 37.620),
            GeographicPoint::new(55.760, 37.620),
        ];
        let source = GeographicPoint::new(55.756, 37.628);
        let result = LocalizationEngine::default().localize_from(&exact_observations(&receivers, &source), Some(source));
        assert!(matches!(result, Err(LocalizationError::SingularJacobian { .. })));
    }

    #[test]
    fn test_noise_robustness() {
        let receivers = moscow_receivers();
        let source = GeographicPoint::new(55.755, 37.625);
        let engine = LocalizationEngine::default();
        let mut rng = StdRng::seed_from_u64(7);
        let noise = Normal::new(0.0, 1e-9).unwrap();

        for _ in 0..50 {
            let arrivals: Vec<f64> = receivers
                .iter()
                .map(|r| great_circle_distance(r, &source) / SPEED_OF_LIGHT + noise.sample(&mut rng))
                .collect();
            let result = engine.localize_arrivals(&receivers, &arrivals, SPEED_OF_LIGHT).unwrap();
            let error = great_circle_distance(&result.estimated_position, &source);
            assert!(error < 20.0, "error {error} m exceeds bound");
        }
    }

    #[test]
    fn test_reference_invariance() {
        let receivers = vec![
            GeographicPoint::new(55.751244, 37.618423),
            GeographicPoint::new(55.759000, 37.618423),
            GeographicPoint::new(55.751244, 37.630000),
            GeographicPoint::new(55.758000, 37.632000),
        ];
        let source = GeographicPoint::new(55.755, 37.625);
        let observations = exact_observations(&receivers, &source);

        let mut permuted = observations.clone();
        permuted[1..].reverse();

        let engine = LocalizationEngine::default();
        let a = engine.localize(&observations).unwrap();
        let b = engine.localize(&permuted).unwrap();
        assert_abs_diff_eq!(a.estimated_position.latitude, b.estimated_position.latitude, epsilon = 1e-8);
        assert_abs_diff_eq!(a.estimated_position.longitude, b.estimated_position.longitude, epsilon = 1e-8);
    }

    #[test]
    fn test_initial_guess_is_used() {
        let source = GeographicPoint::new(55.755, 37.625);
        let observations = exact_observations(&moscow_receivers(), &source);
        let engine = LocalizationEngine::default();

        let from_source = engine.localize_from(&observations, Some(source)).unwrap();
        assert!(from_source.converged);
        assert!(from_source.iterations <= 5);

        // Invalid guesses fall back to the centroid
        let fallback = engine.localize_from(&observations, Some(GeographicPoint::new(120.0, 0.0))).unwrap();
        assert!(great_circle_distance(&fallback.estimated_position, &source) < 1.0);
    }

    #[test]
    fn test_strict_convergence() {
        let config = EngineConfig {
            strict_convergence: true,
            solver: SolverConfig { max_iterations: 1, ..SolverConfig::default() },
            ..EngineConfig::default()
        };
        let source = GeographicPoint::new(55.755, 37.625);
        let observations = exact_observations(&moscow_receivers(), &source);

        let err = LocalizationEngine::new(config).localize(&observations).unwrap_err();
        assert!(matches!(err, LocalizationError::NonConvergence { iterations: 1, .. }));
    }

    #[test]
    fn test_range_differences_from_arrivals() {
        let deltas = range_differences_from_arrivals(&[10.0, 10.000001, 9.999999], SPEED_OF_LIGHT);
        assert_eq!(deltas[0], 0.0);
        assert_abs_diff_eq!(deltas[1], 299.792458, epsilon = 1e-6);
        assert_abs_diff_eq!(deltas[2], -299.792458, epsilon = 1e-6);
        assert!(range_differences_from_arrivals(&[], SPEED_OF_LIGHT).is_empty());
    }

    #[test]
    fn test_arrival_count_mismatch() {
        let err = LocalizationEngine::default()
            .localize_arrivals(&moscow_receivers(), &[0.0, 1e-6], SPEED_OF_LIGHT)
            .unwrap_err();
        assert!(matches!(err, LocalizationError::MeasurementCountMismatch { .. }));
    }

    #[test]
    fn test_concurrent_calls() {
        let engine = LocalizationEngine::default();
        let source = GeographicPoint::new(55.755, 37.625);
        let observations = exact_observations(&moscow_receivers(), &source);
        let expected = engine.localize(&observations).unwrap();

        std::thread::scope(|scope| {
            let handles: Vec<_> = (0..4).map(|_| scope.spawn(|| engine.localize(&observations).unwrap())).collect();
            for handle in handles {
                assert_eq!(handle.join().unwrap(), expected);
            }
        });
    }
}
