//! Levenberg-Marquardt solver for the planar TDoA problem
//!
//! Damping follows Nielsen's gain-ratio update: accepted steps shrink the
//! damping by `max(1/3, 1 − (2ρ − 1)^3)`, rejected steps grow it
//! geometrically. With only two unknowns the normal equations are solved
//! directly as a 2x2 system.

use nalgebra::{Matrix2, Vector2};
use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::algorithms::residual::ResidualModel;
use crate::core::PlanarPoint;
use crate::validation::LocalizationError;

/// Solver tolerances and limits
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SolverConfig {
    /// Maximum number of iterations before giving up with `converged = false`
    pub max_iterations: usize,
    /// Converged when the infinity norm of `Jᵀr` falls below this
    pub gradient_tolerance: f64,
    /// Converged when `‖h‖ <= step_tolerance * (‖x‖ + step_tolerance)`
    pub step_tolerance: f64,
    /// Converged when an accepted step lowers the cost by less than this fraction
    pub cost_tolerance: f64,
    /// Converged when the residual norm drops below this (meters)
    pub residual_tolerance: f64,
    /// Jacobian is rank-deficient when `σ_min / σ_max` is below this
    pub rank_tolerance: f64,
    /// Receivers are treated as collinear when the `σ_min / σ_max` ratio of
    /// their centered planar positions is below this
    pub collinearity_tolerance: f64,
    /// Consecutive rank-deficient iterations tolerated before failing
    pub max_singular_iterations: usize,
    /// Initial damping relative to the largest diagonal entry of `JᵀJ`
    pub initial_damping: f64,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            max_iterations: 100,
            gradient_tolerance: 1e-10,
            step_tolerance: 1e-10,
            cost_tolerance: 1e-12,
            residual_tolerance: 1e-9,
            rank_tolerance: 1e-6,
            collinearity_tolerance: 1e-3,
            max_singular_iterations: 3,
            initial_damping: 1e-3,
        }
    }
}

/// Result of a solver run
#[derive(Debug, Clone, PartialEq)]
pub struct SolverOutcome {
    pub position: PlanarPoint,
    pub residual_norm: f64,
    pub converged: bool,
    pub iterations: usize,
}

/// Levenberg-Marquardt minimizer of `½‖r(x)‖²`
#[derive(Debug, Clone, Default)]
pub struct LevenbergMarquardt {
    config: SolverConfig,
}

impl LevenbergMarquardt {
    pub fn new(config: SolverConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &SolverConfig {
        &self.config
    }

    /// Minimize the model residuals starting from `initial_guess`, or from
    /// the receiver centroid when none is given.
    ///
    /// Fails with `SingularJacobian` before iterating when the receivers are
    /// (nearly) collinear: such layouts admit a mirror solution on the other
    /// side of the line that the local Jacobian cannot tell apart.
    pub fn solve(
        &self,
        model: &ResidualModel,
        initial_guess: Option<PlanarPoint>,
    ) -> Result<SolverOutcome, LocalizationError> {
        let spread = receiver_spread_ratio(model);
        if spread < self.config.collinearity_tolerance {
            trace!(ratio = spread, "receivers are collinear");
            return Err(LocalizationError::SingularJacobian { iterations: 0, ratio: spread });
        }

        let start = initial_guess
            .or_else(|| PlanarPoint::centroid(&model.receiver_positions()))
            .unwrap_or_default();

        let mut x = start.to_vector2();
        let mut residuals = model.evaluate(&start);
        let mut cost = 0.5 * residuals.norm_squared();

        let mut lambda: Option<f64> = None;
        let mut nu = 2.0;
        let mut singular_run = 0;
        let mut converged = false;
        let mut iterations = 0;

        while iterations < self.config.max_iterations {
            iterations += 1;

            let current = PlanarPoint::from_vector2(&x);
            let jacobian = model.jacobian(&current);
            let jtj: Matrix2<f64> = jacobian.tr_mul(&jacobian);
            let gradient: Vector2<f64> = jacobian.tr_mul(&residuals);

            let ratio = singular_value_ratio(&jtj);
            let singular = ratio < self.config.rank_tolerance;
            if singular {
                singular_run += 1;
                trace!(iteration = iterations, ratio, "rank-deficient jacobian");
                if singular_run >= self.config.max_singular_iterations {
                    return Err(LocalizationError::SingularJacobian { iterations: singular_run, ratio });
                }
            } else {
                singular_run = 0;
                if residuals.norm() <= self.config.residual_tolerance
                    || gradient.amax() <= self.config.gradient_tolerance
                {
                    converged = true;
                    break;
                }
            }

            let damping = *lambda.get_or_insert_with(|| {
                self.config.initial_damping * jtj[(0, 0)].max(jtj[(1, 1)]).max(f64::MIN_POSITIVE)
            });

            let augmented = jtj + Matrix2::identity() * damping;
            let step = match augmented.cholesky() {
                Some(chol) => chol.solve(&(-gradient)),
                None => {
                    lambda = Some(damping * nu);
                    nu *= 2.0;
                    continue;
                }
            };

            if !singular && step.norm() <= self.config.step_tolerance * (x.norm() + self.config.step_tolerance) {
                converged = true;
                break;
            }

            let candidate = x + step;
            let candidate_residuals = model.evaluate(&PlanarPoint::from_vector2(&candidate));
            let candidate_cost = 0.5 * candidate_residuals.norm_squared();

            let predicted_reduction = 0.5 * step.dot(&(step * damping - gradient));
            let gain = if predicted_reduction > 0.0 {
                (cost - candidate_cost) / predicted_reduction
            } else {
                -1.0
            };

            trace!(
                iteration = iterations,
                cost,
                candidate_cost,
                damping,
                gain,
                "levenberg-marquardt step"
            );

            if gain > 0.0 {
                let reduction = cost - candidate_cost;
                x = candidate;
                residuals = candidate_residuals;
                let previous_cost = cost;
                cost = candidate_cost;
                lambda = Some(damping * (1.0_f64 / 3.0).max(1.0 - (2.0 * gain - 1.0).powi(3)));
                nu = 2.0;

                if !singular && reduction <= self.config.cost_tolerance * previous_cost {
                    converged = true;
                    break;
                }
            } else {
                lambda = Some(damping * nu);
                nu *= 2.0;
            }

            if !damping.is_finite() {
                break;
            }
        }

        Ok(SolverOutcome {
            position: PlanarPoint::from_vector2(&x),
            residual_norm: residuals.norm(),
            converged,
            iterations,
        })
    }
}

/// `σ_min / σ_max` of the centered receiver positions
fn receiver_spread_ratio(model: &ResidualModel) -> f64 {
    let positions = model.receiver_positions();
    let Some(center) = PlanarPoint::centroid(&positions) else {
        return 0.0;
    };
    let center = center.to_vector2();
    let scatter = positions
        .iter()
        .map(|p| p.to_vector2() - center)
        .fold(Matrix2::<f64>::zeros(), |acc, d| acc + d * d.transpose());
    singular_value_ratio(&scatter)
}

/// `σ_min / σ_max` of the Jacobian, from the eigenvalues of `JᵀJ`
fn singular_value_ratio(jtj: &Matrix2<f64>) -> f64 {
    let eigenvalues = jtj.symmetric_eigenvalues();
    let max = eigenvalues.max();
    let min = eigenvalues.min().max(0.0);
    if max <= 0.0 || !max.is_finite() {
        0.0
    } else {
        (min / max).sqrt()
    }
}
