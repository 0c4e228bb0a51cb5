use nalgebra::{DVector, MatrixXx2, Vector2};

use crate::core::PlanarPoint;
use crate::validation::LocalizationError;

/// Range-difference measurement model in a local planar frame.
///
/// Residual `i` (for every non-reference receiver) is
/// `‖c − r_i‖ − ‖c − r_0‖ − Δ_i`.
#[derive(Debug, Clone)]
pub struct ResidualModel {
    reference: Vector2<f64>,
    receivers: Vec<Vector2<f64>>,
    range_differences: Vec<f64>,
}

impl ResidualModel {
    /// Build the model from the reference position, the remaining receiver
    /// positions and their measured range differences (same order).
    pub fn new(
        reference: PlanarPoint,
        receivers: &[PlanarPoint],
        range_differences: &[f64],
    ) -> Result<Self, LocalizationError> {
        if receivers.len() != range_differences.len() {
            return Err(LocalizationError::MeasurementCountMismatch {
                receivers: receivers.len() + 1,
                measurements: range_differences.len() + 1,
            });
        }
        Ok(Self {
            reference: reference.to_vector2(),
            receivers: receivers.iter().map(PlanarPoint::to_vector2).collect(),
            range_differences: range_differences.to_vec(),
        })
    }

    /// Number of residuals (receivers minus the reference)
    pub fn len(&self) -> usize {
        self.receivers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.receivers.is_empty()
    }

    /// Every receiver position, reference first
    pub fn receiver_positions(&self) -> Vec<PlanarPoint> {
        std::iter::once(&self.reference)
            .chain(self.receivers.iter())
            .map(PlanarPoint::from_vector2)
            .collect()
    }

    /// Model range differences `‖c − r_i‖ − ‖c − r_0‖` at `candidate`
    pub fn predicted(&self, candidate: &PlanarPoint) -> Vec<f64> {
        let c = candidate.to_vector2();
        let d0 = (c - self.reference).norm();
        self.receivers.iter().map(|r| (c - r).norm() - d0).collect()
    }

    /// Residual vector at `candidate`
    pub fn evaluate(&self, candidate: &PlanarPoint) -> DVector<f64> {
        let predicted = self.predicted(candidate);
        DVector::from_iterator(
            self.len(),
            predicted.iter().zip(&self.range_differences).map(|(p, d)| p - d),
        )
    }

    /// Analytic Jacobian of the residuals with respect to (x, y).
    ///
    /// Row `i` is `u_i − u_0`, with `u_k` the unit vector from receiver `k`
    /// towards the candidate. At a receiver the unit vector is taken as zero.
    pub fn jacobian(&self, candidate: &PlanarPoint) -> MatrixXx2<f64> {
        let c = candidate.to_vector2();
        let u0 = unit_towards(&c, &self.reference);
        let mut jacobian = MatrixXx2::zeros(self.len());
        for (i, r) in self.receivers.iter().enumerate() {
            let row = unit_towards(&c, r) - u0;
            jacobian[(i, 0)] = row.x;
            jacobian[(i, 1)] = row.y;
        }
        jacobian
    }
}

fn unit_towards(candidate: &Vector2<f64>, receiver: &Vector2<f64>) -> Vector2<f64> {
    let diff = candidate - receiver;
    let norm = diff.norm();
    if norm > 0.0 {
        diff / norm
    } else {
        Vector2::zeros()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn square_model(source: PlanarPoint) -> ResidualModel {
        let r0 = PlanarPoint::new(0.0, 0.0);
        let others = [PlanarPoint::new(1000.0, 0.0), PlanarPoint::new(0.0, 1000.0), PlanarPoint::new(1000.0, 1000.0)];
        let deltas: Vec<f64> = others.iter().map(|r| source.distance_to(r) - source.distance_to(&r0)).collect();
        ResidualModel::new(r0, &others, &deltas).unwrap()
    }

    #[test]
    fn test_residuals_vanish_at_source() {
        let source = PlanarPoint::new(320.0, 710.0);
        let model = square_model(source);
        assert_eq!(model.len(), 3);
        let residuals = model.evaluate(&source);
        for r in residuals.iter() {
            assert_abs_diff_eq!(*r, 0.0, epsilon = 1e-9);
        }
    }

    #[test]
    fn test_coincident_candidate_is_finite() {
        let model = square_model(PlanarPoint::new(200.0, 200.0));
        for candidate in model.receiver_positions() {
            let residuals = model.evaluate(&candidate);
            let jacobian = model.jacobian(&candidate);
            assert!(residuals.iter().all(|r| r.is_finite()));
            assert!(jacobian.iter().all(|j| j.is_finite()));
        }
        // At the reference every predicted difference is the plain distance to r_i
        let predicted = model.predicted(&PlanarPoint::new(0.0, 0.0));
        assert_abs_diff_eq!(predicted[0], 1000.0, epsilon = 1e-12);
    }

    #[test]
    fn test_jacobian_matches_finite_differences() {
        let model = square_model(PlanarPoint::new(400.0, 650.0));
        let candidate = PlanarPoint::new(123.0, 456.0);
        let analytic = model.jacobian(&candidate);
        let h = 1e-6;
        let base = model.evaluate(&candidate);
        let dx = model.evaluate(&PlanarPoint::new(candidate.x + h, candidate.y));
        let dy = model.evaluate(&PlanarPoint::new(candidate.x, candidate.y + h));
        for i in 0..model.len() {
            assert_abs_diff_eq!(analytic[(i, 0)], (dx[i] - base[i]) / h, epsilon = 1e-5);
            assert_abs_diff_eq!(analytic[(i, 1)], (dy[i] - base[i]) / h, epsilon = 1e-5);
        }
    }

    #[test]
    fn test_mismatched_lengths_are_rejected() {
        let result = ResidualModel::new(
            PlanarPoint::default(),
            &[PlanarPoint::new(1.0, 0.0), PlanarPoint::new(0.0, 1.0)],
            &[0.5],
        );
        assert_eq!(
            result.unwrap_err(),
            LocalizationError::MeasurementCountMismatch { receivers: 3, measurements: 2 }
        );
    }
}
