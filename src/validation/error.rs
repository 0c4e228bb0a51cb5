use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Error classification for the localization engine
#[derive(Debug, Clone, PartialEq, Error, Serialize, Deserialize)]
pub enum LocalizationError {
    /// Fewer receivers than needed to constrain a 2D position
    #[error("insufficient receivers: {available} supplied, at least {required} required")]
    InsufficientReceivers { available: usize, required: usize },

    /// Projection origin is not a valid geographic coordinate
    #[error("degenerate projection origin ({latitude}, {longitude})")]
    DegenerateOrigin { latitude: f64, longitude: f64 },

    #[error("receiver {index} has an invalid position ({latitude}, {longitude})")]
    InvalidReceiverPosition { index: usize, latitude: f64, longitude: f64 },

    #[error("receiver {index} has a non-finite measurement ({value})")]
    InvalidMeasurement { index: usize, value: f64 },

    #[error("{receivers} receivers but {measurements} arrival times")]
    MeasurementCountMismatch { receivers: usize, measurements: usize },

    /// Receiver geometry leaves the position unobservable in some direction.
    /// `iterations` is 0 when the receiver layout itself is collinear.
    #[error("singular jacobian after {iterations} iterations (singular value ratio {ratio:.3e})")]
    SingularJacobian { iterations: usize, ratio: f64 },

    #[error("solver did not converge after {iterations} iterations (residual norm {residual_norm:.3} m)")]
    NonConvergence { iterations: usize, residual_norm: f64 },

    #[error("planar point ({x:.1}, {y:.1}) lies outside the projection domain")]
    OutsideProjection { x: f64, y: f64 },
}

impl LocalizationError {
    /// Stable name of the error kind, used in logs and JSON payloads
    pub fn kind(&self) -> &'static str {
        match self {
            LocalizationError::InsufficientReceivers { .. } => "InsufficientReceivers",
            LocalizationError::DegenerateOrigin { .. } => "DegenerateOrigin",
            LocalizationError::InvalidReceiverPosition { .. } => "InvalidReceiverPosition",
            LocalizationError::InvalidMeasurement { .. } => "InvalidMeasurement",
            LocalizationError::MeasurementCountMismatch { .. } => "MeasurementCountMismatch",
            LocalizationError::SingularJacobian { .. } => "SingularJacobian",
            LocalizationError::NonConvergence { .. } => "NonConvergence",
            LocalizationError::OutsideProjection { .. } => "OutsideProjection",
        }
    }

    /// The engine is deterministic, so repeating a call with the same input
    /// never helps. Callers must change the input (more receivers, another
    /// initial guess) instead.
    pub fn is_retryable(&self) -> bool {
        false
    }

    /// Suggested corrective action for operators
    pub fn recovery_hint(&self) -> &'static str {
        match self {
            LocalizationError::InsufficientReceivers { .. } => "gather detections from more receivers",
            LocalizationError::DegenerateOrigin { .. }
            | LocalizationError::InvalidReceiverPosition { .. }
            | LocalizationError::InvalidMeasurement { .. }
            | LocalizationError::MeasurementCountMismatch { .. } => "check upstream data for corruption",
            LocalizationError::SingularJacobian { .. } => "add receivers off the line of the existing ones",
            LocalizationError::NonConvergence { .. } => "retry with a different initial guess or accept the estimate with reduced confidence",
            LocalizationError::OutsideProjection { .. } => "retry with an initial guess inside the receiver cluster",
        }
    }
}
