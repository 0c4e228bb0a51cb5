//! Core data types for the locator

use nalgebra::Vector2;
use serde::{Deserialize, Serialize};

/// Geographic position in decimal degrees
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeographicPoint {
    pub latitude: f64,
    pub longitude: f64,
}

impl GeographicPoint {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self { latitude, longitude }
    }

    /// True when both components are finite and inside the valid ranges
    pub fn is_valid(&self) -> bool {
        self.latitude.is_finite()
            && self.longitude.is_finite()
            && (-90.0..=90.0).contains(&self.latitude)
            && (-180.0..=180.0).contains(&self.longitude)
    }

    /// Arithmetic mean of raw latitudes and longitudes.
    ///
    /// This is not a geodesic centroid: clusters crossing the anti-meridian
    /// average to the wrong side of the globe.
    pub fn mean_of(points: &[GeographicPoint]) -> Option<GeographicPoint> {
        if points.is_empty() {
            return None;
        }
        let n = points.len() as f64;
        let (lat_sum, lon_sum) = points
            .iter()
            .fold((0.0, 0.0), |(lat, lon), p| (lat + p.latitude, lon + p.longitude));
        Some(GeographicPoint::new(lat_sum / n, lon_sum / n))
    }
}

/// Position in a local planar frame (meters east and north of the frame origin)
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct PlanarPoint {
    pub x: f64,
    pub y: f64,
}

impl PlanarPoint {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn to_vector2(&self) -> Vector2<f64> {
        Vector2::new(self.x, self.y)
    }

    pub fn from_vector2(v: &Vector2<f64>) -> Self {
        Self { x: v.x, y: v.y }
    }

    pub fn distance_to(&self, other: &PlanarPoint) -> f64 {
        (self.x - other.x).hypot(self.y - other.y)
    }

    /// Arithmetic mean of a set of planar points
    pub fn centroid(points: &[PlanarPoint]) -> Option<PlanarPoint> {
        if points.is_empty() {
            return None;
        }
        let sum = points
            .iter()
            .fold(Vector2::zeros(), |acc, p| acc + p.to_vector2());
        Some(PlanarPoint::from_vector2(&(sum / points.len() as f64)))
    }
}

/// One receiver's contribution to a TDoA fix.
///
/// `range_difference` is the extra propagation distance (meters) relative to
/// the reference receiver, which is always observation 0. The reference's own
/// value is ignored by the engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReceiverObservation {
    pub position: GeographicPoint,
    pub range_difference: f64,
}

impl ReceiverObservation {
    pub fn new(position: GeographicPoint, range_difference: f64) -> Self {
        Self { position, range_difference }
    }

    /// Observation for the TDoA reference receiver
    pub fn reference(position: GeographicPoint) -> Self {
        Self { position, range_difference: 0.0 }
    }
}

/// Outcome of one localization call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocalizationResult {
    /// Estimated emitter position
    pub estimated_position: GeographicPoint,
    /// Euclidean norm of the range-difference residuals at the estimate (meters)
    pub residual_norm: f64,
    /// Whether the solver met a convergence criterion
    pub converged: bool,
    /// Solver iterations performed
    pub iterations: usize,
    /// Model range differences at the estimate, one per non-reference receiver (meters)
    pub predicted_range_differences: Vec<f64>,
    /// Horizontal dilution of precision at the estimate, if the geometry allows one
    pub hdop: Option<f64>,
}
