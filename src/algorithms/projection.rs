//! Local planar frame for a receiver cluster
//!
//! Spherical azimuthal-equidistant projection: the planar distance from the
//! frame origin equals the great-circle distance, and bearings from the
//! origin are preserved. Elsewhere the scale error grows roughly with
//! `(d / R)^2 / 6`, about 4e-9 at 1 km, which is why the frame is centered
//! on the cluster itself.

use std::f64::consts::PI;

use crate::core::{GeographicPoint, PlanarPoint, EARTH_MEAN_RADIUS_M};
use crate::validation::LocalizationError;

/// Projection frame scoped to a single localization call
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LocalFrame {
    origin: GeographicPoint,
    radius_m: f64,
    sin_lat0: f64,
    cos_lat0: f64,
}

impl LocalFrame {
    /// Create a frame centered at `origin`
    pub fn new(origin: GeographicPoint) -> Result<Self, LocalizationError> {
        Self::with_radius(origin, EARTH_MEAN_RADIUS_M)
    }

    /// Create a frame on a sphere of the given radius
    pub fn with_radius(origin: GeographicPoint, radius_m: f64) -> Result<Self, LocalizationError> {
        if !origin.is_valid() {
            return Err(LocalizationError::DegenerateOrigin {
                latitude: origin.latitude,
                longitude: origin.longitude,
            });
        }
        let lat0 = origin.latitude.to_radians();
        Ok(Self {
            origin,
            radius_m,
            sin_lat0: lat0.sin(),
            cos_lat0: lat0.cos(),
        })
    }

    /// Frame centered on the arithmetic mean of the given positions
    pub fn centered_on(points: &[GeographicPoint]) -> Result<Self, LocalizationError> {
        let origin = GeographicPoint::mean_of(points).ok_or(LocalizationError::InsufficientReceivers {
            available: 0,
            required: 1,
        })?;
        Self::new(origin)
    }

    pub fn origin(&self) -> GeographicPoint {
        self.origin
    }

    /// Geographic -> planar
    pub fn forward(&self, point: &GeographicPoint) -> PlanarPoint {
        let lat = point.latitude.to_radians();
        let dlon = (point.longitude - self.origin.longitude).to_radians();
        let dlat = lat - self.origin.latitude.to_radians();

        // Haversine keeps the central angle accurate for short distances
        let h = (dlat / 2.0).sin().powi(2) + self.cos_lat0 * lat.cos() * (dlon / 2.0).sin().powi(2);
        let c = 2.0 * h.sqrt().min(1.0).asin();
        if c == 0.0 {
            return PlanarPoint::default();
        }

        let azimuth = (dlon.sin() * lat.cos())
            .atan2(self.cos_lat0 * lat.sin() - self.sin_lat0 * lat.cos() * dlon.cos());
        let rho = self.radius_m * c;

        PlanarPoint::new(rho * azimuth.sin(), rho * azimuth.cos())
    }

    /// Planar -> geographic
    pub fn inverse(&self, point: &PlanarPoint) -> Result<GeographicPoint, LocalizationError> {
        let rho = point.x.hypot(point.y);
        if !rho.is_finite() || rho > PI * self.radius_m {
            return Err(LocalizationError::OutsideProjection { x: point.x, y: point.y });
        }
        if rho == 0.0 {
            return Ok(self.origin);
        }

        let c = rho / self.radius_m;
        let (sin_c, cos_c) = c.sin_cos();
        let azimuth = point.x.atan2(point.y);

        let sin_lat = (self.sin_lat0 * cos_c + self.cos_lat0 * sin_c * azimuth.cos()).clamp(-1.0, 1.0);
        let lat = sin_lat.asin();
        let dlon = (azimuth.sin() * sin_c * self.cos_lat0).atan2(cos_c - self.sin_lat0 * sin_lat);

        Ok(GeographicPoint::new(
            lat.to_degrees(),
            normalize_longitude(self.origin.longitude + dlon.to_degrees()),
        ))
    }
}

/// Stateless projector facade taking the origin on every call
#[derive(Debug, Clone, Copy, Default)]
pub struct GeodeticProjector;

impl GeodeticProjector {
    pub fn forward(&self, origin: &GeographicPoint, point: &GeographicPoint) -> Result<PlanarPoint, LocalizationError> {
        Ok(LocalFrame::new(*origin)?.forward(point))
    }

    pub fn inverse(&self, origin: &GeographicPoint, point: &PlanarPoint) -> Result<GeographicPoint, LocalizationError> {
        LocalFrame::new(*origin)?.inverse(point)
    }
}

/// Great-circle distance on the projection sphere (meters)
pub fn great_circle_distance(a: &GeographicPoint, b: &GeographicPoint) -> f64 {
    let lat1 = a.latitude.to_radians();
    let lat2 = b.latitude.to_radians();
    let dlat = lat2 - lat1;
    let dlon = (b.longitude - a.longitude).to_radians();

    let h = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlon / 2.0).sin().powi(2);
    2.0 * EARTH_MEAN_RADIUS_M * h.sqrt().min(1.0).asin()
}

fn normalize_longitude(lon: f64) -> f64 {
    let wrapped = (lon + 180.0).rem_euclid(360.0) - 180.0;
    // Keep +180 when the input was exactly on the anti-meridian
    if wrapped == -180.0 && lon > 0.0 {
        180.0
    } else {
        wrapped
    }
}
