use nalgebra::Matrix2;
use serde::{Deserialize, Serialize};

use crate::algorithms::residual::ResidualModel;
use crate::core::PlanarPoint;

/// Geometry quality classes for a horizontal dilution of precision value
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum GeometryQuality {
    Excellent,
    Good,
    Acceptable,
    Poor,
    Degenerate,
}

impl GeometryQuality {
    pub fn from_hdop(hdop: f64) -> Self {
        match hdop {
            h if !h.is_finite() => GeometryQuality::Degenerate,
            h if h < 2.0 => GeometryQuality::Excellent,
            h if h < 5.0 => GeometryQuality::Good,
            h if h < 10.0 => GeometryQuality::Acceptable,
            h if h < 20.0 => GeometryQuality::Poor,
            _ => GeometryQuality::Degenerate,
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            GeometryQuality::Excellent => "Excellent receiver geometry",
            GeometryQuality::Good => "Good receiver geometry",
            GeometryQuality::Acceptable => "Acceptable receiver geometry",
            GeometryQuality::Poor => "Poor receiver geometry, expect large errors",
            GeometryQuality::Degenerate => "Degenerate receiver geometry",
        }
    }
}

/// Dilution of precision for a TDoA fix
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DilutionOfPrecision {
    /// `sqrt(trace((JᵀJ)⁻¹))`, unitless multiplier on range-difference error
    pub hdop: f64,
    pub quality: GeometryQuality,
}

impl DilutionOfPrecision {
    /// Compute the horizontal DOP of the model at `position`.
    ///
    /// Returns `None` when `JᵀJ` cannot be inverted.
    pub fn at(model: &ResidualModel, position: &PlanarPoint) -> Option<Self> {
        let jacobian = model.jacobian(position);
        let jtj: Matrix2<f64> = jacobian.tr_mul(&jacobian);
        let covariance = jtj.try_inverse()?;
        let trace = covariance.trace();
        if !(trace.is_finite() && trace > 0.0) {
            return None;
        }
        let hdop = trace.sqrt();
        Some(Self { hdop, quality: GeometryQuality::from_hdop(hdop) })
    }

    /// Expected horizontal error (meters) for a given range-difference sigma
    pub fn position_uncertainty(&self, range_sigma_m: f64) -> f64 {
        self.hdop * range_sigma_m
    }
}
