//! Report types returned by the beacon locator

use serde::{Deserialize, Serialize};

use crate::algorithms::dop::GeometryQuality;

/// Geographic coordinate in the report's wire shape
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LatLon {
    pub lat: f64,
    pub lon: f64,
}

/// One receiver that contributed to a fix
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReceiverReport {
    pub receiver_id: String,
    pub lat: f64,
    pub lon: f64,
    /// Arrival time relative to the reference receiver (nanoseconds)
    pub tdoa_ns: i64,
    /// Model range difference at the estimate (meters); 0 for the reference
    pub predicted_range_difference_m: f64,
}

/// Estimated beacon position together with the receivers used
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BeaconPositionReport {
    pub beacon_id: String,
    pub time_slot: i64,
    pub beacon: LatLon,
    pub receivers: Vec<ReceiverReport>,
    pub residual_norm: f64,
    pub converged: bool,
    pub iterations: usize,
    pub hdop: Option<f64>,
    pub geometry: Option<GeometryQuality>,
}

impl BeaconPositionReport {
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}
