//! Beacon locator service
//!
//! Glue between the detection store and the engine: picks the latest
//! coherent detection group for a beacon, turns integer nanosecond arrival
//! stamps into relative seconds exactly once, and packages the fix.

use thiserror::Error;
use tracing::{debug, info};

use crate::algorithms::dop::GeometryQuality;
use crate::algorithms::engine::LocalizationEngine;
use crate::api::types::{BeaconPositionReport, LatLon, ReceiverReport};
use crate::core::{GeographicPoint, MIN_RECEIVERS, NANOS_PER_SECOND};
use crate::processing::parser::{DetectionParser, DetectionRecord, ParseError};
use crate::processing::repository::DetectionRepository;
use crate::utils::config::LocatorConfig;
use crate::validation::LocalizationError;

#[derive(Debug, Error)]
pub enum LocatorError {
    #[error("no coherent detection group for beacon `{beacon_id}`")]
    NoCoherentGroup { beacon_id: String },
    #[error(transparent)]
    Localization(#[from] LocalizationError),
    #[error("malformed detection: {0}")]
    Parse(#[from] ParseError),
}

pub struct BeaconLocator<R: DetectionRepository> {
    repository: R,
    engine: LocalizationEngine,
    parser: DetectionParser,
    signal_speed: f64,
    /// Distinct receivers a slot needs to be located; shared by grouping and solving
    min_receivers: usize,
}

impl<R: DetectionRepository> BeaconLocator<R> {
    pub fn new(repository: R, config: &LocatorConfig) -> Self {
        Self {
            repository,
            engine: LocalizationEngine::new(config.engine_config()),
            parser: DetectionParser::new(),
            signal_speed: config.signal_speed_m_s,
            min_receivers: config.min_receivers.max(MIN_RECEIVERS),
        }
    }

    pub fn repository(&self) -> &R {
        &self.repository
    }

    /// Decode an ingestion message and store it
    pub fn ingest(&mut self, payload: &str) -> Result<(), LocatorError> {
        let record = self.parser.parse(payload)?;
        debug!(beacon = %record.beacon_id, receiver = %record.receiver_id, slot = record.time_slot, "detection stored");
        self.repository.save(record);
        Ok(())
    }

    /// Locate `beacon_id` from its most recent coherent detection group
    pub fn locate(&self, beacon_id: &str) -> Result<BeaconPositionReport, LocatorError> {
        let detections = self.repository.latest_coherent_group(beacon_id, self.min_receivers);
        if detections.is_empty() {
            return Err(LocatorError::NoCoherentGroup { beacon_id: beacon_id.to_string() });
        }
        self.locate_group(beacon_id, &detections)
    }

    /// Locate a beacon from an explicit detection group; the first record
    /// is the TDoA reference.
    pub fn locate_group(&self, beacon_id: &str, detections: &[DetectionRecord]) -> Result<BeaconPositionReport, LocatorError> {
        let reference_toa = detections.first().map(|d| d.time_of_arrival_ns).unwrap_or_default();
        let tdoa_ns: Vec<i64> = detections
            .iter()
            .map(|d| d.time_of_arrival_ns.saturating_sub(reference_toa))
            .collect();
        let arrivals_s: Vec<f64> = tdoa_ns.iter().map(|&ns| ns as f64 / NANOS_PER_SECOND).collect();
        let positions: Vec<GeographicPoint> = detections.iter().map(|d| d.receiver_position).collect();

        let result = self.engine.localize_arrivals(&positions, &arrivals_s, self.signal_speed)?;
        info!(
            beacon = beacon_id,
            lat = result.estimated_position.latitude,
            lon = result.estimated_position.longitude,
            receivers = detections.len(),
            converged = result.converged,
            "beacon located"
        );

        let predicted = std::iter::once(0.0).chain(result.predicted_range_differences.iter().copied());
        let receivers = detections
            .iter()
            .zip(tdoa_ns)
            .zip(predicted)
            .map(|((d, tdoa_ns), predicted_range_difference_m)| ReceiverReport {
                receiver_id: d.receiver_id.clone(),
                lat: d.receiver_position.latitude,
                lon: d.receiver_position.longitude,
                tdoa_ns,
                predicted_range_difference_m,
            })
            .collect();

        Ok(BeaconPositionReport {
            beacon_id: beacon_id.to_string(),
            time_slot: detections[0].time_slot,
            beacon: LatLon {
                lat: result.estimated_position.latitude,
                lon: result.estimated_position.longitude,
            },
            receivers,
            residual_norm: result.residual_norm,
            converged: result.converged,
            iterations: result.iterations,
            hdop: result.hdop,
            geometry: result.hdop.map(GeometryQuality::from_hdop),
        })
    }
}
