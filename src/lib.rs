//! TDoA Beacon Locator
//!
//! Estimates the geographic position of a beacon from time-difference-of-arrival
//! measurements taken by several receivers, using hyperbolic multilateration
//! in a local azimuthal-equidistant frame.

pub mod core;
pub mod algorithms;
pub mod processing;
pub mod validation;
pub mod utils;
pub mod api;

// Re-export commonly used types
pub use core::{GeographicPoint, LocalizationResult, PlanarPoint, ReceiverObservation, SPEED_OF_LIGHT};
pub use algorithms::{
    great_circle_distance, observations_from_arrivals, range_differences_from_arrivals, DilutionOfPrecision,
    EngineConfig, GeodeticProjector, GeometryQuality, LevenbergMarquardt, LocalFrame, LocalizationEngine,
    ResidualModel, SolverConfig, SolverOutcome,
};
pub use processing::{
    unix_time_ms, DetectionParser, DetectionRecord, DetectionRepository, InMemoryDetectionRepository, ParseError,
};
pub use validation::{AccuracyStatistics, AccuracyValidator, LocalizationError, ObservationValidator};
pub use utils::{ConfigError, LocatorConfig};
pub use api::{BeaconLocator, BeaconPositionReport, LocatorError};
