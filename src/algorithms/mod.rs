//! Core positioning algorithms

pub mod projection;
pub mod residual;
pub mod solver;
pub mod dop;
pub mod engine;

pub use projection::{great_circle_distance, GeodeticProjector, LocalFrame};
pub use residual::ResidualModel;
pub use solver::{LevenbergMarquardt, SolverConfig, SolverOutcome};
pub use dop::{DilutionOfPrecision, GeometryQuality};
pub use engine::{observations_from_arrivals, range_differences_from_arrivals, EngineConfig, LocalizationEngine};
