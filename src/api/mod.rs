//! Service layer consumed by outer front ends (HTTP, CLI)

pub mod locator;
pub mod types;

pub use locator::{BeaconLocator, LocatorError};
pub use types::{BeaconPositionReport, LatLon, ReceiverReport};
