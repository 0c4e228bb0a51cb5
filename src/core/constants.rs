//! Physical constants and system parameters

/// Propagation speed of a radio signal in vacuum (m/s)
pub const SPEED_OF_LIGHT: f64 = 299_792_458.0;

/// Mean Earth radius used by the local projection (meters, IUGG)
pub const EARTH_MEAN_RADIUS_M: f64 = 6_371_008.8;

/// Minimum number of receivers that constrain a unique 2D position
pub const MIN_RECEIVERS: usize = 3;

pub const NANOS_PER_SECOND: f64 = 1e9;
