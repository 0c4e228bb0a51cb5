//! Core types and constants for the TDoA locator

pub mod types;
pub mod constants;

pub use types::*;
pub use constants::*;
