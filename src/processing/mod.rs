//! Detection ingestion and storage

pub mod parser;
pub mod repository;

pub use parser::{unix_time_ms, DetectionParser, DetectionRecord, ParseError};
pub use repository::{DetectionRepository, InMemoryDetectionRepository};
