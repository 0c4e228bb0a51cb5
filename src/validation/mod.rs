//! Input validation, error taxonomy and accuracy evaluation

pub mod accuracy;
pub mod data;
pub mod error;

pub use accuracy::{AccuracyStatistics, AccuracyValidator};
pub use data::ObservationValidator;
pub use error::LocalizationError;
