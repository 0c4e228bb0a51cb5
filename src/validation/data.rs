use crate::core::{ReceiverObservation, MIN_RECEIVERS};
use crate::validation::error::LocalizationError;

/// Input checks applied before any projection or solving
#[derive(Debug, Clone)]
pub struct ObservationValidator {
    /// Minimum number of receivers, reference included
    pub min_receivers: usize,
}

impl Default for ObservationValidator {
    fn default() -> Self {
        Self { min_receivers: MIN_RECEIVERS }
    }
}

impl ObservationValidator {
    pub fn new(min_receivers: usize) -> Self {
        Self { min_receivers: min_receivers.max(MIN_RECEIVERS) }
    }

    /// Validate an observation set. The reference receiver (index 0) is only
    /// checked for its position.
    pub fn validate(&self, observations: &[ReceiverObservation]) -> Result<(), LocalizationError> {
        if observations.len() < self.min_receivers {
            return Err(LocalizationError::InsufficientReceivers {
                available: observations.len(),
                required: self.min_receivers,
            });
        }

        for (index, observation) in observations.iter().enumerate() {
            if !observation.position.is_valid() {
                return Err(LocalizationError::InvalidReceiverPosition {
                    index,
                    latitude: observation.position.latitude,
                    longitude: observation.position.longitude,
                });
            }
            if index > 0 && !observation.range_difference.is_finite() {
                return Err(LocalizationError::InvalidMeasurement {
                    index,
                    value: observation.range_difference,
                });
            }
        }

        Ok(())
    }

    /// Validate raw arrival times against the receiver count
    pub fn validate_arrivals(&self, receivers: usize, arrival_times_s: &[f64]) -> Result<(), LocalizationError> {
        if receivers != arrival_times_s.len() {
            return Err(LocalizationError::MeasurementCountMismatch {
                receivers,
                measurements: arrival_times_s.len(),
            });
        }
        match arrival_times_s.iter().position(|t| !t.is_finite()) {
            Some(index) => Err(LocalizationError::InvalidMeasurement { index, value: arrival_times_s[index] }),
            None => Ok(()),
        }
    }
}
