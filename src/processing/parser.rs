use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};
use thiserror::Error;
use tracing::warn;

use crate::core::GeographicPoint;

/// Number of colon-separated fields in a detection message
pub const DETECTION_FIELD_COUNT: usize = 6;

/// One receiver's report of a beacon emission
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectionRecord {
    pub beacon_id: String,
    pub receiver_id: String,
    pub receiver_position: GeographicPoint,
    /// Time of arrival, integer nanoseconds since the Unix epoch
    pub time_of_arrival_ns: i64,
    /// Discrete emission slot shared by all receivers hearing the same emission
    pub time_slot: i64,
    /// When the record was ingested (milliseconds since the Unix epoch)
    pub saved_at_ms: u64,
}

impl DetectionRecord {
    /// Render the record in the ingestion wire format
    /// `receiver_id:lat:lon:beacon_id:time_slot:time_of_arrival`
    pub fn to_message(&self) -> String {
        format!(
            "{}:{}:{}:{}:{}:{}",
            self.receiver_id,
            self.receiver_position.latitude,
            self.receiver_position.longitude,
            self.beacon_id,
            self.time_slot,
            self.time_of_arrival_ns
        )
    }
}

/// Errors that can occur while decoding a detection message
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ParseError {
    #[error("expected {expected} fields, found {found}")]
    FieldCount { expected: usize, found: usize },
    #[error("field `{field}` is empty")]
    EmptyField { field: &'static str },
    #[error("field `{field}` is not a valid number: {value:?}")]
    InvalidNumber { field: &'static str, value: String },
    #[error("{field} out of range: {value}")]
    OutOfRange { field: &'static str, value: f64 },
}

/// Decoder for colon-delimited detection messages
#[derive(Debug, Clone, Default)]
pub struct DetectionParser {
    reject_extra_fields: bool,
}

impl DetectionParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reject messages carrying more than six fields instead of ignoring the tail
    pub fn strict() -> Self {
        Self { reject_extra_fields: true }
    }

    /// Parse a message, stamping it with the current time
    pub fn parse(&self, payload: &str) -> Result<DetectionRecord, ParseError> {
        self.parse_at(payload, unix_time_ms())
    }

    /// Parse a message received at `received_at_ms`
    pub fn parse_at(&self, payload: &str, received_at_ms: u64) -> Result<DetectionRecord, ParseError> {
        let fields: Vec<&str> = payload.trim().split(':').map(str::trim).collect();
        let too_many = self.reject_extra_fields && fields.len() > DETECTION_FIELD_COUNT;
        if fields.len() < DETECTION_FIELD_COUNT || too_many {
            return Err(ParseError::FieldCount {
                expected: DETECTION_FIELD_COUNT,
                found: fields.len(),
            });
        }

        let receiver_id = non_empty(fields[0], "receiver_id")?;
        let latitude = parse_number::<f64>(fields[1], "latitude")?;
        let longitude = parse_number::<f64>(fields[2], "longitude")?;
        let beacon_id = non_empty(fields[3], "beacon_id")?;
        let time_slot = parse_number::<i64>(fields[4], "time_slot")?;
        let time_of_arrival_ns = parse_number::<i64>(fields[5], "time_of_arrival")?;

        if !(latitude.is_finite() && (-90.0..=90.0).contains(&latitude)) {
            return Err(ParseError::OutOfRange { field: "latitude", value: latitude });
        }
        if !(longitude.is_finite() && (-180.0..=180.0).contains(&longitude)) {
            return Err(ParseError::OutOfRange { field: "longitude", value: longitude });
        }

        Ok(DetectionRecord {
            beacon_id,
            receiver_id,
            receiver_position: GeographicPoint::new(latitude, longitude),
            time_of_arrival_ns,
            time_slot,
            saved_at_ms: received_at_ms,
        })
    }

    /// Parse a newline-separated feed. Blank lines and `#` comments are
    /// skipped; failures are returned with their 1-based line number.
    pub fn parse_lines(&self, feed: &str, received_at_ms: u64) -> (Vec<DetectionRecord>, Vec<(usize, ParseError)>) {
        let mut records = Vec::new();
        let mut failures = Vec::new();

        for (index, line) in feed.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            match self.parse_at(line, received_at_ms) {
                Ok(record) => records.push(record),
                Err(err) => {
                    warn!(line = index + 1, error = %err, "dropping malformed detection");
                    failures.push((index + 1, err));
                }
            }
        }

        (records, failures)
    }
}

/// Milliseconds since the Unix epoch; 0 before it, `u64::MAX` far past it
pub fn unix_time_ms() -> u64 {
    let elapsed = SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default();
    u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX)
}

fn non_empty(value: &str, field: &'static str) -> Result<String, ParseError> {
    if value.is_empty() {
        Err(ParseError::EmptyField { field })
    } else {
        Ok(value.to_string())
    }
}

fn parse_number<T: std::str::FromStr>(value: &str, field: &'static str) -> Result<T, ParseError> {
    value.parse::<T>().map_err(|_| ParseError::InvalidNumber {
        field,
        value: value.to_string(),
    })
}
