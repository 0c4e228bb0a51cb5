use std::collections::{BTreeMap, HashSet};

use crate::core::MIN_RECEIVERS;
use crate::processing::parser::DetectionRecord;

/// Storage boundary for detection records.
///
/// The localization engine never talks to a repository; callers fetch a
/// coherent group first and hand the engine plain observations.
pub trait DetectionRepository {
    /// Persist one detection
    fn save(&mut self, record: DetectionRecord);

    /// Most recent coherent set of detections for `beacon_id`: every record
    /// of the latest time slot in which at least `min_distinct_receivers`
    /// distinct receivers reported (never fewer than 3). Empty when no slot
    /// qualifies.
    fn latest_coherent_group(&self, beacon_id: &str, min_distinct_receivers: usize) -> Vec<DetectionRecord>;
}

/// Detection store kept in memory, in insertion order
#[derive(Debug, Clone, Default)]
pub struct InMemoryDetectionRepository {
    records: Vec<DetectionRecord>,
}

impl InMemoryDetectionRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Distinct beacon identifiers seen so far, in first-seen order
    pub fn beacon_ids(&self) -> Vec<String> {
        let mut seen = HashSet::new();
        self.records
            .iter()
            .filter(|r| seen.insert(r.beacon_id.as_str()))
            .map(|r| r.beacon_id.clone())
            .collect()
    }
}

impl DetectionRepository for InMemoryDetectionRepository {
    fn save(&mut self, record: DetectionRecord) {
        self.records.push(record);
    }

    fn latest_coherent_group(&self, beacon_id: &str, min_distinct_receivers: usize) -> Vec<DetectionRecord> {
        let min_distinct_receivers = min_distinct_receivers.max(MIN_RECEIVERS);
        let mut receivers_per_slot: BTreeMap<i64, HashSet<&str>> = BTreeMap::new();
        for record in self.records.iter().filter(|r| r.beacon_id == beacon_id) {
            receivers_per_slot
                .entry(record.time_slot)
                .or_default()
                .insert(record.receiver_id.as_str());
        }

        let slot = receivers_per_slot
            .iter()
            .rev()
            .find(|(_, receivers)| receivers.len() >= min_distinct_receivers)
            .map(|(slot, _)| *slot);

        let Some(slot) = slot else {
            return Vec::new();
        };

        // Keep the first report of each receiver so every receiver appears once
        let mut seen = HashSet::new();
        self.records
            .iter()
            .filter(|r| r.beacon_id == beacon_id && r.time_slot == slot)
            .filter(|r| seen.insert(r.receiver_id.as_str()))
            .cloned()
            .collect()
    }
}
