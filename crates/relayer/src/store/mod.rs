//! Single-value register holding the current location.

use std::sync::{Arc, PoisonError, RwLock};

use chrono::{SecondsFormat, Utc};
use shared::{LocationRecord, DEFAULT_SOURCE_ID};

/// A validated location about to be written.
#[derive(Debug, Clone, PartialEq)]
pub struct LocationCandidate {
    pub latitude: f64,
    pub longitude: f64,
    pub source_id: Option<String>,
}

/// Current-location register. Each write swaps in a whole new record, so a
/// reader sees either the previous update or the next one, never a mix.
#[derive(Debug)]
pub struct LocationStore {
    current: RwLock<Arc<LocationRecord>>,
}

impl LocationStore {
    pub fn new(initial: LocationRecord) -> Self {
        Self {
            current: RwLock::new(Arc::new(initial)),
        }
    }

    /// Start with `(latitude, longitude)` stamped now under the default source id.
    pub fn with_default_location(latitude: f64, longitude: f64) -> Self {
        Self::new(LocationRecord {
            latitude,
            longitude,
            timestamp: now_timestamp(),
            id: DEFAULT_SOURCE_ID.to_string(),
        })
    }

    pub fn read(&self) -> LocationRecord {
        let guard = self.current.read().unwrap_or_else(PoisonError::into_inner);
        LocationRecord::clone(&guard)
    }

    /// Replace the stored record and return it. The timestamp is always ours.
    pub fn write(&self, candidate: LocationCandidate) -> LocationRecord {
        let record = LocationRecord {
            latitude: candidate.latitude,
            longitude: candidate.longitude,
            timestamp: now_timestamp(),
            id: candidate
                .source_id
                .unwrap_or_else(|| DEFAULT_SOURCE_ID.to_string()),
        };
        let next = Arc::new(record.clone());
        *self.current.write().unwrap_or_else(PoisonError::into_inner) = next;
        record
    }
}

/// ISO-8601 UTC with millisecond precision, e.g. `2025-01-01T12:00:00.123Z`.
pub fn now_timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}
