//! Clients for the relayer's HTTP and WebSocket channels.

pub mod http;
pub mod ws;

use shared::LocationRecord;

/// One-line human rendering of a record.
pub fn format_record(record: &LocationRecord) -> String {
    format!(
        "lat {:.6}  lng {:.6}  at {}  (id {})",
        record.latitude, record.longitude, record.timestamp, record.id
    )
}

/// Label used when the caller gives none, e.g. `test-1735689600000`.
pub fn default_source_id() -> String {
    format!("test-{}", chrono::Utc::now().timestamp_millis())
}
