//! Shared request/response and domain models.

use serde::{Deserialize, Serialize};

/// Source id stamped on records whose origin supplied none.
pub const DEFAULT_SOURCE_ID: &str = "default";

/// The current location as stored by the relayer and sent on the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocationRecord {
    pub latitude: f64,
    pub longitude: f64,
    /// RFC 3339 instant assigned by the relayer at write time.
    pub timestamp: String,
    /// Opaque origin of the update (caller label or channel id).
    pub id: String,
}

/// Body of `POST /api/location` and payload of `update_location`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateLocationRequest {
    pub latitude: f64,
    pub longitude: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
}

/// Successful `/api/location` response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocationResponse {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub location: LocationRecord,
}

impl LocationResponse {
    pub fn new(location: LocationRecord) -> Self {
        Self {
            success: true,
            message: None,
            location,
        }
    }

    pub fn with_message(location: LocationRecord, message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: Some(message.into()),
            location,
        }
    }
}

/// Failed `/api/location` response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub success: bool,
    pub message: String,
}

impl ErrorResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
        }
    }
}

// --- WebSocket envelope ---

/// WebSocket message envelope (version 1).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WsEnvelope {
    #[serde(default)]
    pub version: u8,
    pub r#type: String,
    #[serde(default)]
    pub payload: serde_json::Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ts: Option<String>,
}

impl WsEnvelope {
    /// Build a version 1 envelope around an already-encoded payload.
    pub fn new(r#type: &str, payload: serde_json::Value) -> Self {
        Self {
            version: 1,
            r#type: r#type.to_string(),
            payload,
            ts: None,
        }
    }

    pub fn with_ts(mut self, ts: impl Into<String>) -> Self {
        self.ts = Some(ts.into());
        self
    }
}

/// WebSocket message types.
pub mod ws_types {
    /// Client -> server: submit a new location.
    pub const UPDATE_LOCATION: &str = "update_location";
    /// Client -> server: ask for the current location.
    pub const GET_CURRENT_LOCATION: &str = "get_current_location";
    /// Server -> client: the current location changed (or was requested).
    pub const LOCATION_UPDATE: &str = "location_update";
    pub const PING: &str = "ping";
    pub const PONG: &str = "pong";
}
