//! Wire types exchanged by the relayer, its HTTP callers and push-channel clients.

mod models;

pub use models::ws_types;
pub use models::{
    ErrorResponse, LocationRecord, LocationResponse, UpdateLocationRequest, WsEnvelope,
    DEFAULT_SOURCE_ID,
};
