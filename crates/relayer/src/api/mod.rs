//! Relayer HTTP surface: location routes, the `/ws` push channel and a health probe.

mod routes;

use std::sync::Arc;

use axum::{extract::State, routing::get, Json, Router};
use serde_json::{json, Value};
use tower_http::cors::{Any, CorsLayer};

use crate::config::Config;
use crate::relay::BroadcastGateway;
use crate::store::LocationStore;

#[derive(Clone)]
pub struct AppState {
    pub gateway: Arc<BroadcastGateway>,
    pub config: Arc<Config>,
}

impl AppState {
    /// Fresh store seeded with the configured default location.
    pub fn new(config: Config) -> Self {
        let store = LocationStore::with_default_location(
            config.default_latitude,
            config.default_longitude,
        );
        let gateway = BroadcastGateway::new(Arc::new(store), config.broadcast_policy);
        Self {
            gateway: Arc::new(gateway),
            config: Arc::new(config),
        }
    }
}

/// Browsers on any origin may read and post locations.
fn permissive_cors() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any)
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .nest("/api", routes::api_routes())
        .route("/ws", get(routes::ws_handler))
        .route("/health", get(health))
        .layer(permissive_cors())
        .with_state(state)
}

async fn health(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "subscribers": state.gateway.subscriber_count(),
    }))
}
