//! API route handlers.

use axum::{
    body::Bytes,
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    routing::get,
    Json, Router,
};
use futures_util::{SinkExt, StreamExt};
use serde_json::Value;
use shared::{ws_types, LocationRecord, LocationResponse, WsEnvelope};
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::api::AppState;
use crate::error::ValidationError;
use crate::relay::Origin;
use crate::store::now_timestamp;

/// Channel id reported for updates arriving over plain HTTP.
const HTTP_CHANNEL_ID: &str = "http";

pub fn api_routes() -> Router<AppState> {
    Router::new().route("/location", get(location_get).post(location_post))
}

// --- Location ---

async fn location_get(State(state): State<AppState>) -> Json<LocationResponse> {
    Json(LocationResponse::new(state.gateway.current_location()))
}

/// Body is read raw so unparseable JSON maps to `MalformedPayload` rather than axum's rejection.
async fn location_post(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<LocationResponse>, ValidationError> {
    let raw: Value = serde_json::from_slice(&body).map_err(|e| {
        tracing::debug!("Rejected location body: {}", e);
        ValidationError::MalformedPayload
    })?;
    let location = state
        .gateway
        .submit(&raw, &Origin::request(HTTP_CHANNEL_ID))
        .inspect_err(|e| tracing::debug!("Rejected location update: {}", e))?;
    Ok(Json(LocationResponse::with_message(
        location,
        "location updated",
    )))
}

// --- WebSocket ---

pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
) -> axum::response::Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

/// Subscribe the connection, send it the current location, then relay
/// broadcasts out and `update_location` / `get_current_location` in.
async fn handle_socket(socket: WebSocket, state: AppState) {
    let channel_id = Uuid::new_v4().to_string();
    let (mut ws_tx, mut ws_rx) = socket.split();
    let mut subscription = state.gateway.subscribe(&channel_id);
    let (pong_tx, mut pong_rx) = mpsc::channel::<Message>(16);
    tracing::info!(%channel_id, "WebSocket client connected");

    // greeting travels through the subscription so it can never overtake a newer broadcast
    state.gateway.send_current(&channel_id);

    let mut ping_interval = tokio::time::interval(tokio::time::Duration::from_secs(30));
    ping_interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
    let writer = tokio::spawn(async move {
        loop {
            let msg = tokio::select! {
                recv = subscription.recv() => {
                    let record = match recv {
                        Some(r) => r,
                        None => break,
                    };
                    match location_update_message(&record) {
                        Some(m) => m,
                        None => continue,
                    }
                }
                pong = pong_rx.recv() => match pong {
                    Some(m) => m,
                    None => break,
                },
                _ = ping_interval.tick() => Message::Ping(Bytes::new()),
            };
            if ws_tx.send(msg).await.is_err() {
                break;
            }
        }
    });

    while let Some(msg) = ws_rx.next().await {
        match msg {
            Ok(Message::Text(text)) => {
                handle_text(&state, &channel_id, text.as_str(), &pong_tx).await;
            }
            Ok(Message::Close(_)) | Err(_) => break,
            _ => {}
        }
    }

    state.gateway.unsubscribe(&channel_id);
    writer.abort();
    tracing::info!(%channel_id, "WebSocket client disconnected");
}

/// Push-channel rejections are silent to the client; the protocol has no error event.
async fn handle_text(
    state: &AppState,
    channel_id: &str,
    text: &str,
    pong_tx: &mpsc::Sender<Message>,
) {
    let envelope: WsEnvelope = match serde_json::from_str(text) {
        Ok(e) => e,
        Err(_) => {
            tracing::debug!(channel_id, "Ignoring unparseable frame");
            return;
        }
    };

    match envelope.r#type.as_str() {
        ws_types::UPDATE_LOCATION => {
            if let Err(e) = state
                .gateway
                .submit(&envelope.payload, &Origin::push(channel_id))
            {
                tracing::debug!(channel_id, "Rejected push update: {}", e);
            }
        }
        ws_types::GET_CURRENT_LOCATION => {
            state.gateway.send_current(channel_id);
        }
        ws_types::PING => {
            let pong = WsEnvelope::new(ws_types::PONG, serde_json::json!({})).with_ts(now_timestamp());
            if let Ok(j) = serde_json::to_string(&pong) {
                let _ = pong_tx.send(Message::Text(j.into())).await;
            }
        }
        other => tracing::debug!(channel_id, msg_type = other, "Ignoring unknown message type"),
    }
}

fn location_update_message(record: &LocationRecord) -> Option<Message> {
    let payload = serde_json::to_value(record).ok()?;
    let envelope = WsEnvelope::new(ws_types::LOCATION_UPDATE, payload).with_ts(now_timestamp());
    serde_json::to_string(&envelope)
        .ok()
        .map(|j| Message::Text(j.into()))
}
