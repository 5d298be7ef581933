//! WebSocket client for the relayer's push channel.

use std::time::Duration;

use anyhow::Result;
use futures_util::{SinkExt, StreamExt};
use shared::{ws_types, LocationRecord, UpdateLocationRequest, WsEnvelope};
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;

type WsStream =
    tokio_tungstenite::WebSocketStream<tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>>;

/// `http://host:3000` -> `ws://host:3000/ws`, `https://` -> `wss://`.
pub fn ws_url_from_base(base_url: &str) -> String {
    let base = base_url.trim_end_matches('/');
    let ws = base
        .replacen("https://", "wss://", 1)
        .replacen("http://", "ws://", 1);
    format!("{}/ws", ws)
}

/// Decode a `location_update` frame. Anything else yields `None`.
pub fn parse_location_update(text: &str) -> Option<LocationRecord> {
    let envelope: WsEnvelope = serde_json::from_str(text).ok()?;
    if envelope.r#type != ws_types::LOCATION_UPDATE {
        return None;
    }
    serde_json::from_value(envelope.payload).ok()
}

fn envelope_message(r#type: &str, payload: serde_json::Value) -> Result<Message> {
    let json = serde_json::to_string(&WsEnvelope::new(r#type, payload))?;
    Ok(Message::Text(json))
}

/// Print every location update; reconnect after 5s whenever the connection drops.
pub async fn run_watch(ws_url: &str) -> Result<()> {
    loop {
        match connect_async(ws_url).await {
            Ok((ws, _)) => {
                tracing::info!("Connected to relayer");
                if let Err(e) = watch_connection(ws).await {
                    tracing::warn!("Connection error: {}", e);
                }
            }
            Err(e) => {
                tracing::warn!("Connect failed: {}, retrying in 5s", e);
            }
        }
        tokio::time::sleep(tokio::time::Duration::from_secs(5)).await;
    }
}

async fn watch_connection(ws: WsStream) -> Result<()> {
    let (_ws_tx, mut ws_rx) = ws.split();
    while let Some(msg) = ws_rx.next().await {
        let text = match msg {
            Ok(Message::Text(t)) => t,
            Ok(Message::Close(_)) => break,
            Err(e) => return Err(e.into()),
            _ => continue,
        };
        if let Some(record) = parse_location_update(&text) {
            println!("{}", super::format_record(&record));
        }
    }
    Ok(())
}

/// Send one `update_location` and return the record the relayer stored.
///
/// The relayer may be configured not to echo updates to their sender, so the
/// stored value is read back with `get_current_location`. The push channel
/// drops invalid updates without a reply, so a read-back that does not match
/// the request is reported as a rejection.
pub async fn push_once(ws_url: &str, req: &UpdateLocationRequest) -> Result<LocationRecord> {
    let (ws, _) = connect_async(ws_url).await?;
    let (mut ws_tx, mut ws_rx) = ws.split();

    // the relayer greets every connection with the current location
    next_location(&mut ws_rx).await?;

    ws_tx
        .send(envelope_message(
            ws_types::UPDATE_LOCATION,
            serde_json::to_value(req)?,
        )?)
        .await?;
    ws_tx
        .send(envelope_message(
            ws_types::GET_CURRENT_LOCATION,
            serde_json::json!({}),
        )?)
        .await?;

    let record = next_location(&mut ws_rx).await?;
    let _ = ws_tx.close().await;
    ensure_accepted(req, &record)?;
    Ok(record)
}

/// The stored record must carry the pushed coordinates (and id, when one was given).
fn ensure_accepted(req: &UpdateLocationRequest, record: &LocationRecord) -> Result<()> {
    let coordinates_match = record.latitude == req.latitude && record.longitude == req.longitude;
    let id_matches = req
        .id
        .as_deref()
        .filter(|id| !id.is_empty())
        .map_or(true, |id| id == record.id);
    if !coordinates_match || !id_matches {
        anyhow::bail!(
            "relayer did not store the pushed location (current: {})",
            super::format_record(record)
        );
    }
    Ok(())
}

async fn next_location(
    ws_rx: &mut futures_util::stream::SplitStream<WsStream>,
) -> Result<LocationRecord> {
    let wait = async {
        while let Some(msg) = ws_rx.next().await {
            match msg? {
                Message::Text(t) => {
                    if let Some(record) = parse_location_update(&t) {
                        return Ok(record);
                    }
                }
                Message::Close(_) => break,
                _ => {}
            }
        }
        Err::<LocationRecord, anyhow::Error>(anyhow::anyhow!(
            "connection closed before a location update arrived"
        ))
    };
    tokio::time::timeout(Duration::from_secs(5), wait)
        .await
        .map_err(|_| anyhow::anyhow!("timed out waiting for a location update"))?
}
