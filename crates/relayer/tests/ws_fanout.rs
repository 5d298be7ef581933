//! End-to-end push channel tests against a relayer bound on a loopback port.

use std::net::SocketAddr;
use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use futures_util::{SinkExt, StreamExt};
use relayer::api::{router, AppState};
use relayer::config::{Config, DEFAULT_LATITUDE, DEFAULT_LONGITUDE};
use relayer::relay::{BroadcastPolicy, Origin};
use shared::{ws_types, LocationRecord, WsEnvelope};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tower::ServiceExt;

type Client = WebSocketStream<MaybeTlsStream<TcpStream>>;

async fn spawn_relayer(policy: BroadcastPolicy) -> (SocketAddr, AppState) {
    let mut config = Config::for_test();
    config.broadcast_policy = policy;
    let state = AppState::new(config);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let app = router(state.clone());
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (addr, state)
}

/// Connect and consume the location sent on connect.
async fn connect(addr: SocketAddr) -> (Client, LocationRecord) {
    let (mut ws, _) = connect_async(format!("ws://{}/ws", addr)).await.unwrap();
    let initial = next_location(&mut ws).await;
    (ws, initial)
}

async fn next_envelope(ws: &mut Client) -> WsEnvelope {
    loop {
        let msg = tokio::time::timeout(Duration::from_secs(5), ws.next())
            .await
            .expect("timed out waiting for frame")
            .expect("stream ended")
            .unwrap();
        if let Message::Text(t) = msg {
            return serde_json::from_str(&t).unwrap();
        }
    }
}

async fn next_location(ws: &mut Client) -> LocationRecord {
    let envelope = next_envelope(ws).await;
    assert_eq!(envelope.r#type, ws_types::LOCATION_UPDATE);
    serde_json::from_value(envelope.payload).unwrap()
}

async fn expect_silence(ws: &mut Client) {
    let quiet = tokio::time::timeout(Duration::from_millis(300), async {
        loop {
            match ws.next().await {
                Some(Ok(Message::Text(t))) => return t,
                Some(Ok(_)) => continue,
                _ => std::future::pending::<()>().await,
            }
        }
    })
    .await;
    assert!(quiet.is_err(), "unexpected frame: {:?}", quiet);
}

async fn send(ws: &mut Client, r#type: &str, payload: serde_json::Value) {
    let envelope = WsEnvelope::new(r#type, payload);
    ws.send(Message::Text(serde_json::to_string(&envelope).unwrap()))
        .await
        .unwrap();
}

#[tokio::test]
async fn new_connection_receives_current_location() {
    let (addr, _state) = spawn_relayer(BroadcastPolicy::All).await;
    let (_ws, initial) = connect(addr).await;
    assert_eq!(initial.latitude, DEFAULT_LATITUDE);
    assert_eq!(initial.longitude, DEFAULT_LONGITUDE);
    assert_eq!(initial.id, "default");
}

#[tokio::test]
async fn push_update_fans_out_to_everyone_including_sender() {
    let (addr, state) = spawn_relayer(BroadcastPolicy::All).await;
    let (mut a, _) = connect(addr).await;
    let (mut b, _) = connect(addr).await;

    send(
        &mut a,
        ws_types::UPDATE_LOCATION,
        serde_json::json!({"latitude": 40.7128, "longitude": -74.0060, "id": "nyc"}),
    )
    .await;

    let seen_by_a = next_location(&mut a).await;
    let seen_by_b = next_location(&mut b).await;
    assert_eq!(seen_by_a, seen_by_b);
    assert_eq!(seen_by_a.id, "nyc");
    assert_eq!(seen_by_a.latitude, 40.7128);
    assert_eq!(state.gateway.current_location(), seen_by_a);
}

#[tokio::test]
async fn push_update_without_id_is_attributed_to_channel() {
    let (addr, _state) = spawn_relayer(BroadcastPolicy::All).await;
    let (mut a, _) = connect(addr).await;
    send(
        &mut a,
        ws_types::UPDATE_LOCATION,
        serde_json::json!({"latitude": 1.0, "longitude": 2.0}),
    )
    .await;
    let record = next_location(&mut a).await;
    assert_ne!(record.id, "default");
    assert!(uuid::Uuid::parse_str(&record.id).is_ok());
}

#[tokio::test]
async fn exclude_sender_policy_skips_the_sender() {
    let (addr, _state) = spawn_relayer(BroadcastPolicy::ExcludeSender).await;
    let (mut a, _) = connect(addr).await;
    let (mut b, _) = connect(addr).await;

    send(
        &mut a,
        ws_types::UPDATE_LOCATION,
        serde_json::json!({"latitude": 51.5074, "longitude": -0.1278}),
    )
    .await;

    assert_eq!(next_location(&mut b).await.latitude, 51.5074);
    expect_silence(&mut a).await;
}

#[tokio::test]
async fn invalid_push_update_is_dropped_silently() {
    let (addr, state) = spawn_relayer(BroadcastPolicy::All).await;
    let (mut a, _) = connect(addr).await;
    let (mut b, _) = connect(addr).await;
    let before = state.gateway.current_location();

    send(
        &mut a,
        ws_types::UPDATE_LOCATION,
        serde_json::json!({"latitude": "19.4", "longitude": -99.1}),
    )
    .await;
    a.send(Message::Text("not an envelope".to_string()))
        .await
        .unwrap();
    expect_silence(&mut b).await;
    assert_eq!(state.gateway.current_location(), before);

    send(
        &mut a,
        ws_types::UPDATE_LOCATION,
        serde_json::json!({"latitude": 35.6762, "longitude": 139.6503}),
    )
    .await;
    assert_eq!(next_location(&mut b).await.longitude, 139.6503);
}

#[tokio::test]
async fn get_current_location_replies_to_requester_only() {
    let (addr, _state) = spawn_relayer(BroadcastPolicy::All).await;
    let (mut a, _) = connect(addr).await;
    let (mut b, _) = connect(addr).await;

    send(&mut a, ws_types::GET_CURRENT_LOCATION, serde_json::Value::Null).await;
    let reply = next_location(&mut a).await;
    assert_eq!(reply.latitude, DEFAULT_LATITUDE);
    expect_silence(&mut b).await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn replies_interleaved_with_updates_never_go_backwards() {
    const UPDATES: u32 = 300;
    let latitude_of = |i: u32| 20.0 + f64::from(i) * 0.1;

    let (addr, state) = spawn_relayer(BroadcastPolicy::All).await;
    let (ws, _) = connect(addr).await;
    let (mut sink, mut stream) = ws.split();

    let gateway = state.gateway.clone();
    let updater = tokio::task::spawn_blocking(move || {
        for i in 0..UPDATES {
            let lat = latitude_of(i);
            gateway
                .submit(
                    &serde_json::json!({"latitude": lat, "longitude": 0.0}),
                    &Origin::request("http"),
                )
                .unwrap();
            std::thread::sleep(Duration::from_micros(500));
        }
    });
    let asker = tokio::spawn(async move {
        let ask = serde_json::to_string(&WsEnvelope::new(
            ws_types::GET_CURRENT_LOCATION,
            serde_json::json!({}),
        ))
        .unwrap();
        for _ in 0..UPDATES {
            sink.send(Message::Text(ask.clone())).await.unwrap();
            tokio::task::yield_now().await;
        }
        sink
    });

    let mut seen = Vec::new();
    loop {
        match tokio::time::timeout(Duration::from_millis(500), stream.next()).await {
            Ok(Some(Ok(Message::Text(t)))) => {
                let envelope: WsEnvelope = serde_json::from_str(&t).unwrap();
                if envelope.r#type == ws_types::LOCATION_UPDATE {
                    let record: LocationRecord = serde_json::from_value(envelope.payload).unwrap();
                    seen.push(record.latitude);
                }
            }
            Ok(Some(Ok(_))) => continue,
            Ok(other) => panic!("connection ended early: {:?}", other),
            Err(_) if updater.is_finished() && asker.is_finished() => break,
            Err(_) => continue,
        }
    }
    updater.await.unwrap();
    let _sink = asker.await.unwrap();

    assert!(!seen.is_empty());
    for pair in seen.windows(2) {
        assert!(pair[0] <= pair[1], "latitude went backwards: {:?}", pair);
    }
    assert_eq!(seen.last().copied(), Some(latitude_of(UPDATES - 1)));
}

#[tokio::test]
async fn ping_gets_pong() {
    let (addr, _state) = spawn_relayer(BroadcastPolicy::All).await;
    let (mut a, _) = connect(addr).await;
    send(&mut a, ws_types::PING, serde_json::json!({})).await;
    assert_eq!(next_envelope(&mut a).await.r#type, ws_types::PONG);
}

#[tokio::test]
async fn http_update_reaches_push_subscribers() {
    let (addr, state) = spawn_relayer(BroadcastPolicy::ExcludeSender).await;
    let (mut a, _) = connect(addr).await;

    let body = serde_json::json!({"latitude": -33.8688, "longitude": 151.2093, "id": "syd"});
    let response = router(state.clone())
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/location")
                .header("Content-Type", "application/json")
                .body(Body::from(serde_json::to_vec(&body).unwrap()))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let record = next_location(&mut a).await;
    assert_eq!(record.id, "syd");
    assert_eq!(record.latitude, -33.8688);
}

#[tokio::test]
async fn closed_connection_is_unsubscribed() {
    let (addr, state) = spawn_relayer(BroadcastPolicy::All).await;
    let (mut a, _) = connect(addr).await;
    let (_b, _) = connect(addr).await;
    assert_eq!(state.gateway.subscriber_count(), 2);

    a.close(None).await.unwrap();
    for _ in 0..50 {
        if state.gateway.subscriber_count() == 1 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert_eq!(state.gateway.subscriber_count(), 1);
}
