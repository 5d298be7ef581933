//! Location relayer — HTTP + WebSocket backend.
//!
//! Optional env: HOST, PORT, DEFAULT_LATITUDE, DEFAULT_LONGITUDE,
//! BROADCAST_TO_SENDER

use std::net::SocketAddr;

use anyhow::Context;
use relayer::{api, config};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let config = config::Config::from_env().map_err(|e| anyhow::anyhow!("config: {}", e))?;
    let addr: SocketAddr = config
        .bind_addr()
        .parse()
        .with_context(|| format!("invalid bind address {}", config.bind_addr()))?;

    let state = api::AppState::new(config);
    let initial = state.gateway.current_location();
    tracing::info!(
        latitude = initial.latitude,
        longitude = initial.longitude,
        policy = ?state.gateway.policy(),
        "Initial location"
    );

    let app = api::router(state);

    tracing::info!("Relayer listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!("Failed to listen for Ctrl-C: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutting down");
}
