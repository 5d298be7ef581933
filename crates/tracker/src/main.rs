//! Location tracker — push, poll and watch the relayer's current location.
//!
//! Optional env: RELAYER_URL, RELAYER_WS_URL

use std::env;
use std::time::Duration;

use clap::Parser;
use shared::UpdateLocationRequest;
use tracker::relay_client::{self, http::RelayerClient, ws};
use tracker::cli;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let cli = cli::Cli::parse();

    let relayer_url = cli
        .url
        .clone()
        .or_else(|| env::var("RELAYER_URL").ok())
        .unwrap_or_else(|| "http://localhost:3000".to_string());
    let ws_url = match &cli.url {
        Some(url) => ws::ws_url_from_base(url),
        None => env::var("RELAYER_WS_URL").unwrap_or_else(|_| ws::ws_url_from_base(&relayer_url)),
    };
    let client = RelayerClient::new(&relayer_url);

    match cli.command.unwrap_or(cli::Commands::Get) {
        cli::Commands::Get => {
            let record = client.current_location().await?;
            println!("Current location:");
            println!("{}", relay_client::format_record(&record));
        }
        cli::Commands::Send {
            latitude,
            longitude,
            id,
        } => {
            let req = UpdateLocationRequest {
                latitude,
                longitude,
                id: Some(id.unwrap_or_else(relay_client::default_source_id)),
            };
            let record = client.send_location(&req).await?;
            println!("Location sent:");
            println!("{}", relay_client::format_record(&record));
        }
        cli::Commands::Tour { interval } => {
            println!(
                "Sending a tour stop every {}s to {} (Ctrl-C to stop)",
                interval,
                client.location_url()
            );
            relay_client::http::run_tour(&client, Duration::from_secs(interval.max(1))).await?;
        }
        cli::Commands::Watch => {
            ws::run_watch(&ws_url).await?;
        }
        cli::Commands::Push {
            latitude,
            longitude,
            id,
        } => {
            let req = UpdateLocationRequest {
                latitude,
                longitude,
                id,
            };
            let record = ws::push_once(&ws_url, &req).await?;
            println!("Location pushed:");
            println!("{}", relay_client::format_record(&record));
        }
    }

    Ok(())
}
