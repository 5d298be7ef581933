//! HTTP client for `/api/location`.

use anyhow::Result;
use shared::{ErrorResponse, LocationRecord, LocationResponse, UpdateLocationRequest};

/// Cities visited by `tracker tour`, in order.
pub const TOUR: &[(&str, f64, f64)] = &[
    ("Mexico City", 19.4326, -99.1332),
    ("New York", 40.7128, -74.0060),
    ("London", 51.5074, -0.1278),
    ("Tokyo", 35.6762, 139.6503),
    ("Sydney", -33.8688, 151.2093),
];

#[derive(Debug, Clone)]
pub struct RelayerClient {
    base_url: String,
    http: reqwest::Client,
}

impl RelayerClient {
    pub fn new(base_url: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            http: reqwest::Client::new(),
        }
    }

    pub fn location_url(&self) -> String {
        format!("{}/api/location", self.base_url)
    }

    pub async fn current_location(&self) -> Result<LocationRecord> {
        let res = self.http.get(self.location_url()).send().await?;
        if !res.status().is_success() {
            anyhow::bail!("Fetch failed: {}", res.status());
        }
        let body: LocationResponse = res.json().await?;
        Ok(body.location)
    }

    /// POST an update. A 4xx carries the relayer's reason in the error.
    pub async fn send_location(&self, req: &UpdateLocationRequest) -> Result<LocationRecord> {
        let res = self.http.post(self.location_url()).json(req).send().await?;
        let status = res.status();
        if !status.is_success() {
            let text = res.text().await.unwrap_or_default();
            let reason = serde_json::from_str::<ErrorResponse>(&text)
                .map(|e| e.message)
                .unwrap_or(text);
            anyhow::bail!("Update rejected ({}): {}", status, reason);
        }
        let body: LocationResponse = res.json().await?;
        Ok(body.location)
    }
}

/// Post each [`TOUR`] stop every `interval` until Ctrl-C.
pub async fn run_tour(client: &RelayerClient, interval: std::time::Duration) -> Result<()> {
    let mut ticker = tokio::time::interval(interval);
    for (name, latitude, longitude) in TOUR.iter().cycle() {
        tokio::select! {
            _ = ticker.tick() => {}
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Tour stopped");
                return Ok(());
            }
        }
        let req = UpdateLocationRequest {
            latitude: *latitude,
            longitude: *longitude,
            id: Some(super::default_source_id()),
        };
        match client.send_location(&req).await {
            Ok(record) => println!("{:<12} {}", name, super::format_record(&record)),
            Err(e) => tracing::warn!("{}: {}", name, e),
        }
    }
    Ok(())
}
