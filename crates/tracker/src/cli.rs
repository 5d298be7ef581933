//! CLI argument parsing.

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "tracker")]
#[command(about = "Location tracker — push, poll and watch the relayer's current location")]
pub struct Cli {
    /// Relayer base URL [env: RELAYER_URL, default: http://localhost:3000]
    #[arg(long, global = true, value_name = "URL")]
    pub url: Option<String>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Print the relayer's current location [default]
    Get,

    /// Submit a location over HTTP
    Send {
        #[arg(value_name = "LAT", value_parser = parse_coordinate, allow_negative_numbers = true)]
        latitude: f64,

        #[arg(value_name = "LNG", value_parser = parse_coordinate, allow_negative_numbers = true)]
        longitude: f64,

        /// Source label (defaults to test-<unix millis>)
        #[arg(long)]
        id: Option<String>,
    },

    /// Cycle through a fixed set of world cities until Ctrl-C
    Tour {
        /// Seconds between updates
        #[arg(long, default_value_t = 3)]
        interval: u64,
    },

    /// Stay connected over WebSocket and print every location update
    Watch,

    /// Submit a location over WebSocket and print the relayed record
    Push {
        #[arg(value_name = "LAT", value_parser = parse_coordinate, allow_negative_numbers = true)]
        latitude: f64,

        #[arg(value_name = "LNG", value_parser = parse_coordinate, allow_negative_numbers = true)]
        longitude: f64,

        /// Source label (defaults to the connection id assigned by the relayer)
        #[arg(long)]
        id: Option<String>,
    },
}

/// Finite decimal degrees. `NaN` and `inf` parse as `f64` but no relayer accepts them.
fn parse_coordinate(s: &str) -> Result<f64, String> {
    let value: f64 = s.parse().map_err(|e| format!("{}", e))?;
    if value.is_finite() {
        Ok(value)
    } else {
        Err(format!("{} is not a finite coordinate", s))
    }
}
