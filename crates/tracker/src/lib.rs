//! Location tracker — CLI client for the location relayer.

pub mod cli;
pub mod relay_client;
