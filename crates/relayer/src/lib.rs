//! Location relayer: current-location register, update validation, fan-out.

pub mod api;
pub mod config;
pub mod error;
pub mod relay;
pub mod store;
