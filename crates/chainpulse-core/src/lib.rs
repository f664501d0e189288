//! Chainpulse Core - Shared types and configuration for the chainpulse monitor.

pub mod board;
pub mod config;
pub mod hexutil;
pub mod tracing_setup;
pub mod types;

pub use board::{refresh_channel, RefreshHandle, StatusCell};
pub use config::Config;
pub use types::{BlockInfo, NetworkSnapshot, RpcSnapshot, SyncProgress};
