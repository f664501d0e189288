//! Chainpulse Checker RPC - node status checker for the monitored network.
//!
//! Polls the network's JSON-RPC endpoint on a fixed interval, fans out the
//! primary calls concurrently with settle-all semantics, and publishes the
//! aggregated snapshot to the shared status board. A manual refresh channel
//! lets the web frontend trigger an immediate cycle.

use chainpulse_core::board::StatusCell;
use chainpulse_core::config::Config;
use chainpulse_core::types::RpcSnapshot;
use tokio::sync::mpsc;
use tracing::info;

pub mod checker;
pub mod client;

pub use checker::RpcChecker;
pub use client::{RpcClient, RpcError};

/// Run the RPC checker until the process shuts down.
pub async fn run(
    config: &Config,
    cell: StatusCell<RpcSnapshot>,
    refresh_rx: mpsc::Receiver<()>,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    info!(url = %config.chain.rpc_url, "Starting RPC status checker...");
    let checker = RpcChecker::new(&config.chain.rpc_url, &config.rpc_checker)?;
    checker.run(cell, refresh_rx).await
}
