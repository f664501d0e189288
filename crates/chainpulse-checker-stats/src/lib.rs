//! Chainpulse Checker Stats - explorer statistics checker.
//!
//! Polls the block explorer's aggregate stats endpoint on a fixed interval
//! and publishes each full reading to the shared status board. A failed
//! poll records an error but leaves the previous reading on display.

use chainpulse_core::board::StatusCell;
use chainpulse_core::config::Config;
use chainpulse_core::types::NetworkSnapshot;
use tracing::info;

pub mod checker;
pub mod client;

pub use checker::StatsChecker;
pub use client::{StatsClient, StatsError};

/// Run the stats checker until the process shuts down.
pub async fn run(
    config: &Config,
    cell: StatusCell<NetworkSnapshot>,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    info!(url = %config.chain.stats_url(), "Starting network stats checker...");
    let checker = StatsChecker::new(&config.chain.stats_url(), &config.stats_checker)?;
    checker.run(cell).await
}
