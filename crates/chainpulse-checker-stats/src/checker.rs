//! The stats poll loop.

use std::sync::Arc;
use std::time::Duration;

use chainpulse_core::board::StatusCell;
use chainpulse_core::config::StatsCheckerConfig;
use chainpulse_core::types::NetworkSnapshot;
use tokio::time::interval;
use tracing::{info, warn};
use uuid::Uuid;

use crate::client::{StatsClient, StatsError};

pub struct StatsChecker {
    client: Arc<StatsClient>,
    poll_interval: Duration,
}

impl StatsChecker {
    pub fn new(stats_url: &str, config: &StatsCheckerConfig) -> Result<Self, StatsError> {
        let client = StatsClient::new(stats_url, Duration::from_secs(config.request_timeout_secs))?;
        Ok(Self {
            client: Arc::new(client),
            poll_interval: Duration::from_secs(config.poll_interval_secs),
        })
    }

    /// Poll until shutdown. The first fetch fires immediately; after that
    /// the interval repeats unconditionally, whatever the previous cycle
    /// did. Each tick runs as its own task, so a stalled fetch never holds
    /// the schedule back.
    pub async fn run(
        self,
        cell: StatusCell<NetworkSnapshot>,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let checker = Arc::new(self);
        let mut ticker = interval(checker.poll_interval);

        loop {
            ticker.tick().await;
            let checker = Arc::clone(&checker);
            let cell = cell.clone();
            tokio::spawn(async move {
                checker.run_cycle(&cell).await;
            });
        }
    }

    /// One cycle: fetch, then replace the reading or record the error.
    pub async fn run_cycle(&self, cell: &StatusCell<NetworkSnapshot>) {
        let cycle_id = Uuid::new_v4();
        cell.begin_cycle().await;

        match self.client.fetch().await {
            Ok(snapshot) => {
                info!(
                    %cycle_id,
                    total_blocks = snapshot.total_blocks,
                    total_transactions = snapshot.total_transactions,
                    "stats poll cycle finished"
                );
                cell.publish(snapshot).await;
            }
            Err(e) => {
                warn!(%cycle_id, error = %e, "stats poll cycle failed");
                cell.publish_error(e.to_string()).await;
            }
        }
    }
}
