//! The RPC poll cycle: concurrent fan-out, aggregation, scheduling.

use std::sync::Arc;
use std::time::Duration;

use chainpulse_core::board::StatusCell;
use chainpulse_core::config::RpcCheckerConfig;
use chainpulse_core::hexutil;
use chainpulse_core::types::{BlockInfo, RpcSnapshot, SyncProgress};
use chrono::{TimeZone, Utc};
use serde_json::{json, Value};
use tokio::sync::mpsc;
use tokio::time::interval;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::client::{CallResult, RpcClient, RpcError};

/// Outcome of one poll cycle before aggregation. The four primary calls
/// settle independently; the block-detail call is only attempted after a
/// usable block number.
struct CycleOutcome {
    chain_id: Result<CallResult, RpcError>,
    block_number: Result<CallResult, RpcError>,
    gas_price: Result<CallResult, RpcError>,
    syncing: Result<CallResult, RpcError>,
    block_detail: Option<Result<CallResult, RpcError>>,
}

pub struct RpcChecker {
    client: Arc<RpcClient>,
    poll_interval: Duration,
}

impl RpcChecker {
    pub fn new(rpc_url: &str, config: &RpcCheckerConfig) -> Result<Self, RpcError> {
        let client = RpcClient::new(rpc_url, Duration::from_secs(config.request_timeout_secs))?;
        Ok(Self {
            client: Arc::new(client),
            poll_interval: Duration::from_secs(config.poll_interval_secs),
        })
    }

    /// Poll until shutdown. Every trigger (interval tick or manual refresh)
    /// spawns its own cycle task: there is no overlap guard, and when a
    /// slow cycle races a newer one the last completer wins the cell.
    pub async fn run(
        self,
        cell: StatusCell<RpcSnapshot>,
        mut refresh_rx: mpsc::Receiver<()>,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let checker = Arc::new(self);
        let mut ticker = interval(checker.poll_interval);
        let mut refresh_open = true;

        loop {
            let trigger = tokio::select! {
                _ = ticker.tick() => "interval",
                received = refresh_rx.recv(), if refresh_open => match received {
                    Some(()) => "manual",
                    None => {
                        // Web frontend gone; keep polling on the interval alone.
                        refresh_open = false;
                        continue;
                    }
                },
            };

            debug!(trigger, "RPC poll cycle triggered");
            let checker = Arc::clone(&checker);
            let cell = cell.clone();
            tokio::spawn(async move {
                checker.run_cycle(&cell).await;
            });
        }
    }

    /// One full cycle: fan out the primary calls, chase the block detail,
    /// aggregate, publish.
    pub async fn run_cycle(&self, cell: &StatusCell<RpcSnapshot>) {
        let cycle_id = Uuid::new_v4();
        cell.begin_cycle().await;

        let (chain_id, block_number, gas_price, syncing) = tokio::join!(
            self.client.call("eth_chainId", json!([])),
            self.client.call("eth_blockNumber", json!([])),
            self.client.call("eth_gasPrice", json!([])),
            self.client.call("eth_syncing", json!([])),
        );

        // The detail call strictly follows a successful block-number call.
        let block_detail = match &block_number {
            Ok(call) => match require_quantity(&call.result) {
                Ok(number) => Some(
                    self.client
                        .call(
                            "eth_getBlockByNumber",
                            json!([hexutil::format_quantity(number), false]),
                        )
                        .await,
                ),
                Err(e) => {
                    warn!(%cycle_id, error = %e, "eth_blockNumber returned a malformed quantity");
                    None
                }
            },
            Err(_) => None,
        };

        let snapshot = build_snapshot(CycleOutcome {
            chain_id,
            block_number,
            gas_price,
            syncing,
            block_detail,
        });

        info!(
            %cycle_id,
            online = snapshot.online,
            block = snapshot.latest_block.as_ref().map(|b| b.number),
            response_ms = snapshot.response_time_ms,
            "RPC poll cycle finished"
        );
        cell.publish(snapshot).await;
    }
}

/// Running totals over the settled calls of one cycle.
#[derive(Default)]
struct Tally {
    total: Duration,
    successes: u32,
    primary_successes: u32,
}

impl Tally {
    /// Settle one call: it contributes to the snapshot and the mean only
    /// when it both succeeded and parsed. A reachable endpoint returning
    /// junk counts as a failed call, not a crash.
    fn settle<T>(
        &mut self,
        label: &str,
        call: Result<CallResult, RpcError>,
        primary: bool,
        parse: impl FnOnce(&Value) -> Result<T, RpcError>,
    ) -> Option<T> {
        let outcome = call.and_then(|call| parse(&call.result).map(|value| (value, call.elapsed)));
        match outcome {
            Ok((value, elapsed)) => {
                self.total += elapsed;
                self.successes += 1;
                if primary {
                    self.primary_successes += 1;
                }
                Some(value)
            }
            Err(e) => {
                warn!(call = label, error = %e, "RPC call failed");
                None
            }
        }
    }

    fn mean_ms(&self) -> u64 {
        if self.successes == 0 {
            return 0;
        }
        (self.total.as_millis() as f64 / self.successes as f64).round() as u64
    }
}

/// Fold the settled calls into a snapshot.
fn build_snapshot(outcome: CycleOutcome) -> RpcSnapshot {
    let mut tally = Tally::default();

    let chain_id = tally.settle("eth_chainId", outcome.chain_id, true, require_hex_string);
    let block_number = tally.settle("eth_blockNumber", outcome.block_number, true, require_quantity);
    let gas_price_wei = tally.settle("eth_gasPrice", outcome.gas_price, true, require_quantity_u128);
    let sync_state = tally.settle("eth_syncing", outcome.syncing, true, parse_sync_state);

    let latest_block = match (block_number, outcome.block_detail) {
        (Some(number), Some(detail)) => tally.settle("eth_getBlockByNumber", detail, false, |v| {
            parse_block_info(number, v)
        }),
        _ => None,
    };

    let (syncing, sync_progress) = match sync_state {
        Some((flag, progress)) => (Some(flag), progress),
        None => (None, None),
    };

    RpcSnapshot {
        online: tally.primary_successes > 0,
        chain_id,
        latest_block,
        gas_price_wei,
        syncing,
        sync_progress,
        response_time_ms: tally.mean_ms(),
        checked_at: Utc::now(),
    }
}

fn require_hex_string(value: &Value) -> Result<String, RpcError> {
    let s = value
        .as_str()
        .ok_or_else(|| RpcError::Malformed(format!("expected a hex string, got {}", value)))?;
    hexutil::parse_quantity_u128(s)?;
    Ok(s.to_string())
}

fn require_quantity(value: &Value) -> Result<u64, RpcError> {
    let s = value
        .as_str()
        .ok_or_else(|| RpcError::Malformed(format!("expected a hex string, got {}", value)))?;
    Ok(hexutil::parse_quantity(s)?)
}

fn require_quantity_u128(value: &Value) -> Result<u128, RpcError> {
    let s = value
        .as_str()
        .ok_or_else(|| RpcError::Malformed(format!("expected a hex string, got {}", value)))?;
    Ok(hexutil::parse_quantity_u128(s)?)
}

fn hex_field(object: &Value, key: &str) -> Result<u64, RpcError> {
    let value = object
        .get(key)
        .ok_or_else(|| RpcError::Malformed(format!("missing field {}", key)))?;
    require_quantity(value)
}

/// `eth_syncing` returns literal `false` on a synced node and a progress
/// object while it catches up.
fn parse_sync_state(value: &Value) -> Result<(bool, Option<SyncProgress>), RpcError> {
    match value {
        Value::Bool(flag) => Ok((*flag, None)),
        Value::Object(_) => {
            let progress = SyncProgress {
                current_block: hex_field(value, "currentBlock")?,
                highest_block: hex_field(value, "highestBlock")?,
                starting_block: hex_field(value, "startingBlock")?,
            };
            Ok((true, Some(progress)))
        }
        other => Err(RpcError::Malformed(format!(
            "unexpected eth_syncing result: {}",
            other
        ))),
    }
}

/// Header fields we display out of an `eth_getBlockByNumber` result. The
/// block number comes from the block-number call, matching the display
/// contract.
fn parse_block_info(number: u64, detail: &Value) -> Result<BlockInfo, RpcError> {
    if !detail.is_object() {
        return Err(RpcError::Malformed(format!(
            "expected a block object, got {}",
            detail
        )));
    }

    let timestamp_secs = hex_field(detail, "timestamp")?;
    let timestamp = Utc
        .timestamp_opt(timestamp_secs as i64, 0)
        .single()
        .ok_or_else(|| RpcError::Malformed(format!("timestamp {} out of range", timestamp_secs)))?;

    let hash = detail
        .get("hash")
        .and_then(Value::as_str)
        .ok_or_else(|| RpcError::Malformed("missing block hash".into()))?;
    hexutil::validate_hash(hash)?;

    Ok(BlockInfo {
        number,
        timestamp,
        hash: hash.to_string(),
        gas_used: hex_field(detail, "gasUsed")?,
        gas_limit: hex_field(detail, "gasLimit")?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ok(value: Value, millis: u64) -> Result<CallResult, RpcError> {
        Ok(CallResult {
            result: value,
            elapsed: Duration::from_millis(millis),
        })
    }

    fn failed() -> Result<CallResult, RpcError> {
        Err(RpcError::Status(503))
    }

    fn block_detail_value() -> Value {
        json!({
            "timestamp": "0x66ab1f40",
            "hash": format!("0x{}", "ab".repeat(32)),
            "gasUsed": "0x5208",
            "gasLimit": "0x1c9c380"
        })
    }

    #[test]
    fn all_primary_failures_mean_offline() {
        let snapshot = build_snapshot(CycleOutcome {
            chain_id: failed(),
            block_number: failed(),
            gas_price: failed(),
            syncing: failed(),
            block_detail: None,
        });

        assert!(!snapshot.online);
        assert!(snapshot.latest_block.is_none());
        assert!(snapshot.chain_id.is_none());
        assert!(snapshot.gas_price_wei.is_none());
        assert!(snapshot.syncing.is_none());
        assert_eq!(snapshot.response_time_ms, 0);
    }

    #[test]
    fn block_detail_failure_leaves_block_absent_but_online() {
        let snapshot = build_snapshot(CycleOutcome {
            chain_id: ok(json!("0x1bc5"), 100),
            block_number: ok(json!("0x3e8"), 100),
            gas_price: failed(),
            syncing: failed(),
            block_detail: Some(failed()),
        });

        assert!(snapshot.online);
        assert_eq!(snapshot.chain_id.as_deref(), Some("0x1bc5"));
        assert!(snapshot.latest_block.is_none());
    }

    #[test]
    fn successful_cycle_builds_full_snapshot() {
        let snapshot = build_snapshot(CycleOutcome {
            chain_id: ok(json!("0x1bc5"), 100),
            block_number: ok(json!("0x3e8"), 100),
            gas_price: ok(json!("0x59682f00"), 100),
            syncing: ok(json!(false), 100),
            block_detail: Some(ok(block_detail_value(), 100)),
        });

        assert!(snapshot.online);
        assert_eq!(snapshot.chain_id_decimal(), Some(7117));
        assert_eq!(snapshot.gas_price_wei, Some(1_500_000_000));
        assert_eq!(snapshot.syncing, Some(false));
        assert!(snapshot.sync_progress.is_none());

        let block = snapshot.latest_block.unwrap();
        assert_eq!(block.number, 1000);
        assert_eq!(block.gas_used, 21_000);
        assert_eq!(block.gas_limit, 30_000_000);
        assert_eq!(block.timestamp.timestamp(), 0x66ab1f40);
    }

    #[test]
    fn sync_object_is_decoded_with_progress() {
        let snapshot = build_snapshot(CycleOutcome {
            chain_id: failed(),
            block_number: failed(),
            gas_price: failed(),
            syncing: ok(
                json!({
                    "currentBlock": "0x32",
                    "highestBlock": "0xc8",
                    "startingBlock": "0x0"
                }),
                100,
            ),
            block_detail: None,
        });

        assert!(snapshot.online);
        assert_eq!(snapshot.syncing, Some(true));
        let progress = snapshot.sync_progress.unwrap();
        assert_eq!(progress.current_block, 50);
        assert_eq!(progress.highest_block, 200);
        assert_eq!(progress.starting_block, 0);
        assert_eq!(progress.percent(), 25.0);
    }

    #[test]
    fn malformed_sync_object_counts_as_failed_call() {
        let snapshot = build_snapshot(CycleOutcome {
            chain_id: ok(json!("0x1bc5"), 100),
            block_number: failed(),
            gas_price: failed(),
            syncing: ok(json!({"currentBlock": "garbage"}), 100),
            block_detail: None,
        });

        assert!(snapshot.online);
        assert!(snapshot.syncing.is_none());
        assert!(snapshot.sync_progress.is_none());
        // Only the chain-id call contributes to the mean.
        assert_eq!(snapshot.response_time_ms, 100);
    }

    #[test]
    fn response_time_averages_successful_calls_only() {
        let snapshot = build_snapshot(CycleOutcome {
            chain_id: ok(json!("0x1bc5"), 100),
            block_number: failed(),
            gas_price: ok(json!("0x1"), 300),
            syncing: failed(),
            block_detail: None,
        });

        assert_eq!(snapshot.response_time_ms, 200);
    }

    #[test]
    fn non_string_chain_id_is_dropped() {
        let snapshot = build_snapshot(CycleOutcome {
            chain_id: ok(json!(7117), 100),
            block_number: ok(json!("0x3e8"), 100),
            gas_price: failed(),
            syncing: failed(),
            block_detail: Some(ok(block_detail_value(), 100)),
        });

        assert!(snapshot.online);
        assert!(snapshot.chain_id.is_none());
        assert!(snapshot.latest_block.is_some());
    }

    #[test]
    fn truncated_block_hash_discards_detail() {
        let mut detail = block_detail_value();
        detail["hash"] = json!("0xabcdef");

        let snapshot = build_snapshot(CycleOutcome {
            chain_id: failed(),
            block_number: ok(json!("0x3e8"), 100),
            gas_price: failed(),
            syncing: failed(),
            block_detail: Some(ok(detail, 100)),
        });

        assert!(snapshot.online);
        assert!(snapshot.latest_block.is_none());
    }
}
