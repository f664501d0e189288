//! Common types shared by the chainpulse checkers and web frontend.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One full reading of the explorer's `/api/v2/stats` endpoint.
///
/// Replaced wholesale on every successful poll; there are no partial merges.
/// The explorer serves large counters as JSON strings, so those fields go
/// through tolerant deserializers that accept either strings or numbers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkSnapshot {
    /// Average block time in milliseconds.
    #[serde(default)]
    pub average_block_time: f64,

    #[serde(default, deserialize_with = "deserialize_count")]
    pub total_blocks: u64,

    #[serde(default, deserialize_with = "deserialize_count")]
    pub total_transactions: u64,

    #[serde(default, deserialize_with = "deserialize_count")]
    pub transactions_today: u64,

    #[serde(default, deserialize_with = "deserialize_count")]
    pub total_addresses: u64,

    /// Utilization as a fraction in [0, 1], e.g. 0.42 for 42%.
    #[serde(default)]
    pub network_utilization_percentage: f64,

    #[serde(default)]
    pub gas_prices: GasPrices,

    #[serde(default, deserialize_with = "deserialize_big_count")]
    pub gas_used_today: u128,

    #[serde(default, deserialize_with = "deserialize_big_count")]
    pub total_gas_used: u128,

    #[serde(default)]
    pub coin_price: Option<String>,

    #[serde(default)]
    pub market_cap: Option<String>,

    #[serde(default)]
    pub tvl: Option<String>,
}

/// Gas price tiers in gwei, as reported by the explorer's oracle.
/// Any tier may be null while the oracle warms up.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GasPrices {
    #[serde(default)]
    pub slow: Option<f64>,
    #[serde(default)]
    pub average: Option<f64>,
    #[serde(default)]
    pub fast: Option<f64>,
}

fn deserialize_count<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    match value {
        serde_json::Value::Number(n) => Ok(n.as_u64().unwrap_or(0)),
        serde_json::Value::String(s) => {
            if s.is_empty() {
                Ok(0)
            } else {
                s.parse().map_err(serde::de::Error::custom)
            }
        }
        serde_json::Value::Null => Ok(0),
        _ => Err(serde::de::Error::custom("expected a number or string")),
    }
}

fn deserialize_big_count<'de, D>(deserializer: D) -> Result<u128, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    match value {
        serde_json::Value::Number(n) => Ok(n.as_u64().unwrap_or(0) as u128),
        serde_json::Value::String(s) => {
            if s.is_empty() {
                Ok(0)
            } else {
                s.parse().map_err(serde::de::Error::custom)
            }
        }
        serde_json::Value::Null => Ok(0),
        _ => Err(serde::de::Error::custom("expected a number or string")),
    }
}

/// Aggregate result of one RPC poll cycle.
///
/// Built from up to five independent calls; each field stays `None` when its
/// call failed. `online` only requires that one of the four primary calls
/// came back.
#[derive(Debug, Clone, Serialize)]
pub struct RpcSnapshot {
    pub online: bool,

    /// Chain id exactly as the node returned it, e.g. `"0x1bc5"`.
    pub chain_id: Option<String>,

    pub latest_block: Option<BlockInfo>,

    pub gas_price_wei: Option<u128>,

    /// `None` when the `eth_syncing` call failed.
    pub syncing: Option<bool>,

    /// Present only while the node reports sync progress as an object.
    pub sync_progress: Option<SyncProgress>,

    /// Mean response time across the successful calls of this cycle.
    pub response_time_ms: u64,

    pub checked_at: DateTime<Utc>,
}

impl RpcSnapshot {
    /// Chain id as a decimal number, when the node returned a parseable one.
    pub fn chain_id_decimal(&self) -> Option<u64> {
        self.chain_id
            .as_deref()
            .and_then(|s| crate::hexutil::parse_quantity(s).ok())
    }
}

/// Header fields of the most recent block, from `eth_getBlockByNumber`.
#[derive(Debug, Clone, Serialize)]
pub struct BlockInfo {
    pub number: u64,
    pub timestamp: DateTime<Utc>,
    pub hash: String,
    pub gas_used: u64,
    pub gas_limit: u64,
}

/// Sync progress reported by `eth_syncing` while the node catches up.
#[derive(Debug, Clone, Serialize)]
pub struct SyncProgress {
    pub current_block: u64,
    pub highest_block: u64,
    pub starting_block: u64,
}

impl SyncProgress {
    /// Completion ratio as a percentage, clamped to [0, 100].
    pub fn percent(&self) -> f64 {
        if self.highest_block == 0 {
            return 0.0;
        }
        let pct = self.current_block as f64 / self.highest_block as f64 * 100.0;
        pct.clamp(0.0, 100.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn network_snapshot_parses_string_counters() {
        let json = r#"{
            "average_block_time": 2000,
            "total_blocks": "1000",
            "total_transactions": "56721",
            "transactions_today": "132",
            "total_addresses": "901",
            "network_utilization_percentage": 0.42,
            "gas_prices": {"slow": 0.5, "average": 1.0, "fast": 2.1},
            "gas_used_today": "123456789012",
            "total_gas_used": "99123456789012",
            "coin_price": null,
            "market_cap": "0.0",
            "tvl": null
        }"#;
        let snap: NetworkSnapshot = serde_json::from_str(json).unwrap();
        assert_eq!(snap.total_blocks, 1000);
        assert_eq!(snap.total_transactions, 56721);
        assert_eq!(snap.transactions_today, 132);
        assert_eq!(snap.total_addresses, 901);
        assert_eq!(snap.gas_used_today, 123_456_789_012);
        assert_eq!(snap.gas_prices.average, Some(1.0));
        assert!(snap.coin_price.is_none());
    }

    #[test]
    fn network_snapshot_parses_numeric_counters() {
        let json = r#"{"total_blocks": 42, "average_block_time": 2000.0}"#;
        let snap: NetworkSnapshot = serde_json::from_str(json).unwrap();
        assert_eq!(snap.total_blocks, 42);
        assert_eq!(snap.total_transactions, 0);
        assert!(snap.gas_prices.slow.is_none());
    }

    #[test]
    fn network_snapshot_rejects_garbage_counter() {
        let json = r#"{"total_blocks": "not-a-number"}"#;
        assert!(serde_json::from_str::<NetworkSnapshot>(json).is_err());
    }

    #[test]
    fn sync_progress_percent_is_clamped() {
        let progress = SyncProgress {
            current_block: 50,
            highest_block: 200,
            starting_block: 0,
        };
        assert_eq!(progress.percent(), 25.0);

        // A node briefly ahead of its own target must not exceed 100.
        let ahead = SyncProgress {
            current_block: 300,
            highest_block: 200,
            starting_block: 0,
        };
        assert_eq!(ahead.percent(), 100.0);

        let empty = SyncProgress {
            current_block: 0,
            highest_block: 0,
            starting_block: 0,
        };
        assert_eq!(empty.percent(), 0.0);
    }

    #[test]
    fn chain_id_decimal_parses_hex() {
        let mut snap = RpcSnapshot {
            online: true,
            chain_id: Some("0x1bc5".to_string()),
            latest_block: None,
            gas_price_wei: None,
            syncing: None,
            sync_progress: None,
            response_time_ms: 0,
            checked_at: Utc::now(),
        };
        assert_eq!(snap.chain_id_decimal(), Some(7117));

        snap.chain_id = Some("nonsense".to_string());
        assert_eq!(snap.chain_id_decimal(), None);
    }
}
