//! Unified configuration for all chainpulse services.

use std::env;

/// Identity and endpoints of the monitored network.
#[derive(Clone, Debug)]
pub struct ChainConfig {
    pub name: String,
    pub chain_id: u64,
    pub currency_name: String,
    pub currency_symbol: String,
    pub currency_decimals: u8,
    pub rpc_url: String,
    pub explorer_url: String,
}

impl ChainConfig {
    /// Create configuration from environment variables.
    pub fn from_env() -> Self {
        Self {
            name: env::var("CHAIN_NAME").unwrap_or_else(|_| "XL3 Chain".into()),
            chain_id: env::var("CHAIN_ID")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(7117),
            currency_name: env::var("CHAIN_CURRENCY_NAME").unwrap_or_else(|_| "XL3".into()),
            currency_symbol: env::var("CHAIN_CURRENCY_SYMBOL").unwrap_or_else(|_| "XL3".into()),
            currency_decimals: env::var("CHAIN_CURRENCY_DECIMALS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(18),
            rpc_url: env::var("RPC_URL").unwrap_or_else(|_| "https://rpc.0xl3.com".into()),
            explorer_url: env::var("EXPLORER_URL")
                .unwrap_or_else(|_| "https://exp.0xl3.com".into()),
        }
    }

    /// Chain id in the `0x` form wallets and JSON-RPC use.
    pub fn chain_id_hex(&self) -> String {
        format!("{:#x}", self.chain_id)
    }

    /// The explorer's aggregate stats endpoint.
    pub fn stats_url(&self) -> String {
        format!("{}/api/v2/stats", self.explorer_url.trim_end_matches('/'))
    }
}

/// Configuration for the RPC status checker.
#[derive(Clone, Debug)]
pub struct RpcCheckerConfig {
    pub poll_interval_secs: u64,
    pub request_timeout_secs: u64,
}

impl RpcCheckerConfig {
    /// Create configuration from environment variables.
    pub fn from_env() -> Self {
        Self {
            poll_interval_secs: env::var("RPC_POLL_INTERVAL_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(5),
            request_timeout_secs: env::var("RPC_TIMEOUT_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(10),
        }
    }
}

/// Configuration for the explorer stats checker.
#[derive(Clone, Debug)]
pub struct StatsCheckerConfig {
    pub poll_interval_secs: u64,
    pub request_timeout_secs: u64,
}

impl StatsCheckerConfig {
    /// Create configuration from environment variables.
    pub fn from_env() -> Self {
        Self {
            poll_interval_secs: env::var("STATS_POLL_INTERVAL_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(30),
            request_timeout_secs: env::var("STATS_TIMEOUT_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(10),
        }
    }
}

/// Configuration for the web service.
#[derive(Clone, Debug)]
pub struct WebConfig {
    pub bind_address: String,
    pub bind_port: u16,
}

impl WebConfig {
    /// Create configuration from environment variables.
    pub fn from_env() -> Self {
        Self {
            bind_address: env::var("BIND_ADDRESS").unwrap_or_else(|_| "0.0.0.0".into()),
            bind_port: env::var("BIND_PORT")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(8080),
        }
    }
}

/// Combined configuration for all services.
#[derive(Clone, Debug)]
pub struct Config {
    pub chain: ChainConfig,
    pub rpc_checker: RpcCheckerConfig,
    pub stats_checker: StatsCheckerConfig,
    pub web: WebConfig,
}

impl Config {
    /// Create full configuration from environment variables.
    pub fn from_env() -> Self {
        Self {
            chain: ChainConfig::from_env(),
            rpc_checker: RpcCheckerConfig::from_env(),
            stats_checker: StatsCheckerConfig::from_env(),
            web: WebConfig::from_env(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_chain() -> ChainConfig {
        ChainConfig {
            name: "XL3 Chain".into(),
            chain_id: 7117,
            currency_name: "XL3".into(),
            currency_symbol: "XL3".into(),
            currency_decimals: 18,
            rpc_url: "https://rpc.0xl3.com".into(),
            explorer_url: "https://exp.0xl3.com/".into(),
        }
    }

    #[test]
    fn chain_id_hex_is_minimal_lowercase() {
        assert_eq!(test_chain().chain_id_hex(), "0x1bc5");
    }

    #[test]
    fn stats_url_tolerates_trailing_slash() {
        assert_eq!(test_chain().stats_url(), "https://exp.0xl3.com/api/v2/stats");
    }
}
