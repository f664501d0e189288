//! HTTP client for the explorer's `/api/v2/stats` endpoint.

use std::error::Error;
use std::fmt;
use std::time::Duration;

use chainpulse_core::types::NetworkSnapshot;

#[derive(Debug)]
pub enum StatsError {
    /// Request never produced an HTTP response.
    Transport(reqwest::Error),
    /// The endpoint answered with a non-2xx status.
    Status(u16),
    /// The body was not a stats document.
    Malformed(String),
}

impl fmt::Display for StatsError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            StatsError::Transport(e) => write!(f, "transport error: {}", e),
            StatsError::Status(code) => write!(f, "HTTP status {}", code),
            StatsError::Malformed(msg) => write!(f, "malformed response: {}", msg),
        }
    }
}

impl Error for StatsError {}

impl From<reqwest::Error> for StatsError {
    fn from(err: reqwest::Error) -> StatsError {
        StatsError::Transport(err)
    }
}

pub struct StatsClient {
    http: reqwest::Client,
    url: String,
}

impl StatsClient {
    pub fn new(url: &str, timeout: Duration) -> Result<Self, StatsError> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            url: url.to_string(),
        })
    }

    /// Fetch one full stats reading.
    pub async fn fetch(&self) -> Result<NetworkSnapshot, StatsError> {
        let response = self.http.get(&self.url).send().await?;
        if !response.status().is_success() {
            return Err(StatsError::Status(response.status().as_u16()));
        }
        let body = response.text().await?;
        parse_stats(&body)
    }
}

/// Decode a stats body, keeping shape violations distinct from transport
/// failures.
fn parse_stats(body: &str) -> Result<NetworkSnapshot, StatsError> {
    serde_json::from_str(body).map_err(|e| StatsError::Malformed(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_explorer_stats_body() {
        let body = r#"{
            "average_block_time": 2000,
            "total_blocks": "1000",
            "total_transactions": "4377",
            "transactions_today": "12",
            "total_addresses": "210",
            "network_utilization_percentage": 0.42,
            "gas_prices": {"slow": 0.5, "average": 1.0, "fast": 2.0},
            "gas_used_today": "8120000"
        }"#;
        let snap = parse_stats(body).unwrap();
        assert_eq!(snap.total_blocks, 1000);
        assert_eq!(snap.average_block_time, 2000.0);
        assert_eq!(snap.network_utilization_percentage, 0.42);
    }

    #[test]
    fn html_error_page_is_malformed() {
        let body = "<html><body>502 Bad Gateway</body></html>";
        assert!(matches!(parse_stats(body), Err(StatsError::Malformed(_))));
    }
}
