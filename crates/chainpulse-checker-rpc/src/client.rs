//! Minimal JSON-RPC 2.0 client over HTTP.

use std::error::Error;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use serde_json::{json, Value};

#[derive(Debug)]
pub enum RpcError {
    /// Request never produced an HTTP response.
    Transport(reqwest::Error),
    /// The endpoint answered with a non-2xx status.
    Status(u16),
    /// The envelope carried an `error` member.
    Rpc { code: i64, message: String },
    /// The envelope or result violated the expected shape.
    Malformed(String),
}

impl fmt::Display for RpcError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            RpcError::Transport(e) => write!(f, "transport error: {}", e),
            RpcError::Status(code) => write!(f, "HTTP status {}", code),
            RpcError::Rpc { code, message } => write!(f, "RPC error {}: {}", code, message),
            RpcError::Malformed(msg) => write!(f, "malformed response: {}", msg),
        }
    }
}

impl Error for RpcError {}

impl From<reqwest::Error> for RpcError {
    fn from(err: reqwest::Error) -> RpcError {
        if err.is_decode() {
            RpcError::Malformed(err.to_string())
        } else {
            RpcError::Transport(err)
        }
    }
}

impl From<chainpulse_core::hexutil::HexError> for RpcError {
    fn from(err: chainpulse_core::hexutil::HexError) -> RpcError {
        RpcError::Malformed(err.to_string())
    }
}

/// One settled call: the `result` member plus the observed round trip.
#[derive(Debug)]
pub struct CallResult {
    pub result: Value,
    pub elapsed: Duration,
}

pub struct RpcClient {
    http: reqwest::Client,
    url: String,
    next_id: AtomicU64,
}

impl RpcClient {
    pub fn new(url: &str, timeout: Duration) -> Result<Self, RpcError> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            url: url.to_string(),
            next_id: AtomicU64::new(1),
        })
    }

    /// Issue a single JSON-RPC call and unwrap its envelope.
    pub async fn call(&self, method: &str, params: Value) -> Result<CallResult, RpcError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let body = json!({
            "jsonrpc": "2.0",
            "id": id,
            "method": method,
            "params": params,
        });

        let started = Instant::now();
        let response = self.http.post(&self.url).json(&body).send().await?;
        if !response.status().is_success() {
            return Err(RpcError::Status(response.status().as_u16()));
        }
        let envelope: Value = response.json().await?;
        let elapsed = started.elapsed();

        let result = extract_result(envelope)?;
        Ok(CallResult { result, elapsed })
    }
}

/// Pull the `result` member out of a response envelope, turning an `error`
/// member into a failed call.
fn extract_result(envelope: Value) -> Result<Value, RpcError> {
    if let Some(err) = envelope.get("error") {
        let code = err.get("code").and_then(Value::as_i64).unwrap_or(0);
        let message = err
            .get("message")
            .and_then(Value::as_str)
            .unwrap_or("unspecified RPC error")
            .to_string();
        return Err(RpcError::Rpc { code, message });
    }
    match envelope.get("result") {
        Some(result) => Ok(result.clone()),
        None => Err(RpcError::Malformed(
            "envelope has neither result nor error".into(),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_result_member() {
        let envelope = json!({"jsonrpc": "2.0", "id": 1, "result": "0x1bc5"});
        let result = extract_result(envelope).unwrap();
        assert_eq!(result, json!("0x1bc5"));
    }

    #[test]
    fn error_member_becomes_rpc_error() {
        let envelope = json!({
            "jsonrpc": "2.0",
            "id": 1,
            "error": {"code": -32601, "message": "method not found"}
        });
        match extract_result(envelope) {
            Err(RpcError::Rpc { code, message }) => {
                assert_eq!(code, -32601);
                assert_eq!(message, "method not found");
            }
            other => panic!("expected RPC error, got {:?}", other),
        }
    }

    #[test]
    fn empty_envelope_is_malformed() {
        let envelope = json!({"jsonrpc": "2.0", "id": 1});
        assert!(matches!(
            extract_result(envelope),
            Err(RpcError::Malformed(_))
        ));
    }

    #[test]
    fn false_result_is_preserved() {
        // eth_syncing legitimately returns `false`; it must not be
        // confused with an absent result.
        let envelope = json!({"jsonrpc": "2.0", "id": 1, "result": false});
        assert_eq!(extract_result(envelope).unwrap(), json!(false));
    }
}
