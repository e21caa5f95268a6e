use alloy_primitives::{Address, Bytes, B256};
use async_trait::async_trait;
use reqwest::header::RETRY_AFTER;
use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::debug;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Servers that answer 429/503 without a Retry-After hint still get this
/// much breathing room.
const RETRY_AFTER_FLOOR: Duration = Duration::from_secs(1);

/// JSON-RPC codes various providers use for request-rate rejection.
const RATE_LIMIT_CODES: [i64; 2] = [-32005, -32016];
/// JSON-RPC codes providers use to reject an oversized eth_getLogs range.
const RANGE_CODES: [i64; 2] = [-32062, -32602];

#[derive(Debug, thiserror::Error)]
pub enum RpcError {
    #[error("rate limited, retry after {retry_after:?}")]
    RateLimited { retry_after: Duration },
    #[error("block range too large")]
    BlockRangeTooLarge,
    #[error("transport error: {0}")]
    Transport(String),
}

impl RpcError {
    fn transport(e: impl std::fmt::Display) -> Self {
        Self::Transport(e.to_string())
    }
}

/// A raw log entry as returned by eth_getLogs. Quantity fields stay in
/// their hex-string wire form; accessors parse on demand.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RpcLog {
    pub address: Address,
    pub topics: Vec<B256>,
    pub data: Bytes,
    #[serde(default)]
    pub block_number: Option<String>,
    #[serde(default)]
    pub transaction_hash: Option<String>,
    #[serde(default)]
    pub log_index: Option<String>,
    #[serde(default)]
    pub removed: bool,
}

impl RpcLog {
    pub fn block_number(&self) -> Option<u64> {
        self.block_number.as_deref().and_then(parse_quantity)
    }

    pub fn log_index(&self) -> Option<u64> {
        self.log_index.as_deref().and_then(parse_quantity)
    }
}

#[derive(Debug, Clone)]
pub struct LogFilter {
    pub from_block: u64,
    pub to_block: u64,
    pub address: Address,
    pub topic0: B256,
}

#[async_trait]
pub trait EthRpc: Send + Sync {
    async fn get_block_number(&self) -> Result<u64, RpcError>;
    async fn get_logs(&self, filter: &LogFilter) -> Result<Vec<RpcLog>, RpcError>;
}

/// JSON-RPC client for one endpoint, with a request-rate floor and
/// rate-limit/range-too-large discrimination at the transport boundary.
#[derive(Clone)]
pub struct EthRpcClient {
    client: reqwest::Client,
    url: String,
    min_delay: Duration,
    last_request: Arc<Mutex<Option<Instant>>>,
}

impl EthRpcClient {
    pub fn new(url: String, min_delay: Duration) -> Self {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .unwrap_or_default();
        Self {
            client,
            url,
            min_delay,
            last_request: Arc::new(Mutex::new(None)),
        }
    }

    /// min_delay = ceil(1000/qps) milliseconds, unless an explicit delay is
    /// configured.
    pub fn min_delay_for(qps: u64, explicit_ms: Option<u64>) -> Duration {
        if let Some(ms) = explicit_ms {
            return Duration::from_millis(ms);
        }
        if qps == 0 {
            return Duration::ZERO;
        }
        Duration::from_millis(1000u64.div_ceil(qps))
    }

    async fn throttle(&self) {
        if self.min_delay.is_zero() {
            return;
        }
        let mut last = self.last_request.lock().await;
        if let Some(prev) = *last {
            let elapsed = prev.elapsed();
            if elapsed < self.min_delay {
                tokio::time::sleep(self.min_delay - elapsed).await;
            }
        }
        *last = Some(Instant::now());
    }

    async fn request(&self, method: &str, params: serde_json::Value) -> Result<serde_json::Value, RpcError> {
        self.throttle().await;

        let response = self
            .client
            .post(&self.url)
            .json(&json!({
                "jsonrpc": "2.0",
                "method": method,
                "params": params,
                "id": 1
            }))
            .send()
            .await
            .map_err(RpcError::transport)?;

        let status = response.status();
        if let Some(err) = classify_http_status(status, retry_after_hint(&response)) {
            debug!(%status, method, "rpc endpoint rejected request");
            return Err(err);
        }
        if !status.is_success() {
            return Err(RpcError::Transport(format!("http status {status}")));
        }

        let body: serde_json::Value = response.json().await.map_err(RpcError::transport)?;
        if let Some(error) = body.get("error").filter(|e| !e.is_null()) {
            let code = error.get("code").and_then(|c| c.as_i64());
            let message = error.get("message").and_then(|m| m.as_str()).unwrap_or("");
            return Err(classify_rpc_error(code, message));
        }

        body.get("result")
            .cloned()
            .ok_or_else(|| RpcError::Transport("response missing result".to_string()))
    }
}

#[async_trait]
impl EthRpc for EthRpcClient {
    async fn get_block_number(&self) -> Result<u64, RpcError> {
        let result = self.request("eth_blockNumber", json!([])).await?;
        let hex = result
            .as_str()
            .ok_or_else(|| RpcError::Transport("eth_blockNumber result is not a string".to_string()))?;
        parse_quantity(hex)
            .ok_or_else(|| RpcError::Transport(format!("bad block number quantity: {hex}")))
    }

    async fn get_logs(&self, filter: &LogFilter) -> Result<Vec<RpcLog>, RpcError> {
        let params = json!([{
            "fromBlock": format!("0x{:x}", filter.from_block),
            "toBlock": format!("0x{:x}", filter.to_block),
            "address": format!("0x{}", hex::encode(filter.address)),
            "topics": [format!("0x{}", hex::encode(filter.topic0))],
        }]);
        let result = self.request("eth_getLogs", params).await?;
        serde_json::from_value(result).map_err(RpcError::transport)
    }
}

pub fn parse_quantity(s: &str) -> Option<u64> {
    let trimmed = s.trim_start_matches("0x");
    u64::from_str_radix(trimmed, 16).ok()
}

fn retry_after_hint(response: &reqwest::Response) -> Option<Duration> {
    let raw = response.headers().get(RETRY_AFTER)?.to_str().ok()?;
    parse_retry_after(raw)
}

/// Retry-After carries either delta-seconds or an HTTP-date.
fn parse_retry_after(raw: &str) -> Option<Duration> {
    if let Ok(secs) = raw.trim().parse::<u64>() {
        return Some(Duration::from_secs(secs));
    }
    let when = chrono::DateTime::parse_from_rfc2822(raw.trim()).ok()?;
    let delta = when.signed_duration_since(chrono::Utc::now());
    delta.to_std().ok()
}

fn classify_http_status(status: StatusCode, hint: Option<Duration>) -> Option<RpcError> {
    match status.as_u16() {
        429 | 503 => {
            let retry_after = hint.unwrap_or(RETRY_AFTER_FLOOR).max(RETRY_AFTER_FLOOR);
            Some(RpcError::RateLimited { retry_after })
        }
        413 => Some(RpcError::BlockRangeTooLarge),
        _ => None,
    }
}

fn classify_rpc_error(code: Option<i64>, message: &str) -> RpcError {
    if let Some(code) = code {
        if RATE_LIMIT_CODES.contains(&code) {
            return RpcError::RateLimited {
                retry_after: RETRY_AFTER_FLOOR,
            };
        }
        if RANGE_CODES.contains(&code) {
            return RpcError::BlockRangeTooLarge;
        }
    }
    let lowered = message.to_ascii_lowercase();
    if lowered.contains("too large")
        || lowered.contains("range")
        || lowered.contains("-32062")
        || lowered.contains("-32602")
    {
        return RpcError::BlockRangeTooLarge;
    }
    RpcError::Transport(format!(
        "rpc error {}: {message}",
        code.map(|c| c.to_string()).unwrap_or_else(|| "?".to_string())
    ))
}
