//! EthRpcClient against a throwaway local endpoint: rate-limit handling
//! with Retry-After, range rejection, the request-rate floor, and log
//! fetching end to end.

use axum::extract::State;
use axum::http::{HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};
use serde_json::{json, Value};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tokio::net::TcpListener;

use evm_holder_indexer::eth_rpc::{EthRpc, EthRpcClient, LogFilter, RpcError};
use evm_holder_indexer::indexer::{decode_transfers, TRANSFER_TOPIC};

struct CannedResponse {
    status: StatusCode,
    retry_after: Option<&'static str>,
    body: Value,
}

impl CannedResponse {
    fn ok(result: Value) -> Self {
        Self {
            status: StatusCode::OK,
            retry_after: None,
            body: json!({ "jsonrpc": "2.0", "id": 1, "result": result }),
        }
    }

    fn rpc_error(code: i64, message: &str) -> Self {
        Self {
            status: StatusCode::OK,
            retry_after: None,
            body: json!({
                "jsonrpc": "2.0",
                "id": 1,
                "error": { "code": code, "message": message }
            }),
        }
    }

    fn status_only(status: StatusCode) -> Self {
        Self {
            status,
            retry_after: None,
            body: json!({}),
        }
    }
}

#[derive(Default)]
struct MockEndpoint {
    responses: Mutex<VecDeque<CannedResponse>>,
    hits: Mutex<Vec<Instant>>,
}

impl MockEndpoint {
    fn push(&self, response: CannedResponse) {
        self.responses.lock().unwrap().push_back(response);
    }

    fn hits(&self) -> Vec<Instant> {
        self.hits.lock().unwrap().clone()
    }
}

async fn handler(State(state): State<Arc<MockEndpoint>>) -> Response {
    state.hits.lock().unwrap().push(Instant::now());
    let canned = state
        .responses
        .lock()
        .unwrap()
        .pop_front()
        .unwrap_or_else(|| CannedResponse::ok(json!("0x0")));

    let mut response = (canned.status, Json(canned.body)).into_response();
    if let Some(retry_after) = canned.retry_after {
        response
            .headers_mut()
            .insert("retry-after", HeaderValue::from_static(retry_after));
    }
    response
}

async fn spawn_endpoint() -> (String, Arc<MockEndpoint>) {
    let state = Arc::new(MockEndpoint::default());
    let app = Router::new()
        .route("/", post(handler))
        .with_state(state.clone());
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (format!("http://{addr}"), state)
}

fn sample_filter() -> LogFilter {
    LogFilter {
        from_block: 1,
        to_block: 1000,
        address: "0xbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbb".parse().unwrap(),
        topic0: TRANSFER_TOPIC,
    }
}

#[tokio::test]
async fn block_number_round_trips() {
    let (url, endpoint) = spawn_endpoint().await;
    endpoint.push(CannedResponse::ok(json!("0x64")));

    let client = EthRpcClient::new(url, Duration::ZERO);
    assert_eq!(client.get_block_number().await.unwrap(), 100);
}

#[tokio::test]
async fn rate_limited_call_recovers_after_the_hinted_delay() {
    let (url, endpoint) = spawn_endpoint().await;
    endpoint.push(CannedResponse {
        status: StatusCode::TOO_MANY_REQUESTS,
        retry_after: Some("2"),
        body: json!({}),
    });
    endpoint.push(CannedResponse::ok(json!("0x64")));

    let client = EthRpcClient::new(url, Duration::ZERO);

    let retry_after = match client.get_block_number().await {
        Err(RpcError::RateLimited { retry_after }) => retry_after,
        other => panic!("expected RateLimited, got {other:?}"),
    };
    assert_eq!(retry_after, Duration::from_secs(2));

    // What the poller's outer loop does: sleep the hint, then retry.
    tokio::time::sleep(retry_after).await;
    assert_eq!(client.get_block_number().await.unwrap(), 100);

    let hits = endpoint.hits();
    assert_eq!(hits.len(), 2);
    let gap = hits[1].duration_since(hits[0]);
    assert!(gap >= Duration::from_secs(2), "gap was {gap:?}");
    assert!(gap < Duration::from_millis(3500), "gap was {gap:?}");
}

#[tokio::test]
async fn request_rate_floor_spaces_consecutive_calls() {
    let (url, _endpoint) = spawn_endpoint().await;

    // qps = 5 -> 200ms between requests.
    let client = EthRpcClient::new(url, EthRpcClient::min_delay_for(5, None));

    let started = Instant::now();
    for _ in 0..3 {
        client.get_block_number().await.unwrap();
    }
    // Two enforced gaps of 200ms each.
    assert!(started.elapsed() >= Duration::from_millis(400));
}

#[tokio::test]
async fn range_rejections_are_discriminated() {
    let (url, endpoint) = spawn_endpoint().await;
    let client = EthRpcClient::new(url, Duration::ZERO);

    endpoint.push(CannedResponse::rpc_error(-32062, "requested range too wide"));
    assert!(matches!(
        client.get_logs(&sample_filter()).await,
        Err(RpcError::BlockRangeTooLarge)
    ));

    endpoint.push(CannedResponse::rpc_error(
        -32000,
        "query returned more than 10000 results, narrow the block range",
    ));
    assert!(matches!(
        client.get_logs(&sample_filter()).await,
        Err(RpcError::BlockRangeTooLarge)
    ));

    endpoint.push(CannedResponse::status_only(StatusCode::PAYLOAD_TOO_LARGE));
    assert!(matches!(
        client.get_logs(&sample_filter()).await,
        Err(RpcError::BlockRangeTooLarge)
    ));
}

#[tokio::test]
async fn rpc_level_rate_limits_are_discriminated() {
    let (url, endpoint) = spawn_endpoint().await;
    let client = EthRpcClient::new(url, Duration::ZERO);

    endpoint.push(CannedResponse::rpc_error(-32005, "request rate exceeded"));
    match client.get_block_number().await {
        Err(RpcError::RateLimited { retry_after }) => {
            assert!(retry_after >= Duration::from_secs(1))
        }
        other => panic!("expected RateLimited, got {other:?}"),
    }
}

#[tokio::test]
async fn other_failures_are_transport_errors() {
    let (url, endpoint) = spawn_endpoint().await;
    let client = EthRpcClient::new(url, Duration::ZERO);

    endpoint.push(CannedResponse::status_only(StatusCode::INTERNAL_SERVER_ERROR));
    assert!(matches!(
        client.get_block_number().await,
        Err(RpcError::Transport(_))
    ));

    endpoint.push(CannedResponse::rpc_error(-32000, "header not found"));
    assert!(matches!(
        client.get_block_number().await,
        Err(RpcError::Transport(_))
    ));
}

#[tokio::test]
async fn fetched_logs_decode_into_transfers() {
    let (url, endpoint) = spawn_endpoint().await;
    endpoint.push(CannedResponse::ok(json!([{
        "address": "0xbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbb",
        "topics": [
            "0xddf252ad1be2c89b69c2b068fc378daa952ba7f163c4a11628f55a4df523b3ef",
            "0x0000000000000000000000000000000000000000000000000000000000000000",
            "0x000000000000000000000000aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa"
        ],
        "data": "0x00000000000000000000000000000000000000000000000000000000000003e8",
        "blockNumber": "0x64",
        "transactionHash": "0x1111111111111111111111111111111111111111111111111111111111111111",
        "logIndex": "0x0",
        "removed": false
    }])));

    let client = EthRpcClient::new(url, Duration::ZERO);
    let logs = client.get_logs(&sample_filter()).await.unwrap();
    assert_eq!(logs.len(), 1);
    assert_eq!(logs[0].block_number(), Some(100));

    let transfers = decode_transfers(&logs);
    assert_eq!(transfers.len(), 1);
    assert_eq!(
        transfers[0].to,
        "0xaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa"
            .parse::<alloy_primitives::Address>()
            .unwrap()
    );
    assert_eq!(transfers[0].value, num_bigint::BigUint::from(1000u32));
}
