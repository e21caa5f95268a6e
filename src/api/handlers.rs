use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use serde_json::{json, Value};
use std::{collections::HashMap, sync::Arc};

use super::types::ApiError;
use super::AppState;
use crate::db::parse_address;
use crate::holders::HoldersPage;
use crate::indexer::ChainProgress;

pub async fn root() -> Json<Value> {
    Json(json!({ "message": "Holder Indexer API is running" }))
}

/// GET /token/:address/holders?chainId=&cursor=&limit=
pub async fn get_token_holders(
    State(state): State<Arc<AppState>>,
    Path(address): Path<String>,
    Query(params): Query<HashMap<String, String>>,
) -> Result<Json<HoldersPage>, ApiError> {
    let chain_param = params.get("chainId").ok_or(ApiError::MissingChain)?;
    let chain_id: u64 = chain_param.parse().map_err(|_| ApiError::InvalidChain)?;
    let token = parse_address(&address).ok_or(ApiError::InvalidToken)?;

    let cursor = params.get("cursor").map(String::as_str);
    let limit = params.get("limit").and_then(|l| l.parse::<i64>().ok());

    let page = state
        .engine
        .get_holders(chain_id, token, cursor, limit)
        .await?;
    Ok(Json(page))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReindexRequest {
    chain_id: Value,
    token: String,
    #[serde(default)]
    from_block: Option<Value>,
}

/// POST /admin/reindex — fire-and-forget cursor reset. 202 promises only
/// that the request was recorded, not that holder data exists yet.
pub async fn admin_reindex(
    State(state): State<Arc<AppState>>,
    Json(body): Json<ReindexRequest>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    let chain_id = parse_uint(&body.chain_id).ok_or(ApiError::InvalidChain)?;
    if !state.chains.is_supported(chain_id) {
        return Err(ApiError::UnsupportedChain);
    }
    let token = parse_address(body.token.trim()).ok_or(ApiError::InvalidToken)?;
    let from_block = match &body.from_block {
        None | Some(Value::Null) => None,
        Some(value) => Some(parse_uint(value).ok_or(ApiError::InvalidFromBlock)?),
    };

    state.store.enqueue_reindex(chain_id, token, from_block).await?;

    tracing::info!(
        chain_id,
        token = %body.token.trim().to_ascii_lowercase(),
        from_block,
        "reindex enqueued"
    );
    Ok((StatusCode::ACCEPTED, Json(json!({ "ok": true }))))
}

pub async fn get_status(State(state): State<Arc<AppState>>) -> Json<Vec<ChainProgress>> {
    Json(state.status.snapshot())
}

/// Accepts a JSON number or a decimal string; anything else (floats,
/// negatives, garbage) is rejected.
fn parse_uint(value: &Value) -> Option<u64> {
    match value {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => {
            let trimmed = s.trim();
            if trimmed.is_empty() || !trimmed.chars().all(|c| c.is_ascii_digit()) {
                return None;
            }
            trimmed.parse().ok()
        }
        _ => None,
    }
}
