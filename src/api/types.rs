use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

use crate::db::StoreError;
use crate::holders::QueryError;

/// API-surface errors. Validation failures carry the exact wire codes the
/// admin console and frontend match on.
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("chainId query parameter is required")]
    MissingChain,

    #[error("chainId is not a valid chain id")]
    InvalidChain,

    #[error("chain is not supported")]
    UnsupportedChain,

    #[error("token is not a 20-byte hex address")]
    InvalidToken,

    #[error("fromBlock is not a non-negative integer")]
    InvalidFromBlock,

    #[error("pagination cursor is malformed")]
    InvalidCursor,

    #[error("store error: {0}")]
    Database(#[from] StoreError),

    #[error("internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl From<QueryError> for ApiError {
    fn from(e: QueryError) -> Self {
        match e {
            QueryError::UnsupportedChain(_) => ApiError::UnsupportedChain,
            QueryError::InvalidCursor => ApiError::InvalidCursor,
            QueryError::Store(e) => ApiError::Database(e),
        }
    }
}

impl ApiError {
    fn wire_code(&self) -> (StatusCode, &'static str) {
        match self {
            ApiError::MissingChain => (StatusCode::BAD_REQUEST, "missing_chain"),
            ApiError::InvalidChain => (StatusCode::BAD_REQUEST, "invalid_chain"),
            ApiError::UnsupportedChain => (StatusCode::BAD_REQUEST, "unsupported_chain"),
            ApiError::InvalidToken => (StatusCode::BAD_REQUEST, "invalid_token"),
            ApiError::InvalidFromBlock => (StatusCode::BAD_REQUEST, "invalid_from_block"),
            ApiError::InvalidCursor => (StatusCode::BAD_REQUEST, "invalid_cursor"),
            ApiError::Database(_) | ApiError::Internal(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "internal_error")
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code) = self.wire_code();
        if status.is_server_error() {
            tracing::error!(error = %self, "api request failed");
        }
        let body = json!({ "error": code });
        (status, axum::Json(body)).into_response()
    }
}
