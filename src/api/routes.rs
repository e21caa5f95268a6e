use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;

use super::{handlers, AppState};

pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(handlers::root))
        .route("/token/:address/holders", get(handlers::get_token_holders))
        .route("/admin/reindex", post(handlers::admin_reindex))
        .route("/api/status", get(handlers::get_status))
        .with_state(state)
}
