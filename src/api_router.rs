//! Central API router.
//!
//! Every module exposes a `configure()` returning its own `Router`; this
//! merges them into the single route table the server binds.

use axum::routing::get;
use axum::{Json, Router};
use std::sync::Arc;

use crate::shared::state::AppState;

/// Configure all API routes from all modules.
pub fn configure_api_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/health", get(health))
        .merge(crate::auth::configure())
        .merge(crate::accounts::configure())
        .merge(crate::stories::configure())
        .merge(crate::stories::engagement::configure())
        .merge(crate::stories::episodes::configure())
        .merge(crate::stories::versions::configure())
        .merge(crate::moderation::configure())
        .merge(crate::admin::configure())
}

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}
