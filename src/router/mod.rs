use axum::http::Method;
use axum::routing::{get, post};
use axum::{middleware, Json, Router};
use serde_json::{json, Value};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::config::Config;
use crate::observability::correlation::request_id_middleware;
use crate::state::AppState;

pub mod api;
pub mod lnservice;
pub mod webhooks;

#[cfg(test)]
#[path = "tests.rs"]
mod tests;

/// Assemble the full HTTP surface. Route paths come from the configuration
/// so deployments can move the contexts without code changes.
pub fn build_router(config: &Config, state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST])
        .allow_origin(Any)
        .allow_headers(Any);

    Router::new()
        .route(&config.api_ctx, post(api::handle_rpc))
        .route(
            &config.withdraw_request_path(),
            get(lnservice::handle_withdraw_request),
        )
        .route(&config.withdraw_path(), get(lnservice::handle_withdraw))
        .route(&config.webhooks_ctx, post(webhooks::handle_batch_webhook))
        .route("/health", get(health_check))
        .with_state(state)
        .layer(middleware::from_fn(request_id_middleware))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}

async fn health_check() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}
