//! HTTP routes for the Collate server

use axum::{
    extract::DefaultBodyLimit,
    routing::get,
    Json, Router,
};
use serde::Serialize;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::state::AppState;

pub mod files;
pub mod pages;

/// Health check response
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

/// GET /health
async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// Build the complete application router
pub fn app(state: AppState) -> Router {
    let max_upload = state.config().limits.max_upload_bytes;

    let cors = CorsLayer::new()
        .allow_origin(tower_http::cors::Any)
        .allow_methods(tower_http::cors::Any)
        .allow_headers(tower_http::cors::Any);

    Router::new()
        .route("/health", get(health_check))
        .route("/api/v1/health", get(health_check))
        .nest(
            "/api/v1/pages",
            pages::router().layer(DefaultBodyLimit::max(max_upload)),
        )
        .nest("/api/v1/files", files::router())
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
