//! Router configuration for the web server.

use axum::extract::DefaultBodyLimit;
use axum::{
    routing::{get, post},
    Router,
};
use tower_http::cors::CorsLayer;

use super::handlers;
use super::AppState;

/// Largest accepted upload.
const MAX_UPLOAD_BYTES: usize = 100 * 1024 * 1024;

/// Create the main router with all routes.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(handlers::dashboard))
        .route("/upload", post(handlers::upload_document))
        .route("/reload", post(handlers::reload_pipeline))
        // JSON API
        .route("/api/documents", get(handlers::api_documents))
        .route("/api/documents/:id", get(handlers::api_document))
        .route("/api/status", get(handlers::api_status))
        .route("/static/style.css", get(handlers::serve_css))
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        .layer(CorsLayer::permissive())
        .with_state(state)
}
