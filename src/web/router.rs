//! Router configuration for Web API.

use axum::{
    extract::DefaultBodyLimit,
    routing::{delete, get, post, put},
    Router,
};
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;

use super::handlers::{
    create_dir, debug_closure, debug_nodes, debug_subtree, delete_dir, delete_file, download,
    download_dir, index, info, list, move_node, rename, upload, AppState,
};
use super::middleware::create_cors_layer;

/// Room for multipart framing on top of the upload limit.
const MULTIPART_OVERHEAD: usize = 64 * 1024;

/// Create the main API router.
pub fn create_router(app_state: Arc<AppState>, cors_origins: &[String]) -> Router {
    let body_limit = usize::try_from(app_state.max_upload_size)
        .unwrap_or(usize::MAX)
        .saturating_add(MULTIPART_OVERHEAD);

    // Drive routes
    let drive_routes = Router::new()
        .route("/", get(index))
        .route("/list", get(list))
        .route("/upload", post(upload))
        .route("/delete", delete(delete_file))
        .route("/deletedir", delete(delete_dir))
        .route("/download", get(download))
        .route("/downloaddir", get(download_dir))
        .route("/createdir", post(create_dir))
        .route("/rename", put(rename))
        .route("/move", put(move_node))
        .route("/info", get(info));

    // Introspection routes
    let debug_routes = Router::new()
        .route("/nodes", get(debug_nodes))
        .route("/closure", get(debug_closure))
        .route("/subtree/:id", get(debug_subtree));

    Router::new()
        .merge(drive_routes)
        .nest("/debug", debug_routes)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(create_cors_layer(cors_origins))
                .layer(DefaultBodyLimit::max(body_limit)),
        )
        .with_state(app_state)
}

/// Create a health check router.
pub fn create_health_router() -> Router {
    Router::new().route("/health", get(health_check))
}

/// Health check handler.
async fn health_check() -> &'static str {
    "OK"
}
