//! Introspection handlers exposing the raw node and closure tables.

use axum::{
    extract::{Path, State},
    Json,
};
use std::sync::Arc;

use crate::tree::NodeRepository;
use crate::web::dto::{
    ApiResponse, DebugClosureResponse, DebugNodesResponse, DebugSubtreeResponse, ItemsResponse,
    NodeResponse,
};
use crate::web::error::ApiError;
use crate::web::handlers::AppState;

/// GET /debug/nodes - Every node row.
pub async fn debug_nodes(
    State(state): State<Arc<AppState>>,
) -> Result<Json<ApiResponse<DebugNodesResponse>>, ApiError> {
    let nodes = NodeRepository::new(state.db.pool()).list_all().await?;
    let items: Vec<NodeResponse> = nodes.into_iter().map(Into::into).collect();
    Ok(Json(ApiResponse::new(ItemsResponse::new(items))))
}

/// GET /debug/closure - Every closure row with both endpoint paths.
pub async fn debug_closure(
    State(state): State<Arc<AppState>>,
) -> Result<Json<ApiResponse<DebugClosureResponse>>, ApiError> {
    let rows = NodeRepository::new(state.db.pool()).closure_rows().await?;
    Ok(Json(ApiResponse::new(ItemsResponse::new(rows))))
}

/// GET /debug/subtree/:id - A node and everything below it.
pub async fn debug_subtree(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<Json<ApiResponse<DebugSubtreeResponse>>, ApiError> {
    let repo = NodeRepository::new(state.db.pool());

    if repo.get_by_id(id).await?.is_none() {
        return Err(ApiError::not_found(format!("node {id} not found")));
    }

    let items = repo.subtree(id).await?;
    Ok(Json(ApiResponse::new(DebugSubtreeResponse {
        root_id: id,
        count: items.len(),
        items,
    })))
}
