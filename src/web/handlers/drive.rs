//! Drive handlers for Web API.

use axum::{
    body::Body,
    extract::{Multipart, Query, State},
    http::header,
    response::{IntoResponse, Response},
    Json,
};
use std::path::PathBuf;
use std::sync::Arc;

use crate::drive::{package_subtree, DownloadTarget, FileInfo, Upload};
use crate::tree::path;
use crate::web::dto::{
    ApiResponse, CreateDirQuery, CreateDirResponse, DeleteResponse, DirNameQuery, ListQuery,
    MoveQuery, NameQuery, NodeResponse, RelocateResponse, RenameQuery, UploadMeta,
    UploadResponse, ValidatedQuery,
};
use crate::web::error::ApiError;
use crate::web::handlers::AppState;

/// Build a Content-Disposition value that cannot inject headers.
///
/// Control characters are dropped, quotes and backslashes are replaced in the
/// plain `filename` fallback, and non-ASCII names also get an RFC 5987
/// `filename*` parameter.
fn content_disposition_header(filename: &str) -> String {
    let needs_encoding = !filename.is_ascii()
        || filename
            .chars()
            .any(|c| c.is_control() || c == '"' || c == '\\');

    if !needs_encoding {
        return format!("attachment; filename=\"{filename}\"");
    }

    let fallback: String = filename
        .chars()
        .filter(|c| !c.is_control())
        .map(|c| if c == '"' || c == '\\' { '_' } else { c })
        .collect();
    let encoded = urlencoding::encode(filename);

    format!("attachment; filename=\"{fallback}\"; filename*=UTF-8''{encoded}")
}

fn attachment(
    filename: &str,
    content_type: &str,
    content: Vec<u8>,
) -> Result<Response, ApiError> {
    Response::builder()
        .header(header::CONTENT_TYPE, content_type)
        .header(
            header::CONTENT_DISPOSITION,
            content_disposition_header(filename),
        )
        .header(header::CONTENT_LENGTH, content.len())
        .body(Body::from(content))
        .map_err(|e| {
            tracing::error!("Failed to build response: {}", e);
            ApiError::internal("Failed to build response")
        })
}

async fn archive_response(name: &str, location: PathBuf) -> Result<Response, ApiError> {
    let archive = tokio::task::spawn_blocking(move || package_subtree(&location))
        .await
        .map_err(|e| {
            tracing::error!("Archive task failed: {}", e);
            ApiError::internal("Failed to build archive")
        })??;

    attachment(&format!("{name}.zip"), "application/zip", archive)
}

/// GET / - Service greeting.
pub async fn index() -> &'static str {
    "singledrive file storage"
}

/// GET /list - Nested tree, or a flat list with `format=simple|flat`.
pub async fn list(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ListQuery>,
) -> Result<Response, ApiError> {
    let drive = state.drive();

    if query.is_flat() {
        let nodes: Vec<NodeResponse> = drive.list().await?.into_iter().map(Into::into).collect();
        return Ok(Json(ApiResponse::new(nodes)).into_response());
    }

    let tree = drive.tree().await?;
    Ok(Json(ApiResponse::new(tree)).into_response())
}

/// POST /upload - Multipart upload.
///
/// Fields: `file` (required), `meta` (JSON `{"name", "size"}`), `path`
/// (destination directory) and `parent_id` (destination directory id).
pub async fn upload(
    State(state): State<Arc<AppState>>,
    mut multipart: Multipart,
) -> Result<Json<ApiResponse<UploadResponse>>, ApiError> {
    let mut filename: Option<String> = None;
    let mut content: Option<Vec<u8>> = None;
    let mut meta = UploadMeta::default();
    let mut directory = String::new();
    let mut parent_id: Option<i64> = None;

    while let Some(field) = multipart.next_field().await.map_err(|e| {
        tracing::error!("Failed to read multipart field: {}", e);
        ApiError::bad_request("Invalid multipart data")
    })? {
        let name = field.name().unwrap_or("").to_string();

        match name.as_str() {
            "file" => {
                filename = field.file_name().map(|s| s.to_string());
                content = Some(
                    field
                        .bytes()
                        .await
                        .map_err(|e| {
                            tracing::error!("Failed to read file content: {}", e);
                            ApiError::bad_request("Failed to read file")
                        })?
                        .to_vec(),
                );
            }
            "meta" => {
                let text = field
                    .text()
                    .await
                    .map_err(|_| ApiError::bad_request("Invalid meta field"))?;
                if !text.trim().is_empty() {
                    meta = serde_json::from_str(&text)
                        .map_err(|e| ApiError::bad_request(format!("Invalid meta JSON: {e}")))?;
                }
            }
            "path" => {
                directory = field
                    .text()
                    .await
                    .map_err(|_| ApiError::bad_request("Invalid path field"))?;
            }
            "parent_id" => {
                let text = field
                    .text()
                    .await
                    .map_err(|_| ApiError::bad_request("Invalid parent_id field"))?;
                let text = text.trim();
                if !text.is_empty() {
                    parent_id = Some(
                        text.parse()
                            .map_err(|_| ApiError::bad_request("parent_id must be an integer"))?,
                    );
                }
            }
            _ => {}
        }
    }

    let content = content.ok_or_else(|| ApiError::bad_request("No file provided"))?;

    if content.len() as u64 > state.max_upload_size {
        let max_mb = state.max_upload_size / 1024 / 1024;
        return Err(ApiError::bad_request(format!(
            "File too large (max {}MB)",
            max_mb
        )));
    }

    let name = meta
        .name
        .filter(|n| !n.trim().is_empty())
        .or(filename)
        .ok_or_else(|| ApiError::bad_request("No file name provided"))?;

    let upload = Upload {
        directory,
        parent_id,
        name,
        declared_size: meta.size,
        content,
    };

    let ingested = state.drive().upload(&upload).await?;
    Ok(Json(ApiResponse::new(ingested.into())))
}

/// DELETE /delete?name= - Delete a file or empty directory.
pub async fn delete_file(
    State(state): State<Arc<AppState>>,
    ValidatedQuery(query): ValidatedQuery<NameQuery>,
) -> Result<Json<ApiResponse<DeleteResponse>>, ApiError> {
    let deleted = state.drive().delete(&query.name).await?;
    Ok(Json(ApiResponse::new(deleted.into())))
}

/// DELETE /deletedir?dirname= - Delete a directory and everything below it.
pub async fn delete_dir(
    State(state): State<Arc<AppState>>,
    ValidatedQuery(query): ValidatedQuery<DirNameQuery>,
) -> Result<Json<ApiResponse<DeleteResponse>>, ApiError> {
    let deleted = state.drive().delete_tree(&query.dirname).await?;
    Ok(Json(ApiResponse::new(deleted.into())))
}

/// GET /download?name= - File content, or a zip for a directory.
pub async fn download(
    State(state): State<Arc<AppState>>,
    ValidatedQuery(query): ValidatedQuery<NameQuery>,
) -> Result<Response, ApiError> {
    match state.drive().download(&query.name).await? {
        DownloadTarget::File { node, content } => {
            let content_type = mime_guess::from_path(node.name())
                .first_or_octet_stream()
                .to_string();
            attachment(node.name(), &content_type, content)
        }
        DownloadTarget::Directory { node, location } => archive_response(node.name(), location).await,
    }
}

/// GET /downloaddir?dirname= - Zip of a directory.
pub async fn download_dir(
    State(state): State<Arc<AppState>>,
    ValidatedQuery(query): ValidatedQuery<DirNameQuery>,
) -> Result<Response, ApiError> {
    match state.drive().download(&query.dirname).await? {
        DownloadTarget::Directory { node, location } => archive_response(node.name(), location).await,
        DownloadTarget::File { node, .. } => Err(ApiError::bad_request(format!(
            "'{}' is not a directory",
            node.path
        ))),
    }
}

/// POST /createdir?path= - Create a directory and any missing parents.
pub async fn create_dir(
    State(state): State<Arc<AppState>>,
    ValidatedQuery(query): ValidatedQuery<CreateDirQuery>,
) -> Result<Json<ApiResponse<CreateDirResponse>>, ApiError> {
    let dir = path::normalize_dir(&query.path)?;
    if dir.is_empty() {
        return Err(ApiError::bad_request("path must name a directory"));
    }

    let created = state.drive().create_dir(&dir).await?;
    Ok(Json(ApiResponse::new(created.into())))
}

/// PUT /rename?oldName=&newName= - Rename the last segment of a path.
pub async fn rename(
    State(state): State<Arc<AppState>>,
    ValidatedQuery(query): ValidatedQuery<RenameQuery>,
) -> Result<Json<ApiResponse<RelocateResponse>>, ApiError> {
    let renamed = state
        .drive()
        .rename(&query.old_name, &query.new_name)
        .await?;
    Ok(Json(ApiResponse::new(renamed.into())))
}

/// PUT /move?oldpath=&newparent= - Move a node under another directory.
pub async fn move_node(
    State(state): State<Arc<AppState>>,
    ValidatedQuery(query): ValidatedQuery<MoveQuery>,
) -> Result<Json<ApiResponse<RelocateResponse>>, ApiError> {
    let moved = state
        .drive()
        .move_node(&query.oldpath, &query.newparent)
        .await?;
    Ok(Json(ApiResponse::new(moved.into())))
}

/// GET /info?name= - Filesystem stat.
pub async fn info(
    State(state): State<Arc<AppState>>,
    ValidatedQuery(query): ValidatedQuery<NameQuery>,
) -> Result<Json<ApiResponse<FileInfo>>, ApiError> {
    let info = state.drive().info(&query.name)?;
    Ok(Json(ApiResponse::new(info)))
}
