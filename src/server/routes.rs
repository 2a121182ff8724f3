//! API routes, mounted under `/api`.
//!
//! | Method | Path | Handler |
//! |--------|------|---------|
//! | POST | `/upload` | [`upload`] |
//! | POST | `/resize` | [`resize`] |
//! | GET | `/progress/:task_id` | [`progress`] |
//! | GET | `/download/:task_id` | [`download`] |
//! | DELETE | `/cleanup/:task_id` | [`cleanup`] |

use super::error::ApiError;
use super::state::AppState;
use crate::imaging::ImageBackend;
use crate::store::FileId;
use crate::task::{ProgressSnapshot, ResizeRequest, TaskId};
use axum::{
    Json, Router,
    body::Body,
    extract::{DefaultBodyLimit, Multipart, Path, State, rejection::JsonRejection},
    http::{
        HeaderMap, StatusCode,
        header::{CONTENT_DISPOSITION, CONTENT_TYPE, ETAG, IF_NONE_MATCH},
    },
    response::{IntoResponse, Response},
    routing::{delete, get, post},
};
use bytes::{Bytes, BytesMut};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

type UploadedPart = (Bytes, String, String);

/// Headroom for multipart boundaries and part headers on top of file bytes.
const MULTIPART_OVERHEAD: usize = 1024 * 1024;

/// Build all API routes
pub fn api_routes(state: &AppState) -> Router<AppState> {
    let limits = state.uploads();
    let upload_limit = limits
        .max_file_size
        .saturating_mul(limits.max_files)
        .saturating_add(MULTIPART_OVERHEAD);

    Router::new()
        .route(
            "/upload",
            post(upload).layer(DefaultBodyLimit::max(upload_limit)),
        )
        .route("/resize", post(resize))
        .route("/progress/:task_id", get(progress))
        .route("/download/:task_id", get(download))
        .route("/cleanup/:task_id", delete(cleanup))
}

#[derive(Debug, Serialize, Deserialize)]
pub struct UploadResponse {
    pub file_ids: Vec<FileId>,
    pub total: usize,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ResizeResponse {
    pub task_id: TaskId,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CleanupResponse {
    pub status: String,
}

/// POST /api/upload - Store every image part of a multipart body
///
/// All-or-nothing: nothing is stored unless every part is accepted. Each part
/// must carry an `image/*` content type and decode far enough to read its
/// dimensions.
pub async fn upload(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<UploadResponse>, ApiError> {
    let limits = state.uploads();
    let mut files = Vec::new();

    while let Some(mut field) = multipart.next_field().await? {
        // Plain form fields carry no file
        let Some(filename) = field.file_name().map(str::to_string) else {
            continue;
        };
        let content_type = field
            .content_type()
            .unwrap_or("application/octet-stream")
            .to_string();
        if !content_type.starts_with("image/") {
            return Err(ApiError::BadRequest(format!(
                "File {filename} is not an image ({content_type})"
            )));
        }
        if files.len() == limits.max_files {
            return Err(ApiError::PayloadTooLarge(format!(
                "At most {} files may be uploaded at once",
                limits.max_files
            )));
        }

        let mut data = BytesMut::new();
        while let Some(chunk) = field.chunk().await? {
            if data.len() + chunk.len() > limits.max_file_size {
                return Err(ApiError::PayloadTooLarge(format!(
                    "File {filename} exceeds the {} byte limit",
                    limits.max_file_size
                )));
            }
            data.extend_from_slice(&chunk);
        }
        files.push((data.freeze(), filename, content_type));
    }

    if files.is_empty() {
        return Err(ApiError::BadRequest("No files uploaded".into()));
    }

    let backend = Arc::clone(state.backend());
    let files = tokio::task::spawn_blocking(move || identify_all(backend.as_ref(), files))
        .await
        .map_err(|e| ApiError::Internal(format!("upload check failed: {e}")))??;

    let store = state.store();
    let file_ids: Vec<FileId> = files
        .into_iter()
        .map(|(bytes, filename, content_type)| store.put(bytes, filename, content_type))
        .collect();
    tracing::info!(count = file_ids.len(), "stored uploads");

    Ok(Json(UploadResponse {
        total: file_ids.len(),
        file_ids,
    }))
}

/// Reject the whole upload if any part does not read as a supported image.
fn identify_all(
    backend: &dyn ImageBackend,
    files: Vec<UploadedPart>,
) -> Result<Vec<UploadedPart>, ApiError> {
    for (bytes, filename, _) in &files {
        let dims = backend.identify(bytes).map_err(|e| {
            ApiError::BadRequest(format!("File {filename} is not a readable image: {e}"))
        })?;
        tracing::debug!(
            file = %filename,
            width = dims.width,
            height = dims.height,
            "upload identified"
        );
    }
    Ok(files)
}

/// POST /api/resize - Start a resize task
pub async fn resize(
    State(state): State<AppState>,
    payload: Result<Json<ResizeRequest>, JsonRejection>,
) -> Result<Json<ResizeResponse>, ApiError> {
    let Json(request) = payload?;
    let task_id = state.manager().create_task(&request)?;
    Ok(Json(ResizeResponse { task_id }))
}

/// GET /api/progress/:task_id - Poll a task
pub async fn progress(
    State(state): State<AppState>,
    Path(task_id): Path<String>,
) -> Result<Json<ProgressSnapshot>, ApiError> {
    Ok(Json(state.manager().progress(&TaskId::from(task_id))?))
}

/// GET /api/download/:task_id - Fetch the packaged result
pub async fn download(
    State(state): State<AppState>,
    Path(task_id): Path<String>,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    let artifact = state.manager().result(&TaskId::from(task_id))?;
    let etag = format!("\"{}\"", artifact.etag);

    let cached = headers
        .get(IF_NONE_MATCH)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v == etag);
    if cached {
        return Ok((StatusCode::NOT_MODIFIED, [(ETAG, etag)]).into_response());
    }

    let disposition = format!("attachment; filename=\"{}\"", artifact.filename);
    Ok((
        [
            (CONTENT_TYPE, artifact.content_type.clone()),
            (CONTENT_DISPOSITION, disposition),
            (ETAG, etag),
        ],
        Body::from(artifact.bytes.clone()),
    )
        .into_response())
}

/// DELETE /api/cleanup/:task_id - Drop a task and its uploads
pub async fn cleanup(
    State(state): State<AppState>,
    Path(task_id): Path<String>,
) -> Result<Json<CleanupResponse>, ApiError> {
    state.manager().cleanup(&TaskId::from(task_id))?;
    Ok(Json(CleanupResponse {
        status: "cleaned".to_string(),
    }))
}
