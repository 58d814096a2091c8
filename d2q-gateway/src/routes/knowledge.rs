//! `/api/knowledge`: uploads, the knowledge tree and knowledge points.

use std::sync::Arc;

use axum::extract::multipart::MultipartRejection;
use axum::extract::{Multipart, State};
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use d2q_core::KnowledgeNode;
use d2q_core::tree::{build_tree, flatten};
use d2q_store::{DataFile, FileInfo, FileRepository, KnowledgeTreeRepository, StoredFile};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::{error, info, warn};

use crate::error::{ApiError, ApiResult};
use crate::routes::{ApiJson, ApiQuery, non_blank};
use crate::services::extraction;
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/file/upload", post(upload_file))
        .route("/file/upload-multiple", post(upload_multiple))
        .route("/file/list", get(list_files))
        .route("/tree/save", post(save_tree))
        .route("/tree/load", get(load_tree))
        .route("/point/extract", post(extract_points))
        .route("/point/list", get(list_points))
        .route("/point/delete", delete(delete_points))
}

#[derive(Debug, Serialize)]
struct UploadResponse {
    success: bool,
    message: String,
    #[serde(flatten)]
    file: StoredFile,
}

#[derive(Debug, Serialize)]
struct UploadMultipleResponse {
    success: bool,
    message: String,
    files: Vec<StoredFile>,
    /// Whether knowledge points are being extracted in the background
    extraction_started: bool,
}

#[derive(Debug, Serialize)]
struct FileListResponse {
    success: bool,
    files: Vec<FileInfo>,
}

#[derive(Debug, Deserialize)]
pub struct SaveTreeRequest {
    /// Flat or nested via `children`
    pub items: Vec<KnowledgeNode>,
}

#[derive(Debug, Deserialize)]
pub struct ExtractRequest {
    pub file_path: String,
    pub file_name: String,
    #[serde(default)]
    pub knowledge_item_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct PointsQuery {
    pub knowledge_item_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct DeletePointsQuery {
    pub knowledge_item_id: String,
}

/// POST /file/upload - store one document (multipart field `file`)
async fn upload_file(
    State(state): State<Arc<AppState>>,
    multipart: Result<Multipart, MultipartRejection>,
) -> ApiResult<Json<UploadResponse>> {
    let mut multipart = multipart?;
    while let Some(field) = multipart.next_field().await? {
        if field.name().unwrap_or_default() != "file" {
            continue;
        }
        let name = field.file_name().unwrap_or_default().to_string();
        let bytes = field.bytes().await?;
        let file = FileRepository::save_upload(&state.store, &name, &bytes).await?;
        return Ok(Json(UploadResponse {
            success: true,
            message: "File uploaded".to_string(),
            file,
        }));
    }
    Err(ApiError::BadRequest("Missing multipart field 'file'".to_string()))
}

/// POST /file/upload-multiple - store several documents (fields `files`),
/// optionally extracting knowledge points under `knowledge_item_id`
async fn upload_multiple(
    State(state): State<Arc<AppState>>,
    multipart: Result<Multipart, MultipartRejection>,
) -> ApiResult<Json<UploadMultipleResponse>> {
    let mut multipart = multipart?;
    let mut uploads = Vec::new();
    let mut knowledge_item_id = None;

    while let Some(field) = multipart.next_field().await? {
        let field_name = field.name().unwrap_or_default().to_string();
        match field_name.as_str() {
            "files" | "file" => {
                let name = field.file_name().unwrap_or_default().to_string();
                uploads.push((name, field.bytes().await?));
            }
            "knowledge_item_id" => {
                knowledge_item_id = Some(field.text().await?);
            }
            _ => {}
        }
    }
    if uploads.is_empty() {
        return Err(ApiError::BadRequest("No files in upload".to_string()));
    }

    let mut files = Vec::with_capacity(uploads.len());
    for (name, bytes) in &uploads {
        files.push(FileRepository::save_upload(&state.store, name, bytes).await?);
    }

    let document_id = non_blank(&knowledge_item_id).map(str::to_string);
    let extraction_started = match (&document_id, state.provider()) {
        (Some(document_id), Ok(provider)) => {
            for file in &files {
                let store = state.store.clone();
                let provider = provider.clone();
                let document_id = document_id.clone();
                let file_path = file.file_path.clone();
                let file_name = file.stored_name().to_string();
                tokio::spawn(async move {
                    match extraction::extract_and_merge(
                        &store,
                        provider.as_ref(),
                        &file_path,
                        &file_name,
                        Some(&document_id),
                    )
                    .await
                    {
                        Ok(outcome) => info!(
                            "Background extraction of {} added {} knowledge points",
                            file_name, outcome.added_count
                        ),
                        Err(e) => error!("Background extraction of {} failed: {}", file_name, e),
                    }
                });
            }
            true
        }
        (Some(_), Err(e)) => {
            warn!("Skipping knowledge point extraction: {}", e);
            false
        }
        (None, _) => false,
    };

    Ok(Json(UploadMultipleResponse {
        success: true,
        message: format!("Uploaded {} files", files.len()),
        files,
        extraction_started,
    }))
}

/// GET /file/list
async fn list_files(State(state): State<Arc<AppState>>) -> ApiResult<Json<FileListResponse>> {
    let files = FileRepository::list(&state.store).await?;
    Ok(Json(FileListResponse {
        success: true,
        files,
    }))
}

/// POST /tree/save - replace the whole knowledge tree
async fn save_tree(
    State(state): State<Arc<AppState>>,
    ApiJson(request): ApiJson<SaveTreeRequest>,
) -> ApiResult<Json<Value>> {
    let items = flatten(request.items);
    let count = KnowledgeTreeRepository::save(&state.store, items).await?;
    Ok(Json(json!({
        "success": true,
        "message": "Knowledge tree saved",
        "count": count,
        "file_path": state.store.path(DataFile::KnowledgeTree).display().to_string(),
    })))
}

/// GET /tree/load - flat items plus the nested tree
async fn load_tree(State(state): State<Arc<AppState>>) -> ApiResult<Json<Value>> {
    let items = KnowledgeTreeRepository::load(&state.store).await?;
    let tree = build_tree(&items);
    Ok(Json(json!({
        "success": true,
        "items": items,
        "tree": tree,
    })))
}

/// POST /point/extract - have the model list a document's directory
async fn extract_points(
    State(state): State<Arc<AppState>>,
    ApiJson(request): ApiJson<ExtractRequest>,
) -> ApiResult<Json<Value>> {
    let provider = state.provider()?;
    let outcome = extraction::extract_and_merge(
        &state.store,
        provider.as_ref(),
        &request.file_path,
        &request.file_name,
        non_blank(&request.knowledge_item_id),
    )
    .await?;

    Ok(Json(json!({
        "success": true,
        "message": format!("Extracted {} knowledge points", outcome.added_count),
        "added_count": outcome.added_count,
        "directory": outcome.directory,
    })))
}

/// GET /point/list?knowledge_item_id=
async fn list_points(
    State(state): State<Arc<AppState>>,
    ApiQuery(query): ApiQuery<PointsQuery>,
) -> ApiResult<Json<Value>> {
    let points =
        KnowledgeTreeRepository::list_points(&state.store, non_blank(&query.knowledge_item_id))
            .await?;
    Ok(Json(json!({
        "success": true,
        "knowledge_points": points,
    })))
}

/// DELETE /point/delete?knowledge_item_id= - remove everything below a node
async fn delete_points(
    State(state): State<Arc<AppState>>,
    ApiQuery(query): ApiQuery<DeletePointsQuery>,
) -> ApiResult<Json<Value>> {
    let id = query.knowledge_item_id.trim();
    if id.is_empty() {
        return Err(ApiError::BadRequest(
            "knowledge_item_id is required".to_string(),
        ));
    }
    let deleted_count = KnowledgeTreeRepository::delete_descendants(&state.store, id).await?;
    Ok(Json(json!({
        "success": true,
        "message": format!("Deleted {deleted_count} knowledge points"),
        "deleted_count": deleted_count,
    })))
}
