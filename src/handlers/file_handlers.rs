//! HTTP handlers for the encrypted file endpoints.
//!
//! Handlers stay thin: resolve the caller, pull the payload out of the
//! request, and delegate to `VaultService`. All error mapping happens in
//! `AppError` conversions.

use crate::{
    auth::Owner,
    errors::AppError,
    models::stored_file::StoredFile,
    state::AppState,
};
use axum::{
    Json,
    body::Body,
    extract::{Multipart, Path, State},
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use bytes::Bytes;
use serde_json::json;
use uuid::Uuid;

/// POST `/files` — encrypt and store one multipart file part.
///
/// Expects a single part named `file` carrying a filename. Responds with the
/// record id (used to address downloads) and the storage locator.
pub async fn upload_file(
    State(state): State<AppState>,
    Owner(owner_id): Owner,
    mut multipart: Multipart,
) -> Result<impl IntoResponse, AppError> {
    let mut upload: Option<(String, Option<String>, Bytes)> = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|err| AppError::new(StatusCode::BAD_REQUEST, format!("invalid multipart body: {err}")))?
    {
        if field.name() != Some("file") {
            continue;
        }
        let filename = field
            .file_name()
            .map(str::to_string)
            .ok_or_else(|| AppError::new(StatusCode::BAD_REQUEST, "file part must carry a filename"))?;
        let content_type = field.content_type().map(str::to_string);
        let bytes = field.bytes().await.map_err(|err| {
            AppError::new(StatusCode::BAD_REQUEST, format!("failed to read file part: {err}"))
        })?;
        upload = Some((filename, content_type, bytes));
        break;
    }

    let (filename, content_type, bytes) =
        upload.ok_or_else(|| AppError::new(StatusCode::BAD_REQUEST, "no file uploaded"))?;

    let record = state
        .vault
        .upload(owner_id, &filename, content_type, bytes)
        .await?;

    Ok((
        StatusCode::OK,
        Json(json!({ "id": record.id, "fileUrl": record.url })),
    ))
}

/// GET `/files/{id}/download` — fetch, decrypt, and return one file.
pub async fn download_file(
    State(state): State<AppState>,
    Owner(owner_id): Owner,
    Path(id): Path<Uuid>,
) -> Result<Response, AppError> {
    let file = state.vault.download(id, owner_id).await?;

    let content_type = file
        .content_type
        .unwrap_or_else(|| "application/octet-stream".into());
    let disposition = format!("attachment; filename=\"{}\"", file.filename);

    let mut response = Response::new(Body::from(file.bytes));
    let headers = response.headers_mut();
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_str(&content_type)
            .unwrap_or_else(|_| HeaderValue::from_static("application/octet-stream")),
    );
    headers.insert(
        header::CONTENT_DISPOSITION,
        HeaderValue::from_str(&disposition)
            .unwrap_or_else(|_| HeaderValue::from_static("attachment")),
    );
    Ok(response)
}

/// GET `/files` — metadata for all of the caller's files.
pub async fn list_files(
    State(state): State<AppState>,
    Owner(owner_id): Owner,
) -> Result<Json<Vec<StoredFile>>, AppError> {
    Ok(Json(state.vault.list(owner_id).await?))
}

/// GET `/files/{id}` — metadata for one of the caller's files.
pub async fn get_file(
    State(state): State<AppState>,
    Owner(owner_id): Owner,
    Path(id): Path<Uuid>,
) -> Result<Json<StoredFile>, AppError> {
    Ok(Json(state.vault.metadata(id, owner_id).await?))
}
