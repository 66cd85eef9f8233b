//! Writes into and deletes from the upload directory served by the file
//! listing endpoint.
//!
//! Uploads are dispatched on `Content-Type`:
//! - `application/json`: `{"fileName": ..., "fileContent": ...}`
//! - `multipart/form-data`: every part carrying a `filename`
//! - `text/plain` (or the legacy `plain/text`): the body is stored as
//!   [`PLAIN_TEXT_FILE_NAME`]

use std::io::ErrorKind;
use std::path::Path;
use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::{Extension, FromRequest, Json, Multipart, Path as UrlPath, Request};
use axum::http::{header::CONTENT_TYPE, StatusCode};
use axum::response::{IntoResponse, Response};
use serde::Deserialize;

use crate::handlers::files::FileListing;
use crate::{error::ApiError, state::AppState};

/// Target name for raw text bodies.
pub const PLAIN_TEXT_FILE_NAME: &str = "plain_text.txt";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TextUpload {
    #[serde(default)]
    pub file_name: String,
    #[serde(default)]
    pub file_content: String,
}

/// Accept a bare file name only: no separators, no `..`, no NUL.
pub fn validate_file_name(name: &str) -> Result<&str, ApiError> {
    let invalid = name.is_empty()
        || name == "."
        || name.contains("..")
        || name.contains(['/', '\\', '\0']);
    if invalid {
        Err(ApiError::bad_request("invalid file name"))
    } else {
        Ok(name)
    }
}

async fn write_upload(dir: &Path, name: &str, bytes: &[u8]) -> Result<(), ApiError> {
    tokio::fs::create_dir_all(dir).await?;
    tokio::fs::write(dir.join(name), bytes).await?;
    Ok(())
}

/// POST /api/uploads
pub async fn upload(
    Extension(state): Extension<Arc<AppState>>,
    req: Request,
) -> Result<Response, ApiError> {
    let content_type = req
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(str::to_ascii_lowercase)
        .ok_or_else(|| ApiError::bad_request("missing content type"))?;

    let mut saved = Vec::new();
    if content_type.starts_with("application/json") {
        let payload = match Json::<TextUpload>::from_request(req, &()).await {
            Ok(Json(payload)) => payload,
            Err(rejection) => return Ok(rejection.into_response()),
        };
        if payload.file_content.is_empty() {
            return Err(ApiError::bad_request("missing fileName or fileContent"));
        }
        let name = validate_file_name(&payload.file_name)?;
        write_upload(&state.uploads_dir, name, payload.file_content.as_bytes()).await?;
        saved.push(name.to_string());
    } else if content_type.starts_with("multipart/form-data") {
        let mut multipart = match Multipart::from_request(req, &()).await {
            Ok(multipart) => multipart,
            Err(rejection) => return Ok(rejection.into_response()),
        };
        loop {
            let field = match multipart.next_field().await {
                Ok(Some(field)) => field,
                Ok(None) => break,
                Err(e) => return Ok(e.into_response()),
            };
            // Plain form values travel alongside the files; skip them.
            let Some(file_name) = field.file_name().map(str::to_owned) else {
                continue;
            };
            let name = validate_file_name(&file_name)?.to_owned();
            let bytes = match field.bytes().await {
                Ok(bytes) => bytes,
                Err(e) => return Ok(e.into_response()),
            };
            write_upload(&state.uploads_dir, &name, &bytes).await?;
            saved.push(name);
        }
        if saved.is_empty() {
            return Err(ApiError::bad_request("no file part in multipart body"));
        }
    } else if content_type.starts_with("text/plain") || content_type.starts_with("plain/text") {
        let bytes = match Bytes::from_request(req, &()).await {
            Ok(bytes) => bytes,
            Err(rejection) => return Ok(rejection.into_response()),
        };
        if bytes.is_empty() {
            return Err(ApiError::bad_request("empty body"));
        }
        write_upload(&state.uploads_dir, PLAIN_TEXT_FILE_NAME, &bytes).await?;
        saved.push(PLAIN_TEXT_FILE_NAME.to_string());
    } else {
        return Err(ApiError::UnsupportedMediaType(content_type));
    }

    tracing::info!(files = ?saved, dir = %state.uploads_dir.display(), "stored upload");
    Ok((StatusCode::CREATED, Json(FileListing::Files { files: saved })).into_response())
}

/// DELETE /api/uploads/{name}
pub async fn delete(
    Extension(state): Extension<Arc<AppState>>,
    UrlPath(name): UrlPath<String>,
) -> Result<StatusCode, ApiError> {
    let name = validate_file_name(&name)?;
    let path = state.uploads_dir.join(name);

    let metadata = match tokio::fs::metadata(&path).await {
        Ok(metadata) if metadata.is_file() => metadata,
        Ok(_) => return Err(ApiError::not_found(name)),
        Err(e) if e.kind() == ErrorKind::NotFound => return Err(ApiError::not_found(name)),
        Err(e) => return Err(e.into()),
    };
    if metadata.permissions().readonly() {
        return Err(ApiError::forbidden(path.display().to_string()));
    }

    match tokio::fs::remove_file(&path).await {
        Ok(()) => {
            tracing::info!(file = %name, "deleted upload");
            Ok(StatusCode::NO_CONTENT)
        }
        Err(e) if e.kind() == ErrorKind::PermissionDenied => {
            Err(ApiError::forbidden(path.display().to_string()))
        }
        Err(e) => Err(e.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_bare_names() {
        for name in ["a.txt", "report 2024.pdf", ".hidden", "x"] {
            assert!(validate_file_name(name).is_ok(), "{name}");
        }
    }

    #[test]
    fn rejects_paths_and_traversal() {
        for name in ["", ".", "..", "../users.db", "a/b", "a\\b", "x..y", "nul\0"] {
            assert!(validate_file_name(name).is_err(), "{name:?}");
        }
    }
}
