use std::path::Path;
use std::sync::Arc;

use axum::extract::{Extension, Json};
use serde::{Deserialize, Serialize};

use crate::state::AppState;

/// Body of the file listing endpoint. Failures are reported in-band.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FileListing {
    Files { files: Vec<String> },
    Error { error: String },
}

/// GET /cgi-bin/list_files.py
pub async fn list(Extension(state): Extension<Arc<AppState>>) -> Json<FileListing> {
    match list_regular_files(&state.uploads_dir).await {
        Ok(files) => Json(FileListing::Files { files }),
        Err(e) => {
            tracing::warn!(dir = %state.uploads_dir.display(), error = %e, "cannot list upload directory");
            Json(FileListing::Error {
                error: format!("cannot list upload directory: {}", e.kind()),
            })
        }
    }
}

/// Names of the regular files directly inside `dir`, sorted.
///
/// Symlinks are followed; anything that is not a file after resolution
/// (directories, dangling links) is skipped.
pub async fn list_regular_files(dir: &Path) -> std::io::Result<Vec<String>> {
    let mut entries = tokio::fs::read_dir(dir).await?;
    let mut files = Vec::new();
    while let Some(entry) = entries.next_entry().await? {
        let is_file = tokio::fs::metadata(entry.path())
            .await
            .map(|m| m.is_file())
            .unwrap_or(false);
        if is_file {
            files.push(entry.file_name().to_string_lossy().into_owned());
        }
    }
    files.sort();
    Ok(files)
}
