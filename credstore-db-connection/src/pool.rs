use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};

use crate::config::DbConnectionConfig;
use crate::error::DbConnectionError;

pub type DbPool = SqlitePool;

// SQLite memory database patterns for efficient checking
pub const SQLITE_MEMORY_PATTERNS: &[&[u8]] = &[b":memory:", b"mode=memory"];

/// Creates a new SQLite connection pool using the provided configuration.
///
/// File-backed databases get their parent directory and file created first,
/// so a fresh deployment starts from an empty store instead of failing with
/// "unable to open database file".
pub async fn create_pool(config: &DbConnectionConfig) -> Result<DbPool, DbConnectionError> {
    config.validate()?;
    let url = config.url.trim();

    tracing::debug!(
        database_url = %url,
        max_connections = config.max_connections,
        "creating database pool"
    );

    ensure_sqlite_db_file_exists(url)?;

    let mut opts = SqlitePoolOptions::new()
        .max_connections(config.max_connections)
        .min_connections(config.min_connections)
        .acquire_timeout(config.connect_timeout());

    if let Some(idle) = config.idle_timeout() {
        opts = opts.idle_timeout(idle);
    }

    match opts.connect(url).await {
        Ok(pool) => Ok(pool),
        Err(err) => {
            tracing::error!(
                database_url = %url,
                error = %err,
                "failed to create database pool"
            );
            Err(err.into())
        }
    }
}

/// Extract the file path from a SQLite connection URL.
/// Returns None for in-memory databases or empty paths.
pub(crate) fn sqlite_file_path(url: &str) -> Option<&str> {
    let url_bytes = url.as_bytes();
    for &pattern in SQLITE_MEMORY_PATTERNS {
        if url_bytes
            .windows(pattern.len())
            .any(|w| w.eq_ignore_ascii_case(pattern))
        {
            return None;
        }
    }

    let mut path = url;
    path = path
        .strip_prefix("sqlite://")
        .or_else(|| path.strip_prefix("sqlite:"))
        .unwrap_or(path);
    path = path.strip_prefix("file:").unwrap_or(path);

    if let Some(idx) = path.find('?') {
        path = &path[..idx];
    }

    let path = path.trim();
    if path.is_empty() {
        return None;
    }

    // On Windows: strip leading slash before drive letter ("/C:/...")
    if path.len() > 2 && path.starts_with('/') && path.as_bytes().get(2) == Some(&b':') {
        Some(&path[1..])
    } else {
        Some(path)
    }
}

fn ensure_sqlite_db_file_exists(database_url: &str) -> Result<(), DbConnectionError> {
    use std::fs::{create_dir_all, File};
    use std::io;
    use std::path::Path;

    let Some(clean_path) = sqlite_file_path(database_url) else {
        return Ok(());
    };

    let db_path = Path::new(clean_path);
    if let Some(parent) = db_path
        .parent()
        .filter(|p| !p.as_os_str().is_empty() && !p.exists())
    {
        create_dir_all(parent).map_err(|e| {
            DbConnectionError::FileCreation(format!(
                "failed to create parent directory '{}': {e}",
                parent.display()
            ))
        })?;
    }

    if !db_path.exists() {
        File::create(db_path).map_err(|e| {
            let msg = if e.kind() == io::ErrorKind::PermissionDenied {
                format!("permission denied creating '{}': {e}", db_path.display())
            } else {
                format!("failed to create DB file '{}': {e}", db_path.display())
            };
            DbConnectionError::FileCreation(msg)
        })?;
        tracing::info!(path = %db_path.display(), "created empty database file");
    }

    Ok(())
}
