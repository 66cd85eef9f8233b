use std::path::PathBuf;
use std::sync::Arc;

use credstore_auth::{CredentialHasher, PasswordError, PasswordScheme};

/// Default request body ceiling: 1 MiB.
pub const DEFAULT_MAX_BODY_BYTES: usize = 1024 * 1024;

/// Shared application state passed to every route handler.
#[derive(Clone)]
pub struct AppState {
    pub db_pool: Arc<credstore_db::DbPool>,
    pub hasher: CredentialHasher,
    /// Directory listed by the file listing endpoint.
    pub uploads_dir: PathBuf,
    /// Bearer token guarding the user dump. `None` disables the dump.
    pub admin_token: Option<String>,
    /// Root of the static site served for non-API paths.
    pub static_dir: PathBuf,
    pub max_body_bytes: usize,
}

impl AppState {
    /// Build a state container with default site settings. Callers adjust
    /// the public fields or use [`AppState::from_config`].
    pub fn new(
        db_pool: credstore_db::DbPool,
        hasher: CredentialHasher,
        uploads_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            db_pool: Arc::new(db_pool),
            hasher,
            uploads_dir: uploads_dir.into(),
            admin_token: None,
            static_dir: PathBuf::from("var/www/html"),
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
        }
    }

    pub fn with_admin_token(mut self, token: impl Into<String>) -> Self {
        self.admin_token = Some(token.into());
        self
    }

    pub fn from_config(
        db_pool: credstore_db::DbPool,
        cfg: &credstore_config::Config,
    ) -> Result<Self, PasswordError> {
        let scheme: PasswordScheme = cfg.auth.password_scheme.parse()?;
        Ok(Self {
            db_pool: Arc::new(db_pool),
            hasher: CredentialHasher::new(scheme),
            uploads_dir: PathBuf::from(&cfg.uploads.directory),
            admin_token: cfg.admin.token.clone(),
            static_dir: PathBuf::from(&cfg.server.static_dir),
            max_body_bytes: cfg.server.max_body_bytes,
        })
    }
}
