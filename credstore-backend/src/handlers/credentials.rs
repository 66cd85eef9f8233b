//! The registration / login endpoint.
//!
//! Fields arrive form-encoded in a POST body or, for GET, in the query
//! string. Every non-infrastructure outcome is a 200 with a
//! `{success, message}` body.

use std::sync::Arc;

use axum::extract::{rejection::FormRejection, Extension, Form};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use credstore_db::users::{self as db_users, InsertOutcome, UsersRow};
use serde::{Deserialize, Serialize};

use crate::{error::ApiError, state::AppState};

pub const MSG_REGISTERED: &str = "registration succeeded";
pub const MSG_USERNAME_TAKEN: &str = "username already exists";
pub const MSG_LOGGED_IN: &str = "login succeeded";
pub const MSG_INVALID_CREDENTIALS: &str = "invalid credentials";
pub const MSG_MISSING_FIELDS: &str = "missing username or password";
pub const MSG_UNKNOWN_ACTION: &str = "unknown action";

#[derive(Debug, Default, Clone, Deserialize)]
pub struct CredentialForm {
    pub action: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthResponse {
    pub success: bool,
    pub message: String,
}

impl AuthResponse {
    fn ok(message: &str) -> Self {
        Self {
            success: true,
            message: message.to_string(),
        }
    }

    fn fail(message: &str) -> Self {
        Self {
            success: false,
            message: message.to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Action {
    Register,
    Login,
}

impl Action {
    fn parse(raw: Option<&str>) -> Option<Self> {
        match raw? {
            "register" => Some(Self::Register),
            "login" => Some(Self::Login),
            _ => None,
        }
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}

/// GET/POST /cgi-bin/auth.py
///
/// A body that cannot be decoded as a form counts as having no fields,
/// except an oversized one, which is refused with 413.
pub async fn authenticate(
    Extension(state): Extension<Arc<AppState>>,
    form: Result<Form<CredentialForm>, FormRejection>,
) -> Result<Response, ApiError> {
    let form = match form {
        Ok(Form(form)) => form,
        Err(rejection) if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE => {
            tracing::warn!(%rejection, "credential request body too large");
            return Ok(rejection.into_response());
        }
        Err(rejection) => {
            tracing::debug!(%rejection, "unreadable credential form");
            CredentialForm::default()
        }
    };
    let outcome = process(&state, form).await?;
    Ok(Json(outcome).into_response())
}

/// Run one credential request against the store.
pub async fn process(state: &AppState, form: CredentialForm) -> Result<AuthResponse, ApiError> {
    let (Some(username), Some(password)) = (non_empty(form.username), non_empty(form.password))
    else {
        return Ok(AuthResponse::fail(MSG_MISSING_FIELDS));
    };

    match Action::parse(form.action.as_deref()) {
        Some(Action::Register) => register(state, username, &password).await,
        Some(Action::Login) => login(state, &username, &password).await,
        None => Ok(AuthResponse::fail(MSG_UNKNOWN_ACTION)),
    }
}

async fn register(
    state: &AppState,
    username: String,
    password: &str,
) -> Result<AuthResponse, ApiError> {
    let password_hash = state.hasher.hash(password)?;
    let row = UsersRow {
        username,
        password_hash,
    };

    let mut conn = state.db_pool.acquire().await?;
    match db_users::insert_user(&mut *conn, &row).await? {
        InsertOutcome::Inserted => {
            tracing::info!(username = %row.username, scheme = %state.hasher.scheme(), "user registered");
            Ok(AuthResponse::ok(MSG_REGISTERED))
        }
        InsertOutcome::UsernameTaken => {
            tracing::info!(username = %row.username, "registration rejected: username taken");
            Ok(AuthResponse::fail(MSG_USERNAME_TAKEN))
        }
    }
}

async fn login(state: &AppState, username: &str, password: &str) -> Result<AuthResponse, ApiError> {
    let stored = {
        let mut conn = state.db_pool.acquire().await?;
        db_users::find_password_hash(&mut *conn, username).await?
    };

    let verified = stored
        .as_deref()
        .is_some_and(|hash| state.hasher.verify(password, hash));
    if verified {
        tracing::info!(%username, "login succeeded");
        Ok(AuthResponse::ok(MSG_LOGGED_IN))
    } else {
        tracing::info!(%username, "login failed");
        Ok(AuthResponse::fail(MSG_INVALID_CREDENTIALS))
    }
}
