use std::sync::Arc;

use axum::{
    extract::{DefaultBodyLimit, Extension},
    http::StatusCode,
    response::IntoResponse,
    routing::{delete, get, post},
    Router,
};
use tower_http::{services::ServeDir, trace::TraceLayer};

use crate::handlers::{credentials, files, uploads, users};
use crate::state::AppState;

/// Build the primary axum router with the provided shared application state.
///
/// The legacy `/cgi-bin/*.py` paths and their `/api` aliases share handlers.
/// Everything else falls through to the static site.
pub fn build_router(state: Arc<AppState>) -> Router {
    let cgi = Router::new()
        .route(
            "/auth.py",
            get(credentials::authenticate).post(credentials::authenticate),
        )
        .route("/list_files.py", get(files::list))
        .route("/show_users.py", get(users::show));

    let api = Router::new()
        .route(
            "/auth",
            get(credentials::authenticate).post(credentials::authenticate),
        )
        .route("/files", get(files::list))
        .route("/uploads", post(uploads::upload))
        .route("/uploads/{name}", delete(uploads::delete))
        .route("/users", get(users::show))
        .route("/health", get(health_handler))
        .route("/ready", get(ready_handler));

    let static_service = ServeDir::new(&state.static_dir).append_index_html_on_directories(true);

    Router::new()
        .nest("/cgi-bin", cgi)
        .nest("/api", api)
        .fallback_service(static_service)
        .layer(DefaultBodyLimit::max(state.max_body_bytes))
        .layer(TraceLayer::new_for_http())
        .layer(Extension(state))
}

async fn health_handler() -> impl IntoResponse {
    // Liveness: always return 200 OK when process is alive.
    (StatusCode::OK, "OK")
}

async fn ready_handler(Extension(state): Extension<Arc<AppState>>) -> impl IntoResponse {
    match sqlx::query("SELECT 1").execute(&*state.db_pool).await {
        Ok(_) => (StatusCode::OK, "OK"),
        Err(e) => {
            tracing::warn!(error = %e, "readiness check failed");
            (StatusCode::SERVICE_UNAVAILABLE, "database unavailable")
        }
    }
}
