use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use axum::Router;
use credstore_auth::CredentialHasher;
use credstore_backend::state::AppState;
use credstore_db::{create_pool, DbConnectionConfig, DbPool};
use std::sync::Arc;
use tower::util::ServiceExt;

async fn pool_in(dir: &tempfile::TempDir) -> DbPool {
    let path = dir.path().join("users.db");
    create_pool(&DbConnectionConfig::from_path(path.to_str().unwrap()))
        .await
        .expect("create pool")
}

async fn status_and_body(app: &Router, uri: &str) -> (StatusCode, String) {
    let req = Request::builder()
        .method(Method::GET)
        .uri(uri)
        .body(Body::empty())
        .unwrap();
    let resp = app.clone().oneshot(req).await.unwrap();
    let status = resp.status();
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, String::from_utf8_lossy(&bytes).into_owned())
}

#[tokio::test]
async fn health_and_ready() {
    let dir = tempfile::tempdir().expect("tempdir");
    let pool = pool_in(&dir).await;
    let state = AppState::new(pool.clone(), CredentialHasher::default(), dir.path());
    let app = credstore_backend::build_router(Arc::new(state));

    assert_eq!(status_and_body(&app, "/api/health").await.0, StatusCode::OK);
    assert_eq!(status_and_body(&app, "/api/ready").await.0, StatusCode::OK);

    pool.close().await;
    assert_eq!(status_and_body(&app, "/api/health").await.0, StatusCode::OK);
    assert_eq!(
        status_and_body(&app, "/api/ready").await.0,
        StatusCode::SERVICE_UNAVAILABLE
    );
}

#[tokio::test]
async fn serves_static_site_but_not_the_store() {
    let dir = tempfile::tempdir().expect("tempdir");
    let site = dir.path().join("html");
    std::fs::create_dir_all(site.join("docs")).unwrap();
    std::fs::write(site.join("index.html"), "<h1>home</h1>").unwrap();
    std::fs::write(site.join("docs").join("index.html"), "<h1>docs</h1>").unwrap();

    let pool = pool_in(&dir).await;
    let mut state = AppState::new(pool, CredentialHasher::default(), dir.path().join("upload"));
    state.static_dir = site;
    let app = credstore_backend::build_router(Arc::new(state));

    let (status, body) = status_and_body(&app, "/").await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.contains("home"));

    let (status, body) = status_and_body(&app, "/docs/").await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.contains("docs"));

    // users.db lives next to the site root, not inside it.
    assert_eq!(
        status_and_body(&app, "/users.db").await.0,
        StatusCode::NOT_FOUND
    );
    assert_eq!(
        status_and_body(&app, "/../users.db").await.0,
        StatusCode::NOT_FOUND
    );
}
