use axum::body::Body;
use axum::http::{header::CONTENT_TYPE, Method, Request, StatusCode};
use axum::Router;
use credstore_auth::CredentialHasher;
use credstore_backend::handlers::files::FileListing;
use credstore_backend::handlers::uploads::PLAIN_TEXT_FILE_NAME;
use credstore_backend::state::AppState;
use credstore_db::{create_pool, DbConnectionConfig};
use std::path::Path;
use std::sync::Arc;
use tower::util::ServiceExt;

async fn app_for(db_dir: &Path, uploads: &Path, max_body_bytes: Option<usize>) -> Router {
    let db_path = db_dir.join("users.db");
    let pool = create_pool(&DbConnectionConfig::from_path(db_path.to_str().unwrap()))
        .await
        .expect("create pool");
    let mut state = AppState::new(pool, CredentialHasher::default(), uploads);
    if let Some(limit) = max_body_bytes {
        state.max_body_bytes = limit;
    }
    credstore_backend::build_router(Arc::new(state))
}

async fn send(app: &Router, req: Request<Body>) -> (StatusCode, Vec<u8>) {
    let resp = app.clone().oneshot(req).await.unwrap();
    let status = resp.status();
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, bytes.to_vec())
}

fn post(content_type: Option<&str>, body: impl Into<Body>) -> Request<Body> {
    let mut builder = Request::builder().method(Method::POST).uri("/api/uploads");
    if let Some(ct) = content_type {
        builder = builder.header(CONTENT_TYPE, ct);
    }
    builder.body(body.into()).unwrap()
}

fn delete(name: &str) -> Request<Body> {
    Request::builder()
        .method(Method::DELETE)
        .uri(format!("/api/uploads/{name}"))
        .body(Body::empty())
        .unwrap()
}

async fn listing(app: &Router) -> Vec<String> {
    let req = Request::builder()
        .method(Method::GET)
        .uri("/api/files")
        .body(Body::empty())
        .unwrap();
    let (status, bytes) = send(app, req).await;
    assert_eq!(status, StatusCode::OK);
    match serde_json::from_slice(&bytes).expect("json body") {
        FileListing::Files { files } => files,
        FileListing::Error { error } => panic!("listing failed: {error}"),
    }
}

#[tokio::test]
async fn json_upload_is_listed_then_deleted() {
    let db = tempfile::tempdir().expect("tempdir");
    let root = tempfile::tempdir().expect("tempdir");
    // Created on first upload.
    let uploads = root.path().join("upload");
    let app = app_for(db.path(), &uploads, None).await;

    let body = r#"{"fileName":"notes.txt","fileContent":"hello world"}"#;
    let (status, bytes) = send(&app, post(Some("application/json"), body)).await;
    assert_eq!(status, StatusCode::CREATED);
    let saved: FileListing = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(
        saved,
        FileListing::Files {
            files: vec!["notes.txt".into()]
        }
    );
    assert_eq!(
        std::fs::read_to_string(uploads.join("notes.txt")).unwrap(),
        "hello world"
    );

    assert_eq!(listing(&app).await, vec!["notes.txt".to_string()]);

    let (status, _) = send(&app, delete("notes.txt")).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    assert!(listing(&app).await.is_empty());

    let (status, _) = send(&app, delete("notes.txt")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn json_upload_requires_both_fields() {
    let db = tempfile::tempdir().expect("tempdir");
    let uploads = tempfile::tempdir().expect("tempdir");
    let app = app_for(db.path(), uploads.path(), None).await;

    for body in [
        r#"{"fileName":"a.txt"}"#,
        r#"{"fileContent":"x"}"#,
        r#"{"fileName":"","fileContent":"x"}"#,
        r#"{"fileName":"a.txt","fileContent":""}"#,
    ] {
        let (status, _) = send(&app, post(Some("application/json"), body)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{body}");
    }
    assert!(listing(&app).await.is_empty());
}

#[tokio::test]
async fn multipart_upload_stores_file_parts() {
    let db = tempfile::tempdir().expect("tempdir");
    let uploads = tempfile::tempdir().expect("tempdir");
    let app = app_for(db.path(), uploads.path(), None).await;

    let body = "--XBOUNDARY\r\n\
        Content-Disposition: form-data; name=\"comment\"\r\n\r\n\
        not a file\r\n\
        --XBOUNDARY\r\n\
        Content-Disposition: form-data; name=\"file\"; filename=\"report.csv\"\r\n\
        Content-Type: text/csv\r\n\r\n\
        a,b\n1,2\r\n\
        --XBOUNDARY--\r\n";
    let (status, _) = send(
        &app,
        post(Some("multipart/form-data; boundary=XBOUNDARY"), body),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(
        std::fs::read_to_string(uploads.path().join("report.csv")).unwrap(),
        "a,b\n1,2"
    );
    assert_eq!(listing(&app).await, vec!["report.csv".to_string()]);

    let no_file = "--XBOUNDARY\r\n\
        Content-Disposition: form-data; name=\"comment\"\r\n\r\n\
        just text\r\n\
        --XBOUNDARY--\r\n";
    let (status, _) = send(
        &app,
        post(Some("multipart/form-data; boundary=XBOUNDARY"), no_file),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn plain_text_body_goes_to_fixed_name() {
    let db = tempfile::tempdir().expect("tempdir");
    let uploads = tempfile::tempdir().expect("tempdir");
    let app = app_for(db.path(), uploads.path(), None).await;

    for ct in ["text/plain", "plain/text"] {
        let (status, _) = send(&app, post(Some(ct), format!("sent as {ct}"))).await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(
            std::fs::read_to_string(uploads.path().join(PLAIN_TEXT_FILE_NAME)).unwrap(),
            format!("sent as {ct}")
        );
    }

    let (status, _) = send(&app, post(Some("text/plain"), "")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn content_type_is_required_and_checked() {
    let db = tempfile::tempdir().expect("tempdir");
    let uploads = tempfile::tempdir().expect("tempdir");
    let app = app_for(db.path(), uploads.path(), None).await;

    let (status, _) = send(&app, post(None, "data")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, bytes) = send(&app, post(Some("image/png"), "data")).await;
    assert_eq!(status, StatusCode::UNSUPPORTED_MEDIA_TYPE);
    let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(body["success"], false);
    assert!(listing(&app).await.is_empty());
}

#[tokio::test]
async fn traversal_names_are_rejected() {
    let db = tempfile::tempdir().expect("tempdir");
    let root = tempfile::tempdir().expect("tempdir");
    let uploads = root.path().join("upload");
    std::fs::create_dir(&uploads).unwrap();
    std::fs::write(root.path().join("secret.txt"), "keep").unwrap();
    let app = app_for(db.path(), &uploads, None).await;

    for name in ["../secret.txt", "a/b.txt", "..", "sub\\x.txt"] {
        let body = serde_json::json!({ "fileName": name, "fileContent": "x" }).to_string();
        let (status, _) = send(&app, post(Some("application/json"), body)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{name}");
    }

    let (status, _) = send(&app, delete("%2E%2E%2Fsecret.txt")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(
        std::fs::read_to_string(root.path().join("secret.txt")).unwrap(),
        "keep"
    );
    assert!(listing(&app).await.is_empty());
}

#[tokio::test]
async fn delete_only_removes_writable_regular_files() {
    let db = tempfile::tempdir().expect("tempdir");
    let uploads = tempfile::tempdir().expect("tempdir");
    std::fs::create_dir(uploads.path().join("nested")).unwrap();
    let locked = uploads.path().join("locked.txt");
    std::fs::write(&locked, "x").unwrap();
    let mut perms = std::fs::metadata(&locked).unwrap().permissions();
    perms.set_readonly(true);
    std::fs::set_permissions(&locked, perms).unwrap();
    let app = app_for(db.path(), uploads.path(), None).await;

    let (status, _) = send(&app, delete("nested")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = send(&app, delete("locked.txt")).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert!(locked.exists());
}

#[tokio::test]
async fn oversized_upload_is_rejected() {
    let db = tempfile::tempdir().expect("tempdir");
    let uploads = tempfile::tempdir().expect("tempdir");
    let app = app_for(db.path(), uploads.path(), Some(64)).await;

    let body = serde_json::json!({ "fileName": "big.txt", "fileContent": "x".repeat(512) })
        .to_string();
    let (status, _) = send(&app, post(Some("application/json"), body)).await;
    assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);

    let (status, _) = send(&app, post(Some("text/plain"), "y".repeat(512))).await;
    assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
    assert!(listing(&app).await.is_empty());
}
