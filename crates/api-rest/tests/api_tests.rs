use api_rest::{router, AppState};
use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::{json, Value};
use shelf_core::CoreConfig;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempDir;
use tower::ServiceExt;

const BOUNDARY: &str = "shelf-test-boundary";

struct Fixture {
    _dir: TempDir,
    uploads: PathBuf,
    staging: PathBuf,
    app: Router,
}

fn fixture_with_limit(max_upload_bytes: u64) -> Fixture {
    let dir = TempDir::new().expect("tempdir");
    let static_dir = dir.path().join("static");
    fs::create_dir_all(&static_dir).unwrap();
    fs::write(static_dir.join("index.html"), "<h1>shelf</h1>").unwrap();

    let cfg = CoreConfig::new(
        dir.path().join("uploads"),
        dir.path().join("staging"),
        static_dir,
        max_upload_bytes,
    )
    .expect("config");
    let uploads = cfg.upload_dir().to_path_buf();
    let staging = cfg.staging_dir().to_path_buf();
    let app = router(AppState::new(Arc::new(cfg)));

    Fixture {
        _dir: dir,
        uploads,
        staging,
        app,
    }
}

fn fixture() -> Fixture {
    fixture_with_limit(1024 * 1024)
}

enum Part<'a> {
    Text(&'a str, &'a str),
    File(&'a str, &'a [u8]),
}

fn multipart_body(parts: &[Part<'_>]) -> Vec<u8> {
    let mut body = Vec::new();
    for part in parts {
        body.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
        match part {
            Part::Text(name, value) => {
                body.extend_from_slice(
                    format!("Content-Disposition: form-data; name=\"{name}\"\r\n\r\n").as_bytes(),
                );
                body.extend_from_slice(value.as_bytes());
            }
            Part::File(filename, bytes) => {
                body.extend_from_slice(
                    format!(
                        "Content-Disposition: form-data; name=\"file\"; filename=\"{filename}\"\r\n\
                         Content-Type: application/octet-stream\r\n\r\n"
                    )
                    .as_bytes(),
                );
                body.extend_from_slice(bytes);
            }
        }
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
    body
}

async fn post_upload(app: &Router, parts: &[Part<'_>]) -> (StatusCode, Value) {
    let req = Request::builder()
        .method("POST")
        .uri("/")
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(multipart_body(parts)))
        .unwrap();
    let resp = app.clone().oneshot(req).await.unwrap();
    let status = resp.status();
    let bytes = resp.into_body().collect().await.unwrap().to_bytes();
    (status, serde_json::from_slice(&bytes).unwrap())
}

async fn post_json(app: &Router, uri: &str, body: Value) -> (StatusCode, Value) {
    let req = Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();
    let resp = app.clone().oneshot(req).await.unwrap();
    let status = resp.status();
    let bytes = resp.into_body().collect().await.unwrap().to_bytes();
    (status, serde_json::from_slice(&bytes).unwrap())
}

fn dir_is_empty(path: &Path) -> bool {
    fs::read_dir(path).unwrap().next().is_none()
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_empty_file_into_nested_path() {
    let fx = fixture();
    let (status, body) = post_upload(
        &fx.app,
        &[Part::Text("path", "a/b/c.txt"), Part::File("c.txt", b"")],
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body,
        json!({"status": "success", "path": "c.txt", "action": "new"})
    );
    assert!(fx.uploads.join("a/b").is_dir());
    assert_eq!(fs::metadata(fx.uploads.join("a/b/c.txt")).unwrap().len(), 0);
    assert!(dir_is_empty(&fx.staging));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_path_defaults_to_file_name() {
    let fx = fixture();
    let (status, body) = post_upload(&fx.app, &[Part::File("plain.txt", b"hello")]).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["path"], "plain.txt");
    assert_eq!(fs::read(fx.uploads.join("plain.txt")).unwrap(), b"hello");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_blank_path_falls_back_to_file_name() {
    let fx = fixture();
    let (status, body) = post_upload(
        &fx.app,
        &[Part::Text("path", ""), Part::File("loose.txt", b"data")],
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body,
        json!({"status": "success", "path": "loose.txt", "action": "new"})
    );
    assert_eq!(fs::read(fx.uploads.join("loose.txt")).unwrap(), b"data");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_second_file_part_is_rejected() {
    let fx = fixture();
    let (status, body) = post_upload(
        &fx.app,
        &[Part::File("a.txt", b"A"), Part::File("b.txt", b"B")],
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["status"], "error");
    assert_eq!(body["reason"], "multiple_files");
    assert!(dir_is_empty(&fx.uploads));
    assert!(dir_is_empty(&fx.staging));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_backslash_path_is_normalised() {
    let fx = fixture();
    let (status, body) = post_upload(
        &fx.app,
        &[Part::Text("path", "docs\\notes.txt"), Part::File("notes.txt", b"n")],
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["path"], "notes.txt");
    assert!(fx.uploads.join("docs/notes.txt").is_file());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_list_reports_files_and_directories() {
    let fx = fixture();
    fs::write(fx.uploads.join("x.txt"), b"12345").unwrap();
    fs::create_dir(fx.uploads.join("d")).unwrap();

    let req = Request::builder().uri("/list").body(Body::empty()).unwrap();
    let resp = fx.app.clone().oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    let headers = resp.headers();
    assert_eq!(
        headers[header::CACHE_CONTROL],
        "no-cache, no-store, must-revalidate"
    );
    assert_eq!(headers[header::PRAGMA], "no-cache");
    assert_eq!(headers[header::EXPIRES], "0");

    let bytes = resp.into_body().collect().await.unwrap().to_bytes();
    let entries: Vec<Value> = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(entries.len(), 2);
    assert!(entries.contains(&json!({"path": "x.txt", "size": 5})));
    assert!(entries.contains(&json!({"path": "d/", "size": 0})));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_traversal_rejected_before_staging() {
    let fx = fixture();
    let (status, body) = post_upload(
        &fx.app,
        &[Part::Text("path", "../evil.txt"), Part::File("evil.txt", b"x")],
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["status"], "error");
    assert_eq!(body["reason"], "traversal");
    assert!(dir_is_empty(&fx.uploads));
    assert!(dir_is_empty(&fx.staging));
    assert!(!fx.uploads.parent().unwrap().join("evil.txt").exists());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_invalid_path_after_file_discards_staged_upload() {
    let fx = fixture();
    let (status, body) = post_upload(
        &fx.app,
        &[Part::File("f.txt", b"payload"), Part::Text("path", "/etc/passwd")],
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["reason"], "traversal");
    assert!(dir_is_empty(&fx.uploads));
    assert!(dir_is_empty(&fx.staging));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_missing_file_part() {
    let fx = fixture();
    let (status, body) = post_upload(&fx.app, &[Part::Text("path", "a.txt")]).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["reason"], "missing_file");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_identical_upload_is_skipped() {
    let fx = fixture();
    let parts = [Part::Text("path", "same.txt"), Part::File("same.txt", b"abc")];

    let (_, first) = post_upload(&fx.app, &parts).await;
    assert_eq!(first["action"], "new");

    let (status, second) = post_upload(&fx.app, &parts).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        second,
        json!({"status": "skipped", "path": "same.txt", "reason": "identical"})
    );
    assert_eq!(fs::read_dir(&fx.uploads).unwrap().count(), 1);
    assert!(dir_is_empty(&fx.staging));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_rename_creates_numbered_versions() {
    let fx = fixture();
    fs::write(fx.uploads.join("r.txt"), b"one").unwrap();

    let (_, body) = post_upload(
        &fx.app,
        &[Part::Text("path", "r.txt"), Part::File("r.txt", b"two")],
    )
    .await;
    assert_eq!(
        body,
        json!({"status": "success", "path": "r (1).txt", "action": "renamed"})
    );

    let (_, body) = post_upload(
        &fx.app,
        &[Part::Text("path", "r.txt"), Part::File("r.txt", b"three")],
    )
    .await;
    assert_eq!(body["path"], "r (2).txt");

    assert_eq!(fs::read(fx.uploads.join("r.txt")).unwrap(), b"one");
    assert_eq!(fs::read(fx.uploads.join("r (1).txt")).unwrap(), b"two");
    assert_eq!(fs::read(fx.uploads.join("r (2).txt")).unwrap(), b"three");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_replace_overwrites_in_place() {
    let fx = fixture();
    fs::write(fx.uploads.join("r.txt"), b"old").unwrap();

    let (status, body) = post_upload(
        &fx.app,
        &[
            Part::Text("strategy", "replace"),
            Part::Text("path", "r.txt"),
            Part::File("r.txt", b"new content"),
        ],
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["action"], "replaced");
    assert_eq!(fs::read(fx.uploads.join("r.txt")).unwrap(), b"new content");
    assert_eq!(fs::read_dir(&fx.uploads).unwrap().count(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_skip_strategy_keeps_existing_file() {
    let fx = fixture();
    fs::write(fx.uploads.join("k.txt"), b"keep").unwrap();

    let (status, body) = post_upload(
        &fx.app,
        &[
            Part::Text("path", "k.txt"),
            Part::Text("strategy", "skip"),
            Part::File("k.txt", b"other"),
        ],
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "skipped");
    assert_eq!(body["reason"], "user_skip");
    assert_eq!(fs::read(fx.uploads.join("k.txt")).unwrap(), b"keep");
    assert!(dir_is_empty(&fx.staging));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_unknown_strategy_falls_back_to_rename() {
    let fx = fixture();
    fs::write(fx.uploads.join("u.txt"), b"one").unwrap();

    let (status, body) = post_upload(
        &fx.app,
        &[
            Part::Text("path", "u.txt"),
            Part::Text("strategy", "bogus"),
            Part::File("u.txt", b"two"),
        ],
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["action"], "renamed");
    assert!(fx.uploads.join("u (1).txt").is_file());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_oversized_upload_is_rejected() {
    let fx = fixture_with_limit(4);
    let (status, body) = post_upload(
        &fx.app,
        &[Part::Text("path", "big.bin"), Part::File("big.bin", b"0123456789")],
    )
    .await;

    assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
    assert_eq!(body["reason"], "too_large");
    assert!(dir_is_empty(&fx.uploads));
    assert!(dir_is_empty(&fx.staging));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_response_path_is_sanitised() {
    let fx = fixture();
    let (status, body) = post_upload(
        &fx.app,
        &[Part::Text("path", "<b>.txt"), Part::File("x", b"x")],
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["path"], "&lt;b&gt;.txt");
    assert!(fx.uploads.join("<b>.txt").is_file());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_check_file_conflicts() {
    let fx = fixture();
    fs::write(fx.uploads.join("a.txt"), b"abc").unwrap();
    fs::create_dir(fx.uploads.join("dir")).unwrap();

    let (status, body) = post_json(
        &fx.app,
        "/check-file-conflicts",
        json!({"paths": ["a.txt", "missing.txt", "../a.txt", "dir"]}),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body,
        json!({"conflicts": [{"path": "a.txt", "existingSize": 3}]})
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_health() {
    let fx = fixture();
    let req = Request::builder().uri("/health").body(Body::empty()).unwrap();
    let resp = fx.app.clone().oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    let bytes = resp.into_body().collect().await.unwrap().to_bytes();
    let body: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(body["ok"], true);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_root_serves_index_page() {
    let fx = fixture();
    let req = Request::builder().uri("/").body(Body::empty()).unwrap();
    let resp = fx.app.clone().oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    let bytes = resp.into_body().collect().await.unwrap().to_bytes();
    assert_eq!(&bytes[..], b"<h1>shelf</h1>");
}
