use axum::body::{Body, Bytes};
use axum::http::{Request, StatusCode};
use axum::Router;
use blogsearch_core::persist::{save_index, IndexPaths};
use blogsearch_core::{build, RawPost};
use http_body_util::BodyExt;
use serde_json::Value;
use server::{build_app, ServerConfig};
use std::fs;
use std::path::Path;
use tempfile::tempdir;
use tower::ServiceExt;

const TOKEN: &str = "s3cret";

fn post(title: &str, excerpt: &str, url: &str) -> RawPost {
    RawPost { title: Some(title.into()), excerpt: Some(excerpt.into()), url: Some(url.into()), ..Default::default() }
}

fn build_tiny_index(dir: &Path) {
    let out = build(vec![
        post("Why you should also protect the integrity of the native libraries", "Frida is mentioned once here.", "/a"),
        post("When Frida plays in the blue team", "Frida also happens to be a powerful partner.", "/b"),
    ]);
    save_index(&IndexPaths::new(dir), &out.index).unwrap();
}

fn config(dir: &Path, source: Option<&Path>) -> ServerConfig {
    ServerConfig {
        index_dir: dir.to_path_buf(),
        source: source.map(Path::to_path_buf),
        max_k: 100,
        admin_token: Some(TOKEN.into()),
        cors_allow_origin: None,
    }
}

async fn call(app: Router, req: Request<Body>) -> (StatusCode, Bytes) {
    let resp = app.oneshot(req).await.unwrap();
    let status = resp.status();
    let body = resp.into_body().collect().await.unwrap().to_bytes();
    (status, body)
}

async fn get(app: Router, uri: &str) -> (StatusCode, Bytes) {
    call(app, Request::get(uri).body(Body::empty()).unwrap()).await
}

async fn admin(app: Router, uri: &str, token: Option<&str>) -> (StatusCode, Bytes) {
    let mut req = Request::post(uri);
    if let Some(token) = token {
        req = req.header("X-ADMIN-TOKEN", token);
    }
    call(app, req.body(Body::empty()).unwrap()).await
}

fn ids(body: &Bytes) -> Vec<u64> {
    let json: Value = serde_json::from_slice(body).unwrap();
    json["results"].as_array().unwrap().iter().map(|r| r["doc_id"].as_u64().unwrap()).collect()
}

#[tokio::test]
async fn search_returns_ranked_results() {
    let dir = tempdir().unwrap();
    build_tiny_index(dir.path());
    let app = build_app(config(dir.path(), None)).unwrap();

    let (status, body) = get(app, "/search?q=frida&k=2").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(ids(&body), vec![1, 0]);
    let json: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["total_hits"], 2);
    assert_eq!(json["results"][0]["url"], "/b");
    assert!(json["results"][0]["snippet"].as_str().unwrap().contains("<em>Frida</em>"));
}

#[tokio::test]
async fn empty_query_and_zero_k_return_nothing() {
    let dir = tempdir().unwrap();
    build_tiny_index(dir.path());
    let app = build_app(config(dir.path(), None)).unwrap();

    let (status, body) = get(app.clone(), "/search?q=").await;
    assert_eq!(status, StatusCode::OK);
    assert!(ids(&body).is_empty());

    let (_, body) = get(app.clone(), "/search?q=frida&k=0").await;
    assert!(ids(&body).is_empty());

    let (_, body) = get(app, "/search?q=nonexistentterm12345").await;
    assert!(ids(&body).is_empty());
}

#[tokio::test]
async fn require_terms_rejects_empty_query() {
    let dir = tempdir().unwrap();
    build_tiny_index(dir.path());
    let app = build_app(config(dir.path(), None)).unwrap();

    let (status, _) = get(app, "/search?q=the&require_terms=true").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn doc_lookup() {
    let dir = tempdir().unwrap();
    build_tiny_index(dir.path());
    let app = build_app(config(dir.path(), None)).unwrap();

    let (status, body) = get(app.clone(), "/doc/1").await;
    assert_eq!(status, StatusCode::OK);
    let json: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["title"], "When Frida plays in the blue team");

    let (status, _) = get(app, "/doc/42").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn admin_routes_need_token() {
    let dir = tempdir().unwrap();
    build_tiny_index(dir.path());
    let app = build_app(config(dir.path(), None)).unwrap();

    let (status, _) = admin(app.clone(), "/index/reload", None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    let (status, _) = admin(app, "/index/reload", Some("wrong")).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn rebuild_swaps_in_new_records() {
    let dir = tempdir().unwrap();
    let index_dir = dir.path().join("index");
    build_tiny_index(&index_dir);
    let source = dir.path().join("store.json");
    fs::write(
        &source,
        r#"[{"title": "Bypassing root detection", "url": "/c", "tags": ["Android"]},
            {"title": "No url here"}]"#,
    )
    .unwrap();
    let app = build_app(config(&index_dir, Some(&source))).unwrap();

    let (status, body) = admin(app.clone(), "/index/rebuild", Some(TOKEN)).await;
    assert_eq!(status, StatusCode::OK);
    let summary: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(summary["num_docs"], 1);
    assert_eq!(summary["generation"], 1);
    assert_eq!(summary["warnings"].as_array().unwrap().len(), 1);

    let (_, body) = get(app.clone(), "/search?q=frida").await;
    assert!(ids(&body).is_empty());
    let (_, body) = get(app, "/search?q=root").await;
    assert_eq!(ids(&body), vec![0]);

    // The rebuilt index was persisted, so a fresh server starts from it.
    let restarted = build_app(config(&index_dir, None)).unwrap();
    let (_, body) = get(restarted, "/search?q=bypassing").await;
    assert_eq!(ids(&body), vec![0]);
}

#[tokio::test]
async fn rebuild_without_source_conflicts() {
    let dir = tempdir().unwrap();
    build_tiny_index(dir.path());
    let app = build_app(config(dir.path(), None)).unwrap();

    let (status, _) = admin(app, "/index/rebuild", Some(TOKEN)).await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn reload_picks_up_index_written_elsewhere() {
    let dir = tempdir().unwrap();
    build_tiny_index(dir.path());
    let app = build_app(config(dir.path(), None)).unwrap();

    let replacement = build(vec![post("Stack buffer overflow", "", "/d")]);
    save_index(&IndexPaths::new(dir.path()), &replacement.index).unwrap();

    let (status, _) = admin(app.clone(), "/index/reload", Some(TOKEN)).await;
    assert_eq!(status, StatusCode::OK);
    let (_, body) = get(app, "/search?q=overflow").await;
    assert_eq!(ids(&body), vec![0]);
}

#[tokio::test]
async fn reload_rejects_corrupt_index_and_keeps_serving() {
    let dir = tempdir().unwrap();
    build_tiny_index(dir.path());
    let app = build_app(config(dir.path(), None)).unwrap();

    fs::write(dir.path().join("index.bin"), b"not an index").unwrap();
    let (status, _) = admin(app.clone(), "/index/reload", Some(TOKEN)).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);

    let (status, body) = get(app, "/search?q=frida").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(ids(&body), vec![1, 0]);
}

#[tokio::test]
async fn bootstraps_from_source_when_no_index() {
    let dir = tempdir().unwrap();
    let index_dir = dir.path().join("index");
    let source = Path::new(env!("CARGO_MANIFEST_DIR")).join("../data/lunr-store.js");
    let app = build_app(config(&index_dir, Some(&source))).unwrap();

    let (_, body) = get(app, "/search?q=frida").await;
    assert_eq!(ids(&body), vec![1]);
    assert!(index_dir.join("index.bin").exists());
}

#[test]
fn missing_index_without_source_fails() {
    let dir = tempdir().unwrap();
    assert!(build_app(config(&dir.path().join("nowhere"), None)).is_err());
}
