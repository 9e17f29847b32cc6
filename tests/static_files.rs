//! Static handler behaviour through a router, plus one run over real sockets.

use std::time::{Duration, SystemTime};

use axum::{
    body::{to_bytes, Body},
    http::{header, Request, StatusCode},
    response::Response,
    Router,
};
use httpserver::{DirStore, MemoryStore, StaticFiles};
use tower::ServiceExt;

mod common;
use common::{client, spawn_server};

const MTIME_SECS: u64 = 1_700_000_000;
const LAST_MODIFIED: &str = "Tue, 14 Nov 2023 22:13:20 GMT";
const SCRIPT: &str = "console.log('hello');";

fn assets() -> MemoryStore {
    let modified = SystemTime::UNIX_EPOCH + Duration::from_secs(MTIME_SECS);
    MemoryStore::new()
        .with_file("/js/app.js", SCRIPT, modified)
        .with_file("/css/site.css", "body { margin: 0 }", modified)
}

fn app(ttl: Duration) -> Router {
    Router::new().route_service("/static/{*path}", StaticFiles::new("/static/", assets(), ttl))
}

async fn get(app: &Router, path: &str, headers: &[(header::HeaderName, &str)]) -> Response {
    let mut request = Request::get(path);
    for (name, value) in headers {
        request = request.header(name, *value);
    }
    app.clone().oneshot(request.body(Body::empty()).unwrap()).await.unwrap()
}

async fn body_text(response: Response) -> String {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

#[tokio::test]
async fn serves_file_with_cache_headers() {
    let app = app(Duration::from_secs(600));
    let response = get(&app, "/static/js/app.js", &[]).await;

    assert_eq!(response.status(), StatusCode::OK);
    let headers = response.headers();
    assert_eq!(headers[header::ETAG], "\"6553f100-15\"");
    assert_eq!(headers[header::LAST_MODIFIED], LAST_MODIFIED);
    assert_eq!(headers[header::CACHE_CONTROL], "public, max-age=600");
    assert_eq!(headers[header::PRAGMA], "cache");
    assert!(headers.contains_key(header::EXPIRES));
    assert!(headers[header::CONTENT_TYPE].to_str().unwrap().contains("javascript"));
    assert_eq!(body_text(response).await, SCRIPT);
}

#[tokio::test]
async fn conditional_requests_round_trip() {
    let app = app(Duration::from_secs(60));

    let first = get(&app, "/static/css/site.css", &[]).await;
    assert_eq!(first.status(), StatusCode::OK);
    let etag = first.headers()[header::ETAG].to_str().unwrap().to_string();

    let by_etag = get(&app, "/static/css/site.css", &[(header::IF_NONE_MATCH, &etag)]).await;
    assert_eq!(by_etag.status(), StatusCode::NOT_MODIFIED);
    assert_eq!(by_etag.headers()[header::ETAG], etag.as_str());
    assert!(body_text(by_etag).await.is_empty());

    let by_date = get(&app, "/static/css/site.css", &[(header::IF_MODIFIED_SINCE, LAST_MODIFIED)]).await;
    assert_eq!(by_date.status(), StatusCode::NOT_MODIFIED);

    let stale = get(
        &app,
        "/static/css/site.css",
        &[(header::IF_MODIFIED_SINCE, "Tue, 14 Nov 2023 22:13:19 GMT")],
    )
    .await;
    assert_eq!(stale.status(), StatusCode::OK);
}

#[tokio::test]
async fn zero_ttl_omits_cache_headers() {
    let app = app(Duration::ZERO);
    let response = get(&app, "/static/js/app.js", &[]).await;

    assert_eq!(response.status(), StatusCode::OK);
    let headers = response.headers();
    assert!(!headers.contains_key(header::ETAG));
    assert!(!headers.contains_key(header::CACHE_CONTROL));
    assert!(!headers.contains_key(header::EXPIRES));
    assert_eq!(headers[header::LAST_MODIFIED], LAST_MODIFIED);
}

#[tokio::test]
async fn directories_and_missing_files_are_not_found() {
    let app = app(Duration::from_secs(60));

    let dir = get(&app, "/static/js", &[]).await;
    assert_eq!(dir.status(), StatusCode::NOT_FOUND);
    assert_eq!(body_text(dir).await, "404 page not found");

    let missing = get(&app, "/static/js/missing.js", &[]).await;
    assert_eq!(missing.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn traversal_stays_inside_the_store() {
    let app = app(Duration::from_secs(60));
    let response = get(&app, "/static/../../etc/passwd", &[]).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn range_requests_return_partial_content() {
    let app = app(Duration::from_secs(60));
    let response = get(&app, "/static/js/app.js", &[(header::RANGE, "bytes=0-6")]).await;

    assert_eq!(response.status(), StatusCode::PARTIAL_CONTENT);
    assert_eq!(response.headers()[header::CONTENT_RANGE], format!("bytes 0-6/{}", SCRIPT.len()));
    assert_eq!(body_text(response).await, "console");
}

#[tokio::test]
async fn directory_store_over_http() {
    let root = tempfile::tempdir().unwrap();
    std::fs::write(root.path().join("index.html"), "<h1>hi</h1>").unwrap();
    std::fs::create_dir(root.path().join("sub")).unwrap();

    let handler = StaticFiles::new("/assets", DirStore::new(root.path()), Duration::from_secs(30));
    let app = Router::new().route_service("/assets/{*path}", handler);
    let running = spawn_server(app, vec![]).await;

    let res = client().get(running.url("/assets/index.html")).send().await.unwrap();
    assert_eq!(res.status(), 200);
    let etag = res.headers()[header::ETAG.as_str()].to_str().unwrap().to_string();
    assert_eq!(res.text().await.unwrap(), "<h1>hi</h1>");

    let res = client()
        .get(running.url("/assets/index.html"))
        .header(header::IF_NONE_MATCH.as_str(), etag)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 304);

    let res = client().get(running.url("/assets/sub")).send().await.unwrap();
    assert_eq!(res.status(), 404);

    running.shutdown().await.unwrap();
}

#[tokio::test]
async fn encoded_paths_are_decoded() {
    let modified = SystemTime::UNIX_EPOCH + Duration::from_secs(MTIME_SECS);
    let store = MemoryStore::new().with_file("/my file.txt", "spaced", modified);
    let app = Router::new().route_service("/static/{*path}", StaticFiles::new("/static/", store, Duration::ZERO));

    let response = get(&app, "/static/my%20file.txt", &[]).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_text(response).await, "spaced");
}

#[tokio::test]
async fn encoded_traversal_stays_inside_the_root() {
    let dir = tempfile::tempdir().unwrap();
    let public = dir.path().join("public");
    std::fs::create_dir(&public).unwrap();
    std::fs::write(public.join("index.html"), "ok").unwrap();
    std::fs::write(dir.path().join("secret.txt"), "secret").unwrap();

    let handler = StaticFiles::new("/assets", DirStore::new(&public), Duration::ZERO);
    let app = Router::new().route_service("/assets/{*path}", handler);

    for path in ["/assets/%2e%2e/secret.txt", "/assets/%2E%2E%2Fsecret.txt", "/assets/..%2fsecret.txt"] {
        let response = get(&app, path, &[]).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND, "{path}");
    }

    let response = get(&app, "/assets/index%2ehtml", &[]).await;
    assert_eq!(response.status(), StatusCode::OK);
}
