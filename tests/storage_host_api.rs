// tests/storage_host_api.rs
//
// HostApiStore against an in-process fake of the host file API
// (putFile / readDir / removeFile) served by axum on a loopback port.

use std::sync::{Arc, Mutex};

use axum::{
    body::Bytes,
    extract::State,
    http::HeaderMap,
    routing::post,
    Json, Router,
};
use serde_json::{json, Value};
use tokio::net::TcpListener;

use icon_market::sources::ICONFONT;
use icon_market::storage::{AssetStore, EmojiStore, HostApiStore};
use icon_market::transport::HostEndpoint;

#[derive(Clone, Default)]
struct FakeHost {
    log: Arc<Mutex<Vec<String>>>,
}

impl FakeHost {
    fn record(&self, line: String) {
        self.log.lock().unwrap().push(line);
    }

    fn lines(&self) -> Vec<String> {
        self.log.lock().unwrap().clone()
    }
}

fn authorized(headers: &HeaderMap) -> bool {
    headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v == "Token secret")
}

async fn put_file(State(host): State<FakeHost>, headers: HeaderMap, body: Bytes) -> Json<Value> {
    if !authorized(&headers) {
        return Json(json!({"code": 401, "msg": "unauthorized"}));
    }
    let text = String::from_utf8_lossy(&body);
    if text.contains("/data/emojis/") {
        return Json(json!({"code": -1, "msg": "read-only root"}));
    }
    let path = ["/emojis/iconfont/cat-1.svg"]
        .into_iter()
        .find(|p| text.contains(p))
        .unwrap_or("?");
    host.record(format!("put {path}"));
    Json(json!({"code": 0, "msg": ""}))
}

async fn read_dir(State(host): State<FakeHost>, Json(req): Json<Value>) -> Json<Value> {
    let path = req["path"].as_str().unwrap_or_default().to_string();
    host.record(format!("list {path}"));
    match path.as_str() {
        "/emojis/iconfont" => Json(json!({"code": 0, "data": [
            {"name": "old.meta.json", "isDir": false},
            {"name": "keep.svg", "isDir": false},
            {"name": "nested.meta.json", "isDir": true}
        ]})),
        p if p.starts_with("/emojis") => Json(json!({"code": 0, "data": []})),
        _ => Json(json!({"code": 404, "msg": "no such dir"})),
    }
}

async fn remove_file(State(host): State<FakeHost>, Json(req): Json<Value>) -> Json<Value> {
    host.record(format!("remove {}", req["path"].as_str().unwrap_or_default()));
    Json(json!({"code": 0}))
}

async fn spawn_host() -> (HostEndpoint, FakeHost) {
    let host = FakeHost::default();
    let app = Router::new()
        .route("/api/file/putFile", post(put_file))
        .route("/api/file/readDir", post(read_dir))
        .route("/api/file/removeFile", post(remove_file))
        .with_state(host.clone());
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (HostEndpoint::new(format!("http://{addr}"), "secret"), host)
}

#[tokio::test]
async fn write_falls_back_to_next_root_and_cleans_sidecars() {
    let (endpoint, host) = spawn_host().await;
    let store = EmojiStore::for_host(Arc::new(HostApiStore::new(endpoint)), "");

    let root = store
        .write(&ICONFONT, "cat-1.svg", b"<svg/>", "image/svg+xml")
        .await
        .expect("second root accepts");
    assert_eq!(root, "/emojis");
    assert_eq!(store.remembered(), "/emojis");

    let removed = store.cleanup_legacy_meta_files().await;
    assert_eq!(removed, 1);

    let lines = host.lines();
    assert!(lines.contains(&"put /emojis/iconfont/cat-1.svg".to_string()));
    assert!(lines.contains(&"remove /emojis/iconfont/old.meta.json".to_string()));
    assert!(
        !lines.iter().any(|l| l.contains("nested.meta.json")),
        "directories are never removed"
    );
}

#[tokio::test]
async fn remove_is_skipped_for_unlisted_files() {
    let (endpoint, host) = spawn_host().await;
    let store = HostApiStore::new(endpoint);

    store
        .remove_file_if_exists("/emojis/iconfont/missing.meta.json")
        .await
        .unwrap();
    store
        .remove_file_if_exists("/data/emojis/iconfont/x.meta.json")
        .await
        .unwrap();
    assert!(!host.lines().iter().any(|l| l.starts_with("remove")));

    let rows = store.list_directory("/emojis/iconfont").await.unwrap();
    assert_eq!(rows.len(), 3);
    assert!(store.list_directory("/data/emojis/iconfont").await.is_err());
}

#[tokio::test]
async fn wrong_token_is_an_api_error() {
    let (mut endpoint, _host) = spawn_host().await;
    endpoint.token = "nope".into();
    let store = HostApiStore::new(endpoint);
    let err = store
        .write_file("/emojis/iconfont/a.svg", b"<svg/>", "image/svg+xml")
        .await
        .unwrap_err();
    assert!(err.to_string().contains("unauthorized"), "{err}");
}
