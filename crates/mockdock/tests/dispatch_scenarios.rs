//! End-to-end tests over real sockets.

use mockdock::backends::InMemoryRuleStore;
use mockdock::config::{Protocol, ServerConfig, SettingsStore};
use mockdock::server::{Listener, Surface};
use mockdock::AppState;
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::net::TcpListener;

fn app_state(dir: &tempfile::TempDir) -> AppState {
    AppState::new(
        Arc::new(InMemoryRuleStore::new()),
        SettingsStore::new(dir.path().join("config.json"), ServerConfig::default()),
    )
}

fn client() -> reqwest::Client {
    reqwest::Client::builder().no_proxy().build().unwrap()
}

async fn start(surface: Surface, protocol: Protocol, state: AppState) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(Listener::new(surface, addr, protocol, state).serve(listener));
    addr
}

async fn create_mock(client: &reqwest::Client, admin: SocketAddr, mock: Value) -> Value {
    let resp = client
        .post(format!("http://{admin}/admin/mocks"))
        .json(&mock)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 201);
    resp.json().await.unwrap()
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_admin_and_mock_surfaces() {
    let dir = tempfile::tempdir().unwrap();
    let state = app_state(&dir);
    let admin = start(Surface::Admin, Protocol::Http, state.clone()).await;
    let mock = start(Surface::Mock, Protocol::Http, state).await;
    let client = client();

    create_mock(
        &client,
        admin,
        json!({
            "path": "/foo",
            "method": "GET",
            "scheme": "http",
            "status_code": 201,
            "content_type": "application/json",
            "headers": {"X-A": "1"},
            "body": "{\"ok\":true}",
            "enabled": true,
            "delay_ms": 0
        }),
    )
    .await;

    let resp = client.get(format!("http://{mock}/foo")).send().await.unwrap();
    assert_eq!(resp.status(), 201);
    assert_eq!(resp.headers()["x-a"], "1");
    assert_eq!(resp.headers()["content-type"], "application/json");
    assert_eq!(resp.text().await.unwrap(), r#"{"ok":true}"#);

    let resp = client.post(format!("http://{mock}/foo")).send().await.unwrap();
    assert_eq!(resp.status(), 404);
    assert_eq!(resp.text().await.unwrap(), "Mock not configured");

    let resp = client.get(format!("http://{mock}/bar")).send().await.unwrap();
    assert_eq!(resp.status(), 404);

    let resp = client
        .get(format!("http://{mock}/admin/mocks"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 404);
    assert_eq!(resp.text().await.unwrap(), "Not Found");

    let health: Value = client
        .get(format!("http://{mock}/health"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(health, json!({"status": "ok"}));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_https_without_certificate_falls_back_to_http() {
    let dir = tempfile::tempdir().unwrap();
    let state = app_state(&dir);
    let admin = start(Surface::Admin, Protocol::Http, state.clone()).await;
    let mock = start(Surface::Mock, Protocol::Https, state).await;
    let client = client();

    create_mock(&client, admin, json!({"path": "/secure", "scheme": "https"})).await;

    // Served as plain http, so an https-only rule does not match
    let resp = client
        .get(format!("http://{mock}/secure"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 404);
    assert_eq!(resp.text().await.unwrap(), "Mock not configured");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_delayed_rule_does_not_block_fast_rule() {
    let dir = tempfile::tempdir().unwrap();
    let addr = start(Surface::Combined, Protocol::Http, app_state(&dir)).await;
    let client = client();

    create_mock(&client, addr, json!({"path": "/slow", "delay_ms": 300})).await;
    create_mock(&client, addr, json!({"path": "/fast"})).await;

    let slow = {
        let client = client.clone();
        tokio::spawn(async move {
            client.get(format!("http://{addr}/slow")).send().await.unwrap();
            Instant::now()
        })
    };
    tokio::time::sleep(Duration::from_millis(20)).await;

    let started = Instant::now();
    let resp = client.get(format!("http://{addr}/fast")).send().await.unwrap();
    let fast_done = Instant::now();
    assert_eq!(resp.status(), 200);
    assert!(fast_done.duration_since(started) < Duration::from_millis(250));

    let slow_done = slow.await.unwrap();
    assert!(fast_done < slow_done);
}

#[tokio::test]
async fn test_combined_surface_routes_admin_and_mocks() {
    let dir = tempfile::tempdir().unwrap();
    let addr = start(Surface::Combined, Protocol::Http, app_state(&dir)).await;
    let client = client();

    let created = create_mock(&client, addr, json!({"path": "/ping", "body": "pong"})).await;
    let id = created["id"].as_i64().unwrap();

    let resp = client.get(format!("http://{addr}/ping")).send().await.unwrap();
    assert_eq!(resp.text().await.unwrap(), "pong");

    let list: Value = client
        .get(format!("http://{addr}/admin/mocks"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(list["mocks"][0]["path"], "/ping");

    let resp = client
        .delete(format!("http://{addr}/admin/mocks/{id}"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 204);

    let resp = client.get(format!("http://{addr}/ping")).send().await.unwrap();
    assert_eq!(resp.status(), 404);
}
