//! End-to-end order flow over HTTP with in-process backends.
//!
//! The server runs with the in-memory record store, queue and search index
//! plus the embedded worker, on an ephemeral port.

use std::time::Duration;

use orderflow_server::config::{AppConfig, QueueBackend, SearchBackend, StorageBackend};
use orderflow_server::{Infrastructure, ServerBuilder};
use orderflow_storage::{DynOrderStore, OrderStore};
use serde_json::{Value, json};
use tokio::task::JoinHandle;
use uuid::Uuid;

fn memory_config() -> AppConfig {
    let mut cfg = AppConfig::default();
    cfg.storage.backend = StorageBackend::Memory;
    cfg.queue.backend = QueueBackend::Memory;
    cfg.queue.poll_interval_ms = 20;
    cfg.search.backend = SearchBackend::Memory;
    cfg.worker.embedded = true;
    cfg.refresh.enabled = false;
    cfg
}

struct TestServer {
    base: String,
    store: DynOrderStore,
    shutdown: tokio::sync::oneshot::Sender<()>,
    handle: JoinHandle<anyhow::Result<()>>,
}

impl TestServer {
    async fn stop(self) {
        let _ = self.shutdown.send(());
        self.handle.await.expect("join").expect("clean shutdown");
    }
}

async fn start_server() -> TestServer {
    let cfg = memory_config();
    let infra = Infrastructure::connect(&cfg).await.expect("connect");
    let store = infra.store.clone();
    let server = ServerBuilder::new().with_config(cfg).build_with(infra);

    // Bind to an ephemeral port
    let listener = tokio::net::TcpListener::bind((std::net::Ipv4Addr::LOCALHOST, 0))
        .await
        .expect("bind");
    let addr = listener.local_addr().unwrap();
    let (tx, rx) = tokio::sync::oneshot::channel::<()>();

    let handle = tokio::spawn(server.serve(listener, async move {
        let _ = rx.await;
    }));

    TestServer {
        base: format!("http://{addr}"),
        store,
        shutdown: tx,
        handle,
    }
}

async fn wait_until_persisted(store: &DynOrderStore, id: Uuid) {
    for _ in 0..200 {
        if store.get_by_id(id).await.is_ok() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("order {id} was never persisted");
}

#[tokio::test]
async fn accepted_order_is_readable_immediately_and_persisted_later() {
    let server = start_server().await;
    let client = reqwest::Client::new();

    let resp = client
        .post(format!("{}/api/orders", server.base))
        .json(&json!({"product_name": "Laptop", "amount": 1299.99}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), reqwest::StatusCode::ACCEPTED);
    assert!(resp.headers().contains_key("x-request-id"));
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["status"], "processing");
    let id: Uuid = body["order_id"].as_str().unwrap().parse().unwrap();

    let resp = client
        .get(format!("{}/api/orders/{id}", server.base))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), reqwest::StatusCode::OK);
    assert_eq!(resp.headers()["x-cache"], "HIT");
    let order: Value = resp.json().await.unwrap();
    assert_eq!(order["product_name"], "Laptop");
    assert_eq!(order["amount"], 1299.99);

    wait_until_persisted(&server.store, id).await;
    let persisted = server.store.get_by_id(id).await.unwrap();
    assert_eq!(persisted.product_name, "Laptop");

    // The projection is written after the primary row
    let mut found = false;
    for _ in 0..100 {
        let resp = client
            .get(format!("{}/api/search", server.base))
            .query(&[("q", "laptop")])
            .send()
            .await
            .unwrap();
        let body: Value = resp.json().await.unwrap();
        if body["hits"]["total"]["value"] == 1 {
            assert_eq!(body["hits"]["hits"][0]["_id"], id.to_string());
            found = true;
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert!(found, "order never reached the search index");

    server.stop().await;
}

#[tokio::test]
async fn unknown_order_is_not_found() {
    let server = start_server().await;
    let client = reqwest::Client::new();

    let resp = client
        .get(format!("{}/api/orders/{}", server.base, Uuid::new_v4()))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), reqwest::StatusCode::NOT_FOUND);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["error"]["status"], 404);
    assert_eq!(body["error"]["message"], "order not found");

    server.stop().await;
}

#[tokio::test]
async fn bulk_orders_are_all_or_nothing() {
    let server = start_server().await;
    let client = reqwest::Client::new();

    let resp = client
        .post(format!("{}/api/bulk-orders", server.base))
        .json(&json!({"item_1": "Laptop", "item_2": "ERROR"}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), reqwest::StatusCode::INTERNAL_SERVER_ERROR);
    let body: Value = resp.json().await.unwrap();
    assert!(
        body["error"]["message"]
            .as_str()
            .unwrap()
            .starts_with("transaction failed: ")
    );

    // Nothing from the failed request is visible after a refresh
    let resp = client
        .post(format!("{}/api/admin/refresh", server.base))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), reqwest::StatusCode::OK);
    let sales: Value = client
        .get(format!("{}/api/dashboard/sales", server.base))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(sales, json!([]));

    let resp = client
        .post(format!("{}/api/bulk-orders", server.base))
        .json(&json!({"item_1": "Laptop", "item_2": "Mouse"}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), reqwest::StatusCode::CREATED);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["orders"].as_array().unwrap().len(), 2);

    client
        .post(format!("{}/api/admin/refresh", server.base))
        .send()
        .await
        .unwrap();
    let sales: Value = client
        .get(format!("{}/api/dashboard/sales", server.base))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(sales[0]["total_revenue"], 150.0);

    server.stop().await;
}

#[tokio::test]
async fn health_and_bad_requests() {
    let server = start_server().await;
    let client = reqwest::Client::new();

    let body: Value = client
        .get(format!("{}/healthz", server.base))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body, json!({"status": "ok"}));

    let resp = client
        .post(format!("{}/api/orders", server.base))
        .header("content-type", "application/json")
        .body("{\"product_name\": ")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), reqwest::StatusCode::BAD_REQUEST);

    let resp = client
        .get(format!("{}/api/search?q=%20", server.base))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), reqwest::StatusCode::BAD_REQUEST);

    server.stop().await;
}
