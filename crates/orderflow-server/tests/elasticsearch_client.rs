use orderflow_core::{NewOrder, Order};
use orderflow_server::config::SearchConfig;
use orderflow_server::search::{ElasticsearchClient, OrderIndexer, OrderSearch, SearchError};
use serde_json::json;
use wiremock::matchers::{body_partial_json, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn client_for(server: &MockServer) -> ElasticsearchClient {
    let config = SearchConfig {
        url: server.uri(),
        ..SearchConfig::default()
    };
    ElasticsearchClient::new(&config).expect("client")
}

#[tokio::test]
async fn upsert_puts_document_under_order_id() {
    let server = MockServer::start().await;
    let order = Order::accept(NewOrder::new("Laptop", 1299.99));

    Mock::given(method("PUT"))
        .and(path(format!("/orders/_doc/{}", order.id)))
        .and(body_partial_json(json!({
            "id": order.id.to_string(),
            "product_name": "Laptop",
            "amount": 1299.99
        })))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({"result": "created"})))
        .expect(1)
        .mount(&server)
        .await;

    client_for(&server).upsert(&order).await.unwrap();
}

#[tokio::test]
async fn search_returns_engine_body_untouched() {
    let server = MockServer::start().await;
    let raw = r#"{"took":2,"hits":{"total":{"value":1,"relation":"eq"},"hits":[{"_id":"abc"}]}}"#;

    Mock::given(method("POST"))
        .and(path("/orders/_search"))
        .and(query_param("track_total_hits", "true"))
        .and(body_partial_json(json!({
            "query": {"match": {"product_name": "laptop"}}
        })))
        .respond_with(ResponseTemplate::new(200).set_body_raw(raw, "application/json"))
        .expect(1)
        .mount(&server)
        .await;

    let body = client_for(&server).search("laptop").await.unwrap();
    assert_eq!(&body[..], raw.as_bytes());
}

#[tokio::test]
async fn error_status_is_reported_with_body() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/orders/_search"))
        .respond_with(ResponseTemplate::new(500).set_body_string("cluster unavailable"))
        .mount(&server)
        .await;

    let err = client_for(&server).search("laptop").await.unwrap_err();
    match err {
        SearchError::Status { status, body } => {
            assert_eq!(status, 500);
            assert_eq!(body, "cluster unavailable");
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn unreachable_engine_is_a_request_error() {
    let config = SearchConfig {
        url: "http://127.0.0.1:1".into(),
        timeout_ms: 500,
        ..SearchConfig::default()
    };
    let client = ElasticsearchClient::new(&config).unwrap();

    let err = client.search("laptop").await.unwrap_err();
    assert!(matches!(err, SearchError::Request(_)));
}
