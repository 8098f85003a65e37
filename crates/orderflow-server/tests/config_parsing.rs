use std::fs;

use orderflow_server::config::loader::load_config;
use orderflow_server::config::{QueueBackend, SearchBackend, StorageBackend};

#[test]
fn config_parsing_and_validation() {
    let dir = tempfile::tempdir().expect("tmp dir");
    let path = dir.path().join("orderflow.toml");

    let toml_content = r#"
[server]
host = "127.0.0.1"
port = 8081
read_timeout_ms = 1000
write_timeout_ms = 2000

[storage]
backend = "postgres"

[storage.postgres]
url = "postgres://orders:orders@db:5432/orders"
pool_size = 4
read_timeout_ms = 3000

[redis]
enabled = true
url = "redis://cache:6379"

[cache]
order_ttl_secs = 600

[queue]
backend = "nats"
url = "nats://broker:4222"
ack_wait_secs = 45

[search]
backend = "elasticsearch"
url = "http://search:9200"

[worker]
message_timeout_ms = 15000

[refresh]
schedule = "every 15m"
timeout_secs = 120

[logging]
level = "debug"
"#;
    fs::write(&path, toml_content).expect("write toml");

    let cfg = load_config(path.to_str()).expect("should parse config");
    assert_eq!(cfg.server.port, 8081);
    assert_eq!(cfg.server.write_timeout_ms, 2000);
    assert_eq!(cfg.storage.backend, StorageBackend::Postgres);
    assert_eq!(cfg.storage.postgres.url, "postgres://orders:orders@db:5432/orders");
    assert_eq!(cfg.storage.postgres.pool_size, 4);
    assert_eq!(cfg.storage.postgres.read_timeout_ms, 3000);
    assert!(cfg.redis.enabled);
    assert_eq!(cfg.cache.order_ttl_secs, 600);
    assert_eq!(cfg.queue.backend, QueueBackend::Nats);
    assert_eq!(cfg.queue.ack_wait_secs, 45);
    assert_eq!(cfg.queue.stream, "ORDERS");
    assert_eq!(cfg.search.backend, SearchBackend::Elasticsearch);
    assert_eq!(cfg.search.index, "orders");
    assert_eq!(cfg.worker.message_timeout_ms, 15000);
    assert_eq!(cfg.refresh.schedule, "every 15m");
    assert_eq!(cfg.refresh.timeout_secs, 120);
    assert_eq!(cfg.logging.level, "debug");
}

#[test]
fn single_process_memory_config() {
    let dir = tempfile::tempdir().expect("tmp dir");
    let path = dir.path().join("orderflow.toml");
    fs::write(
        &path,
        r#"
[storage]
backend = "memory"

[queue]
backend = "memory"

[search]
backend = "memory"

[worker]
embedded = true
"#,
    )
    .expect("write toml");

    let cfg = load_config(path.to_str()).expect("should parse config");
    assert_eq!(cfg.storage.backend, StorageBackend::Memory);
    assert_eq!(cfg.queue.backend, QueueBackend::Memory);
    assert!(cfg.worker.embedded);
    assert_eq!(cfg.refresh.schedule, "@hourly");
}

#[test]
fn memory_queue_without_embedded_worker_is_rejected() {
    let dir = tempfile::tempdir().expect("tmp dir");
    let path = dir.path().join("orderflow.toml");
    fs::write(&path, "[queue]\nbackend = \"memory\"\n").expect("write toml");

    let err = load_config(path.to_str()).unwrap_err();
    assert!(err.contains("worker.embedded"), "unexpected error: {err}");
}

#[test]
fn invalid_values_are_rejected() {
    let dir = tempfile::tempdir().expect("tmp dir");

    let bad_port = dir.path().join("port.toml");
    fs::write(&bad_port, "[server]\nport = 0\n").expect("write toml");
    assert!(load_config(bad_port.to_str()).is_err());

    let bad_schedule = dir.path().join("schedule.toml");
    fs::write(&bad_schedule, "[refresh]\nschedule = \"sometimes\"\n").expect("write toml");
    assert!(load_config(bad_schedule.to_str()).is_err());

    let bad_backend = dir.path().join("backend.toml");
    fs::write(&bad_backend, "[storage]\nbackend = \"sqlite\"\n").expect("write toml");
    assert!(load_config(bad_backend.to_str()).is_err());
}

#[test]
fn queue_timings_are_validated() {
    let dir = tempfile::tempdir().expect("tmp dir");

    let short_ack_wait = dir.path().join("ack_wait.toml");
    fs::write(
        &short_ack_wait,
        "[queue]\nack_wait_secs = 5\n\n[worker]\nmessage_timeout_ms = 60000\n",
    )
    .expect("write toml");
    let err = load_config(short_ack_wait.to_str()).unwrap_err();
    assert!(err.contains("ack_wait_secs"), "unexpected error: {err}");

    for (name, body) in [
        ("poll.toml", "[queue]\npoll_interval_ms = 0\n"),
        ("publish.toml", "[queue]\npublish_timeout_ms = 0\n"),
        ("ack.toml", "[queue]\nack_wait_secs = 0\n"),
    ] {
        let path = dir.path().join(name);
        fs::write(&path, body).expect("write toml");
        assert!(load_config(path.to_str()).is_err(), "{name} should be rejected");
    }
}

#[test]
fn missing_file_uses_defaults() {
    let dir = tempfile::tempdir().expect("tmp dir");
    let path = dir.path().join("absent.toml");

    let cfg = load_config(path.to_str()).expect("defaults are valid");
    assert_eq!(cfg.server.port, 8080);
    assert_eq!(cfg.cache.order_ttl_secs, 24 * 60 * 60);
    assert_eq!(cfg.worker.message_timeout_ms, 10_000);
}
