use std::net::SocketAddr;
use std::time::Duration;

use orderflow_db_postgres::PostgresConfig;
use serde::{Deserialize, Serialize};

use crate::scheduler::RefreshSchedule;

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    /// Redis configuration (L2 cache tier)
    #[serde(default)]
    pub redis: RedisConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub queue: QueueConfig,
    #[serde(default)]
    pub search: SearchConfig,
    #[serde(default)]
    pub worker: WorkerConfig,
    /// Daily sales view refresh
    #[serde(default)]
    pub refresh: RefreshConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl AppConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.server.port == 0 {
            return Err("server.port must be > 0".into());
        }
        if self.server.read_timeout_ms == 0 || self.server.write_timeout_ms == 0 {
            return Err("server timeouts must be > 0".into());
        }
        let lvl = self.logging.level.to_ascii_lowercase();
        let valid_levels = ["trace", "debug", "info", "warn", "error", "off"];
        if !valid_levels.contains(&lvl.as_str()) {
            return Err(format!("logging.level must be one of {valid_levels:?}"));
        }
        if self.storage.backend == StorageBackend::Postgres {
            if self.storage.postgres.url.is_empty() {
                return Err("storage.postgres.url must not be empty".into());
            }
            if self.storage.postgres.pool_size == 0 {
                return Err("storage.postgres.pool_size must be > 0".into());
            }
        }
        if self.cache.order_ttl_secs == 0 {
            return Err("cache.order_ttl_secs must be > 0".into());
        }
        if self.queue.backend == QueueBackend::Memory && !self.worker.embedded {
            return Err(
                "queue.backend=memory requires worker.embedded=true (no other process can consume it)"
                    .into(),
            );
        }
        if self.worker.message_timeout_ms == 0 {
            return Err("worker.message_timeout_ms must be > 0".into());
        }
        if self.queue.poll_interval_ms == 0 || self.queue.publish_timeout_ms == 0 {
            return Err("queue.poll_interval_ms and queue.publish_timeout_ms must be > 0".into());
        }
        if self.queue.ack_wait_secs == 0 {
            return Err("queue.ack_wait_secs must be > 0".into());
        }
        // The broker must not redeliver an item a worker may still be processing
        if self.queue.backend == QueueBackend::Nats
            && self.queue.ack_wait_secs.saturating_mul(1000) <= self.worker.message_timeout_ms
        {
            return Err(format!(
                "queue.ack_wait_secs ({}s) must exceed worker.message_timeout_ms ({}ms)",
                self.queue.ack_wait_secs, self.worker.message_timeout_ms
            ));
        }
        if self.refresh.timeout_secs == 0 {
            return Err("refresh.timeout_secs must be > 0".into());
        }
        if self.refresh.enabled {
            RefreshSchedule::parse(&self.refresh.schedule)
                .map_err(|e| format!("refresh.schedule: {e}"))?;
        }
        Ok(())
    }

    pub fn addr(&self) -> SocketAddr {
        use std::net::{IpAddr, Ipv4Addr};
        let host: IpAddr = self
            .server
            .host
            .parse()
            .unwrap_or(IpAddr::V4(Ipv4Addr::new(0, 0, 0, 0)));
        SocketAddr::from((host, self.server.port))
    }

    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.server.read_timeout_ms)
    }
    pub fn write_timeout(&self) -> Duration {
        Duration::from_millis(self.server.write_timeout_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_read_timeout_ms")]
    pub read_timeout_ms: u64,
    #[serde(default = "default_write_timeout_ms")]
    pub write_timeout_ms: u64,
    #[serde(default = "default_body_limit")]
    pub body_limit_bytes: usize,
}

fn default_host() -> String {
    "0.0.0.0".into()
}
fn default_port() -> u16 {
    8080
}
fn default_read_timeout_ms() -> u64 {
    5_000
}
fn default_write_timeout_ms() -> u64 {
    5_000
}
fn default_body_limit() -> usize {
    64 * 1024
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            read_timeout_ms: default_read_timeout_ms(),
            write_timeout_ms: default_write_timeout_ms(),
            body_limit_bytes: default_body_limit(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    #[default]
    Postgres,
    Memory,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct StorageConfig {
    #[serde(default)]
    pub backend: StorageBackend,
    /// Used when `backend = "postgres"`
    #[serde(default)]
    pub postgres: PostgresConfig,
}

/// Redis configuration for sharing the cache across instances
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedisConfig {
    /// Enable Redis (gracefully degrades without it)
    #[serde(default = "default_redis_enabled")]
    pub enabled: bool,

    /// Redis connection URL (e.g., "redis://localhost:6379")
    #[serde(default = "default_redis_url")]
    pub url: String,

    /// Connection pool size
    #[serde(default = "default_redis_pool_size")]
    pub pool_size: usize,

    /// Connection timeout in milliseconds
    #[serde(default = "default_redis_timeout_ms")]
    pub timeout_ms: u64,
}

fn default_redis_enabled() -> bool {
    false
}

fn default_redis_url() -> String {
    "redis://localhost:6379".to_string()
}

fn default_redis_pool_size() -> usize {
    10
}

fn default_redis_timeout_ms() -> u64 {
    2000
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            enabled: default_redis_enabled(),
            url: default_redis_url(),
            pool_size: default_redis_pool_size(),
            timeout_ms: default_redis_timeout_ms(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Lifetime of a cached order, in seconds
    #[serde(default = "default_order_ttl_secs")]
    pub order_ttl_secs: u64,
}

fn default_order_ttl_secs() -> u64 {
    24 * 60 * 60
}

impl CacheConfig {
    pub fn order_ttl(&self) -> Duration {
        Duration::from_secs(self.order_ttl_secs)
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            order_ttl_secs: default_order_ttl_secs(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum QueueBackend {
    #[default]
    Nats,
    Memory,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueConfig {
    #[serde(default)]
    pub backend: QueueBackend,
    #[serde(default = "default_nats_url")]
    pub url: String,
    /// JetStream stream holding pending orders
    #[serde(default = "default_stream")]
    pub stream: String,
    #[serde(default = "default_subject")]
    pub subject: String,
    /// Durable consumer name shared by all workers
    #[serde(default = "default_consumer")]
    pub consumer: String,
    /// Unacknowledged messages are redelivered after this long
    #[serde(default = "default_ack_wait_secs")]
    pub ack_wait_secs: u64,
    /// How long a consumer waits for a message before reporting an empty poll
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    #[serde(default = "default_publish_timeout_ms")]
    pub publish_timeout_ms: u64,
}

fn default_nats_url() -> String {
    "nats://127.0.0.1:4222".into()
}
fn default_stream() -> String {
    "ORDERS".into()
}
fn default_subject() -> String {
    "orders.created".into()
}
fn default_consumer() -> String {
    "order-persister".into()
}
fn default_ack_wait_secs() -> u64 {
    30
}
fn default_poll_interval_ms() -> u64 {
    1000
}
fn default_publish_timeout_ms() -> u64 {
    5000
}

impl QueueConfig {
    pub fn ack_wait(&self) -> Duration {
        Duration::from_secs(self.ack_wait_secs)
    }
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
    pub fn publish_timeout(&self) -> Duration {
        Duration::from_millis(self.publish_timeout_ms)
    }
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            backend: QueueBackend::default(),
            url: default_nats_url(),
            stream: default_stream(),
            subject: default_subject(),
            consumer: default_consumer(),
            ack_wait_secs: default_ack_wait_secs(),
            poll_interval_ms: default_poll_interval_ms(),
            publish_timeout_ms: default_publish_timeout_ms(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SearchBackend {
    #[default]
    Elasticsearch,
    Memory,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    #[serde(default)]
    pub backend: SearchBackend,
    #[serde(default = "default_search_url")]
    pub url: String,
    #[serde(default = "default_search_index")]
    pub index: String,
    #[serde(default = "default_search_timeout_ms")]
    pub timeout_ms: u64,
}

fn default_search_url() -> String {
    "http://localhost:9200".into()
}
fn default_search_index() -> String {
    "orders".into()
}
fn default_search_timeout_ms() -> u64 {
    5000
}

impl SearchConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            backend: SearchBackend::default(),
            url: default_search_url(),
            index: default_search_index(),
            timeout_ms: default_search_timeout_ms(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerConfig {
    /// Run the persistence worker inside the API process
    #[serde(default)]
    pub embedded: bool,
    /// Deadline covering both downstream writes of one message
    #[serde(default = "default_message_timeout_ms")]
    pub message_timeout_ms: u64,
}

fn default_message_timeout_ms() -> u64 {
    10_000
}

impl WorkerConfig {
    pub fn message_timeout(&self) -> Duration {
        Duration::from_millis(self.message_timeout_ms)
    }
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            embedded: false,
            message_timeout_ms: default_message_timeout_ms(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefreshConfig {
    #[serde(default = "default_refresh_enabled")]
    pub enabled: bool,
    /// Cron expression, nickname (`@hourly`) or interval (`every 15m`)
    #[serde(default = "default_refresh_schedule")]
    pub schedule: String,
    #[serde(default = "default_refresh_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_refresh_enabled() -> bool {
    true
}
fn default_refresh_schedule() -> String {
    "@hourly".into()
}
fn default_refresh_timeout_secs() -> u64 {
    5 * 60
}

impl RefreshConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for RefreshConfig {
    fn default() -> Self {
        Self {
            enabled: default_refresh_enabled(),
            schedule: default_refresh_schedule(),
            timeout_secs: default_refresh_timeout_secs(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}
fn default_log_level() -> String {
    "info".into()
}
impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

pub mod loader {
    use super::AppConfig;
    use config::{Config, Environment, File};
    use std::path::PathBuf;

    /// Default configuration file, looked up in the working directory.
    pub const DEFAULT_CONFIG_PATH: &str = "orderflow.toml";

    /// Loads the file at `path` (skipped when absent), then applies
    /// `ORDERFLOW__SECTION__KEY` environment overrides and validates.
    pub fn load_config(path: Option<&str>) -> Result<AppConfig, String> {
        let mut builder = Config::builder();
        let pathbuf = PathBuf::from(path.unwrap_or(DEFAULT_CONFIG_PATH));
        if pathbuf.exists() {
            builder = builder.add_source(File::from(pathbuf));
        }
        // e.g. ORDERFLOW__SERVER__PORT=9090, ORDERFLOW__QUEUE__BACKEND=memory
        builder = builder.add_source(
            Environment::with_prefix("ORDERFLOW")
                .try_parsing(true)
                .separator("__"),
        );
        let cfg = builder
            .build()
            .map_err(|e| format!("config build error: {e}"))?;
        let merged: AppConfig = cfg
            .try_deserialize()
            .map_err(|e| format!("config deserialize error: {e}"))?;
        merged.validate()?;
        Ok(merged)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let cfg = AppConfig::default();
        assert!(cfg.validate().is_ok());
        assert_eq!(cfg.read_timeout(), Duration::from_secs(5));
        assert_eq!(cfg.cache.order_ttl(), Duration::from_secs(86_400));
        assert_eq!(cfg.worker.message_timeout(), Duration::from_secs(10));
        assert_eq!(cfg.refresh.timeout(), Duration::from_secs(300));
        assert_eq!(cfg.refresh.schedule, "@hourly");
    }

    #[test]
    fn memory_queue_requires_embedded_worker() {
        let mut cfg = AppConfig::default();
        cfg.queue.backend = QueueBackend::Memory;
        assert!(cfg.validate().is_err());

        cfg.worker.embedded = true;
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn invalid_schedule_is_rejected_only_when_enabled() {
        let mut cfg = AppConfig::default();
        cfg.refresh.schedule = "whenever".into();
        assert!(cfg.validate().is_err());

        cfg.refresh.enabled = false;
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn queue_timings_are_checked() {
        let mut cfg = AppConfig::default();
        cfg.queue.ack_wait_secs = 5;
        cfg.worker.message_timeout_ms = 60_000;
        let err = cfg.validate().unwrap_err();
        assert!(err.contains("ack_wait_secs"), "unexpected error: {err}");

        // Equal is still too short: redelivery could race the deadline
        cfg.queue.ack_wait_secs = 60;
        assert!(cfg.validate().is_err());
        cfg.queue.ack_wait_secs = 61;
        assert!(cfg.validate().is_ok());

        // An in-process queue never redelivers on a timer
        cfg.queue.backend = QueueBackend::Memory;
        cfg.worker.embedded = true;
        cfg.queue.ack_wait_secs = 1;
        assert!(cfg.validate().is_ok());

        let mut cfg = AppConfig::default();
        cfg.queue.poll_interval_ms = 0;
        assert!(cfg.validate().is_err());

        let mut cfg = AppConfig::default();
        cfg.queue.publish_timeout_ms = 0;
        assert!(cfg.validate().is_err());

        let mut cfg = AppConfig::default();
        cfg.queue.ack_wait_secs = 0;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn invalid_log_level_is_rejected() {
        let mut cfg = AppConfig::default();
        cfg.logging.level = "loud".into();
        assert!(cfg.validate().is_err());
    }
}
