pub mod bootstrap;
pub mod bulk;
pub mod cache;
pub mod config;
pub mod handlers;
pub mod metrics;
pub mod middleware;
pub mod observability;
pub mod queue;
pub mod scheduler;
pub mod search;
pub mod server;
pub mod worker;

pub use bootstrap::{Infrastructure, WorkerInfrastructure};
pub use cache::{CacheBackend, CachedEntry, OrderCache, OrderCacheClient, create_cache_backend};
pub use config::{
    AppConfig, CacheConfig, QueueConfig, RedisConfig, RefreshConfig, SearchConfig, ServerConfig,
    StorageConfig, WorkerConfig,
};
pub use handlers::AppState;
pub use observability::init_tracing;
pub use server::{OrderflowServer, ServerBuilder, build_app};
pub use worker::{Outcome, PersistenceWorker, Stage};

/// How the configuration path was determined.
#[derive(Debug, Clone, Copy)]
pub enum ConfigSource {
    /// From --config CLI argument
    CliArgument,
    /// From ORDERFLOW_CONFIG environment variable
    EnvironmentVariable,
    /// Default path (orderflow.toml)
    Default,
}

impl std::fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::CliArgument => write!(f, "CLI argument (--config)"),
            Self::EnvironmentVariable => write!(f, "environment variable (ORDERFLOW_CONFIG)"),
            Self::Default => write!(f, "default"),
        }
    }
}

/// Resolve the configuration file path.
///
/// Priority order:
/// 1. CLI argument: --config <path>
/// 2. Environment variable: ORDERFLOW_CONFIG
/// 3. Default: orderflow.toml
pub fn resolve_config_path() -> (String, ConfigSource) {
    let mut args = std::env::args().skip(1);
    while let Some(arg) = args.next() {
        if arg == "--config"
            && let Some(path) = args.next()
        {
            return (path, ConfigSource::CliArgument);
        }
    }

    if let Ok(path) = std::env::var("ORDERFLOW_CONFIG")
        && !path.is_empty()
    {
        return (path, ConfigSource::EnvironmentVariable);
    }

    (
        config::loader::DEFAULT_CONFIG_PATH.to_string(),
        ConfigSource::Default,
    )
}

/// Loads `.env` if present. A missing file is not an error.
pub fn load_dotenv() {
    if let Err(e) = dotenvy::dotenv()
        && !matches!(e, dotenvy::Error::Io(ref io_err) if io_err.kind() == std::io::ErrorKind::NotFound)
    {
        eprintln!("Warning: Failed to load .env file: {e}");
    }
}
