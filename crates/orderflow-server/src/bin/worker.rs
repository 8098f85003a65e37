//! Standalone persistence worker.
//!
//! Consumes the shared JetStream queue; run as many as needed.

use orderflow_server::config::QueueBackend;
use orderflow_server::config::loader::load_config;
use orderflow_server::{WorkerInfrastructure, load_dotenv, observability, resolve_config_path};
use tokio::sync::watch;

#[tokio::main]
async fn main() {
    load_dotenv();
    observability::init_tracing();

    let (config_path, source) = resolve_config_path();
    let cfg = match load_config(Some(&config_path)) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Configuration error: {e}");
            std::process::exit(2);
        }
    };
    tracing::info!(path = %config_path, source = %source, "Configuration loaded");
    observability::apply_logging_level(&cfg.logging.level);

    if cfg.queue.backend != QueueBackend::Nats {
        eprintln!("Configuration error: the standalone worker requires queue.backend = \"nats\"");
        std::process::exit(2);
    }

    orderflow_server::metrics::init_metrics();

    let infra = match WorkerInfrastructure::connect(&cfg).await {
        Ok(infra) => infra,
        Err(e) => {
            eprintln!("Worker initialization failed: {e:#}");
            std::process::exit(2);
        }
    };

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        orderflow_server::server::shutdown_signal().await;
        let _ = shutdown_tx.send(true);
    });

    let worker = infra.worker(&cfg);
    worker.run(infra.deliveries.as_ref(), shutdown_rx).await;

    infra.shutdown().await;
}
