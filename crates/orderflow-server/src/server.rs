use std::future::Future;
use std::net::SocketAddr;
use std::time::Duration;

use axum::{
    Router, middleware,
    routing::{get, post},
};
use tokio::net::TcpListener;
use tower_http::{
    compression::CompressionLayer,
    cors::CorsLayer,
    timeout::{RequestBodyTimeoutLayer, TimeoutLayer},
    trace::TraceLayer,
};

use crate::bootstrap::Infrastructure;
use crate::config::{AppConfig, ServerConfig};
use crate::handlers::{self, AppState};
use crate::middleware as app_middleware;
use crate::scheduler::{RefreshSchedule, RefreshScheduler, SchedulerHandle};
use crate::worker::WorkerHandle;

pub fn build_app(state: AppState, cfg: &ServerConfig) -> Router {
    let body_limit = cfg.body_limit_bytes;

    // Request deadline applies to the order API only; a manual refresh is
    // bounded by its own, longer deadline
    let api = Router::new()
        .route("/api/orders", post(handlers::create_order))
        .route("/api/orders/{id}", get(handlers::get_order))
        .route("/api/search", get(handlers::search_orders))
        .route("/api/dashboard/sales", get(handlers::dashboard_sales))
        .route("/api/bulk-orders", post(handlers::bulk_orders))
        .layer(TimeoutLayer::new(Duration::from_millis(cfg.write_timeout_ms)));

    let admin = Router::new().route("/api/admin/refresh", post(handlers::refresh_view));

    Router::new()
        .route("/healthz", get(handlers::healthz))
        .route("/metrics", get(handlers::metrics))
        .merge(api)
        .merge(admin)
        .with_state(state)
        // Layers added later run first: body limits -> request id -> trace -> compression/cors -> metrics
        .layer(middleware::from_fn(app_middleware::http_metrics))
        .layer(CorsLayer::permissive())
        .layer(CompressionLayer::new())
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(|req: &axum::http::Request<_>| {
                    use tracing::field::Empty;
                    let req_id = req
                        .extensions()
                        .get::<axum::http::HeaderValue>()
                        .and_then(|v| v.to_str().ok())
                        .unwrap_or("")
                        .to_string();
                    tracing::info_span!(
                        "http.request",
                        http.method = %req.method(),
                        http.target = %req.uri(),
                        http.status_code = Empty,
                        request_id = %req_id
                    )
                })
                .on_response(
                    |res: &axum::http::Response<_>, latency: Duration, span: &tracing::Span| {
                        span.record("http.status_code", tracing::field::display(res.status().as_u16()));
                        tracing::info!(
                            http.status = %res.status().as_u16(),
                            elapsed_ms = %latency.as_millis(),
                            "request handled"
                        );
                    },
                ),
        )
        .layer(middleware::from_fn(app_middleware::request_id))
        .layer(RequestBodyTimeoutLayer::new(Duration::from_millis(
            cfg.read_timeout_ms,
        )))
        .layer(axum::extract::DefaultBodyLimit::max(body_limit))
}

pub struct ServerBuilder {
    addr: SocketAddr,
    config: AppConfig,
}

impl Default for ServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ServerBuilder {
    pub fn new() -> Self {
        let cfg = AppConfig::default();
        Self {
            addr: cfg.addr(),
            config: cfg,
        }
    }

    pub fn with_addr(mut self, addr: SocketAddr) -> Self {
        self.addr = addr;
        self
    }

    pub fn with_config(mut self, cfg: AppConfig) -> Self {
        self.addr = cfg.addr();
        self.config = cfg;
        self
    }

    /// Connects every external client, then builds the server.
    pub async fn build(self) -> anyhow::Result<OrderflowServer> {
        let infra = Infrastructure::connect(&self.config).await?;
        Ok(self.build_with(infra))
    }

    /// Builds the server around clients that already exist.
    pub fn build_with(self, infra: Infrastructure) -> OrderflowServer {
        let app = build_app(infra.app_state(&self.config), &self.config.server);

        OrderflowServer {
            addr: self.addr,
            app,
            config: self.config,
            infra,
        }
    }
}

pub struct OrderflowServer {
    addr: SocketAddr,
    app: Router,
    config: AppConfig,
    infra: Infrastructure,
}

impl OrderflowServer {
    pub fn infrastructure(&self) -> &Infrastructure {
        &self.infra
    }

    pub fn router(&self) -> Router {
        self.app.clone()
    }

    /// Binds the configured address and serves until SIGINT or SIGTERM.
    pub async fn run(self) -> anyhow::Result<()> {
        let listener = TcpListener::bind(self.addr).await?;
        self.serve(listener, shutdown_signal()).await
    }

    /// Serves on `listener` until `shutdown` resolves, then stops the
    /// background tasks and closes shared clients.
    pub async fn serve(
        self,
        listener: TcpListener,
        shutdown: impl Future<Output = ()> + Send + 'static,
    ) -> anyhow::Result<()> {
        let Self {
            app, config, infra, ..
        } = self;

        let scheduler = start_scheduler(&infra, &config)?;
        let worker = start_embedded_worker(&infra, &config);

        tracing::info!("listening on {}", listener.local_addr()?);
        let served = axum::serve(listener, app)
            .with_graceful_shutdown(shutdown)
            .await;

        // Drain order: HTTP, then scheduler, then worker, then clients
        if let Some(scheduler) = scheduler {
            scheduler.stop().await;
        }
        if let Some(worker) = worker {
            worker.stop().await;
        }
        infra.shutdown().await;

        served?;
        Ok(())
    }
}

fn start_scheduler(
    infra: &Infrastructure,
    config: &AppConfig,
) -> anyhow::Result<Option<SchedulerHandle>> {
    if !config.refresh.enabled {
        tracing::info!("Scheduled view refresh disabled");
        return Ok(None);
    }
    let schedule = RefreshSchedule::parse(&config.refresh.schedule)?;
    Ok(Some(
        RefreshScheduler::new(infra.refresher(config), schedule).start(),
    ))
}

fn start_embedded_worker(infra: &Infrastructure, config: &AppConfig) -> Option<WorkerHandle> {
    if !config.worker.embedded {
        return None;
    }
    tracing::info!("Starting embedded persistence worker");
    let worker = std::sync::Arc::new(infra.worker(config));
    Some(worker.start(infra.deliveries.clone()))
}

pub async fn shutdown_signal() {
    let ctrl_c = async {
        let _ = tokio::signal::ctrl_c().await;
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    tracing::info!("shutdown signal received");
}
