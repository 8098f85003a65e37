use std::sync::Arc;
use std::time::Instant;

use axum::{
    Json,
    extract::{Path, Query, State, rejection::JsonRejection},
    http::{HeaderName, HeaderValue, StatusCode, header},
    response::IntoResponse,
};
use orderflow_api::{ApiError, ApiResponse};
use orderflow_core::{BulkOrderRequest, DailySale, NewOrder, Order, parse_id};
use orderflow_storage::DynOrderStore;
use serde::Deserialize;
use serde_json::{Value, json};

use crate::bulk::process_bulk_order;
use crate::cache::OrderCache;
use crate::queue::DynOrderPublisher;
use crate::scheduler::ViewRefresher;
use crate::search::DynOrderSearch;

pub const X_CACHE: HeaderName = HeaderName::from_static("x-cache");

/// Shared clients handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub store: DynOrderStore,
    pub cache: Arc<dyn OrderCache>,
    pub publisher: DynOrderPublisher,
    pub search: DynOrderSearch,
    pub refresher: ViewRefresher,
}

pub async fn healthz() -> impl IntoResponse {
    (StatusCode::OK, Json(json!({"status": "ok"})))
}

pub async fn metrics() -> impl IntoResponse {
    match crate::metrics::render_metrics() {
        Some(body) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            body,
        )
            .into_response(),
        None => (StatusCode::SERVICE_UNAVAILABLE, "metrics not initialized").into_response(),
    }
}

/// `POST /api/orders`
///
/// Accepts the order into the cache and the queue and answers before it is
/// persisted.
pub async fn create_order(
    State(state): State<AppState>,
    payload: Result<Json<NewOrder>, JsonRejection>,
) -> Result<ApiResponse<Value>, ApiError> {
    let Json(new_order) = payload.map_err(|e| {
        tracing::debug!(error = %e, "rejected order payload");
        ApiError::bad_request("invalid JSON payload")
    })?;
    new_order.validate()?;

    let order = Order::accept(new_order);

    if let Err(e) = state.cache.put(&order).await {
        crate::metrics::record_cache_error("put");
        tracing::warn!(order_id = %order.id, error = %e, "Failed to cache accepted order");
    }

    if let Err(e) = state.publisher.publish(&order).await {
        crate::metrics::record_publish_failure();
        tracing::error!(order_id = %order.id, error = %e, "Failed to enqueue order");
        // The id was never accepted, so it must not stay readable
        if let Err(e) = state.cache.remove(order.id).await {
            crate::metrics::record_cache_error("remove");
            tracing::warn!(order_id = %order.id, error = %e, "Failed to drop cached order");
        }
        return Err(ApiError::internal("failed to enqueue order"));
    }

    crate::metrics::record_order_accepted();
    tracing::info!(order_id = %order.id, "order accepted");
    Ok(ApiResponse::accepted(json!({
        "status": "processing",
        "order_id": order.id,
    })))
}

/// `GET /api/orders/{id}`
pub async fn get_order(
    State(state): State<AppState>,
    Path(raw_id): Path<String>,
) -> Result<ApiResponse<Order>, ApiError> {
    // A malformed id was never handed out, so it names no order
    let id = parse_id(&raw_id)?;

    match state.cache.get(id).await {
        Ok(Some(order)) => {
            return Ok(ApiResponse::ok(order).with_header(X_CACHE, HeaderValue::from_static("HIT")));
        }
        Ok(None) => {}
        Err(e) => {
            crate::metrics::record_cache_error("get");
            tracing::warn!(order_id = %id, error = %e, "Cache lookup failed, reading record store");
        }
    }

    let started = Instant::now();
    let found = state.store.get_by_id(id).await;
    crate::metrics::record_db_query("get_order", started.elapsed());
    let order = found.map_err(|e| {
        if !e.is_not_found() {
            tracing::error!(order_id = %id, error = %e, category = %e.category(), "Failed to read order");
        }
        ApiError::from(e)
    })?;

    if let Err(e) = state.cache.put(&order).await {
        crate::metrics::record_cache_error("put");
        tracing::warn!(order_id = %id, error = %e, "Failed to back-fill cache");
    }

    Ok(ApiResponse::ok(order).with_header(X_CACHE, HeaderValue::from_static("MISS")))
}

#[derive(Debug, Deserialize)]
pub struct SearchParams {
    pub q: Option<String>,
}

/// `GET /api/search?q=term`, returning the search engine's payload as is.
pub async fn search_orders(
    State(state): State<AppState>,
    Query(params): Query<SearchParams>,
) -> Result<impl IntoResponse, ApiError> {
    let term = params.q.unwrap_or_default();
    let term = term.trim();
    if term.is_empty() {
        return Err(ApiError::bad_request("missing required query parameter: q"));
    }

    let body = state.search.search(term).await.map_err(|e| {
        tracing::error!(error = %e, "Search request failed");
        ApiError::internal("search engine error")
    })?;

    Ok((
        StatusCode::OK,
        [(header::CONTENT_TYPE, "application/json")],
        body,
    ))
}

/// `GET /api/dashboard/sales`
pub async fn dashboard_sales(
    State(state): State<AppState>,
) -> Result<ApiResponse<Vec<DailySale>>, ApiError> {
    let started = Instant::now();
    let rows = state.store.daily_sales().await;
    crate::metrics::record_db_query("daily_sales", started.elapsed());

    let rows = rows.map_err(|e| {
        tracing::error!(error = %e, "Failed to read daily sales view");
        ApiError::internal("failed to fetch dashboard data")
    })?;
    Ok(ApiResponse::ok(rows))
}

/// `POST /api/admin/refresh`
pub async fn refresh_view(State(state): State<AppState>) -> Result<ApiResponse<Value>, ApiError> {
    let elapsed = state.refresher.trigger().await.map_err(|e| {
        tracing::error!(error = %e, "Manual view refresh failed");
        ApiError::internal(format!("failed to refresh view: {e}"))
    })?;

    tracing::info!(duration_ms = elapsed.as_millis() as u64, "daily sales view refreshed");
    Ok(ApiResponse::ok(json!({
        "status": "refreshed",
        "duration_ms": elapsed.as_millis() as u64,
    })))
}

/// `POST /api/bulk-orders`
pub async fn bulk_orders(
    State(state): State<AppState>,
    payload: Result<Json<BulkOrderRequest>, JsonRejection>,
) -> Result<ApiResponse<Value>, ApiError> {
    let Json(request) = payload.map_err(|_| ApiError::bad_request("invalid JSON payload"))?;

    let started = Instant::now();
    let written = process_bulk_order(state.store.as_ref(), &request).await;
    crate::metrics::record_db_query("bulk_insert", started.elapsed());

    let orders = written.map_err(|e| ApiError::internal(format!("transaction failed: {e}")))?;
    Ok(ApiResponse::created(json!({
        "status": "committed",
        "orders": orders,
    })))
}
