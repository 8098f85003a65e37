use std::time::Instant;

use axum::{
    body::Body,
    http::{HeaderName, HeaderValue, Request},
    middleware::Next,
    response::Response,
};
use uuid::Uuid;

pub const REQUEST_ID_HEADER: &str = "x-request-id";

// Middleware that ensures each request has an X-Request-Id and mirrors it on the response
pub async fn request_id(mut req: Request<Body>, next: Next) -> Response {
    let header_name = HeaderName::from_static(REQUEST_ID_HEADER);

    // Preserve an incoming request id; otherwise generate one
    let req_id_value = match req.headers().get(&header_name) {
        Some(value) => value.clone(),
        None => HeaderValue::from_str(&Uuid::new_v4().to_string())
            .unwrap_or_else(|_| HeaderValue::from_static("unknown")),
    };

    // Picked up by the trace span
    req.extensions_mut().insert(req_id_value.clone());

    let mut res = next.run(req).await;

    res.headers_mut().insert(header_name, req_id_value);

    res
}

/// Records request count and latency for every request.
pub async fn http_metrics(req: Request<Body>, next: Next) -> Response {
    let method = req.method().clone();
    let path = req.uri().path().to_owned();
    let started = Instant::now();

    let res = next.run(req).await;

    crate::metrics::record_http_request(
        method.as_str(),
        &path,
        res.status().as_u16(),
        started.elapsed(),
    );
    res
}
