use axum::http::{HeaderName, HeaderValue, StatusCode, header};
use axum::response::{IntoResponse, Response};
use orderflow_core::CoreError;
use orderflow_storage::StorageError;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// JSON error envelope: `{"error": {"status": 404, "message": "..."}}`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ErrorBody {
    pub error: ErrorDetail,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ErrorDetail {
    pub status: u16,
    pub message: String,
}

/// High-level API errors mapped to HTTP responses.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Bad request: {0}")]
    BadRequest(String),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Internal server error: {0}")]
    Internal(String),
}

impl ApiError {
    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self::BadRequest(msg.into())
    }
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn message(&self) -> &str {
        match self {
            ApiError::BadRequest(msg) | ApiError::NotFound(msg) | ApiError::Internal(msg) => msg,
        }
    }

    pub fn to_body(&self) -> ErrorBody {
        ErrorBody {
            error: ErrorDetail {
                status: self.status_code().as_u16(),
                message: self.message().to_string(),
            },
        }
    }
}

impl From<StorageError> for ApiError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::NotFound { .. } => ApiError::not_found("order not found"),
            other => ApiError::internal(other.to_string()),
        }
    }
}

impl From<CoreError> for ApiError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::InvalidId(_) => ApiError::not_found("order not found"),
            other => ApiError::bad_request(other.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = serde_json::to_vec(&self.to_body()).unwrap_or_else(|_| b"{}".to_vec());

        axum::http::Response::builder()
            .status(status)
            .header(
                header::CONTENT_TYPE,
                HeaderValue::from_static("application/json"),
            )
            .body(axum::body::Body::from(body))
            .unwrap_or_else(|_| status.into_response())
    }
}

/// JSON response with an explicit status and extra headers.
#[derive(Debug, Clone)]
pub struct ApiResponse<T> {
    pub value: T,
    pub status: StatusCode,
    pub headers: Vec<(HeaderName, HeaderValue)>,
}

impl<T> ApiResponse<T> {
    pub fn new(value: T, status: StatusCode) -> Self {
        Self {
            value,
            status,
            headers: Vec::new(),
        }
    }

    pub fn ok(value: T) -> Self {
        Self::new(value, StatusCode::OK)
    }

    pub fn accepted(value: T) -> Self {
        Self::new(value, StatusCode::ACCEPTED)
    }

    pub fn created(value: T) -> Self {
        Self::new(value, StatusCode::CREATED)
    }

    pub fn with_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.push((name, value));
        self
    }
}

impl<T: Serialize> IntoResponse for ApiResponse<T> {
    fn into_response(self) -> Response {
        let body = match serde_json::to_vec(&self.value) {
            Ok(b) => b,
            Err(e) => {
                return ApiError::internal(format!("response serialization failed: {e}"))
                    .into_response();
            }
        };
        let mut builder = axum::http::Response::builder()
            .status(self.status)
            .header(
                header::CONTENT_TYPE,
                HeaderValue::from_static("application/json"),
            );
        for (n, v) in self.headers.into_iter() {
            builder = builder.header(n, v);
        }
        builder
            .body(axum::body::Body::from(body))
            .unwrap_or_else(|_| StatusCode::INTERNAL_SERVER_ERROR.into_response())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use orderflow_storage::StorageError;
    use std::time::Duration;

    #[test]
    fn into_response_sets_status_and_content_type() {
        let resp = ApiError::bad_request("Invalid body").into_response();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let content_type = resp.headers().get(header::CONTENT_TYPE).unwrap();
        assert_eq!(content_type, &HeaderValue::from_static("application/json"));
    }

    #[test]
    fn error_body_shape() {
        let body = serde_json::to_value(ApiError::not_found("order not found").to_body()).unwrap();
        assert_eq!(
            body,
            serde_json::json!({"error": {"status": 404, "message": "order not found"}})
        );
    }

    #[test]
    fn storage_errors_map_to_404_only_when_absent() {
        let cases: Vec<(StorageError, StatusCode)> = vec![
            (
                StorageError::not_found(uuid::Uuid::nil()),
                StatusCode::NOT_FOUND,
            ),
            (
                StorageError::connection_error("refused"),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
            (
                StorageError::timeout("get_by_id", Duration::from_secs(5)),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
            (
                StorageError::internal("boom"),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];
        for (err, status) in cases {
            assert_eq!(ApiError::from(err).status_code(), status);
        }
    }

    #[test]
    fn core_errors_map_to_client_errors() {
        assert_eq!(
            ApiError::from(CoreError::invalid_order("amount must be a finite number"))
                .status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ApiError::from(CoreError::invalid_id("abc")).status_code(),
            StatusCode::NOT_FOUND
        );
    }

    #[test]
    fn api_response_carries_status_and_headers() {
        let resp = ApiResponse::accepted(serde_json::json!({"status": "processing"}))
            .with_header(
                HeaderName::from_static("x-cache"),
                HeaderValue::from_static("MISS"),
            )
            .into_response();
        assert_eq!(resp.status(), StatusCode::ACCEPTED);
        assert_eq!(resp.headers().get("x-cache").unwrap(), "MISS");
    }
}
