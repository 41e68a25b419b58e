//! API error types with HTTP response mapping.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use domain::{EngineError, ErrorKind};
use thiserror::Error;

/// API-level error type that maps to HTTP responses.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Request failed validation before reaching the engine.
    #[error("{0}")]
    BadRequest(String),
    /// Error reported by the engine.
    #[error(transparent)]
    Engine(#[from] EngineError),
}

fn kind_label(kind: ErrorKind) -> &'static str {
    match kind {
        ErrorKind::InvalidInput => "invalid_input",
        ErrorKind::NotFound => "not_found",
        ErrorKind::BusinessRule => "business_rule",
        ErrorKind::Transient => "transient",
        ErrorKind::Internal => "internal",
    }
}

fn status_for(kind: ErrorKind) -> StatusCode {
    match kind {
        ErrorKind::InvalidInput => StatusCode::BAD_REQUEST,
        ErrorKind::NotFound => StatusCode::NOT_FOUND,
        ErrorKind::BusinessRule => StatusCode::CONFLICT,
        ErrorKind::Transient => StatusCode::SERVICE_UNAVAILABLE,
        ErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl ApiError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ApiError::BadRequest(_) => ErrorKind::InvalidInput,
            ApiError::Engine(err) => err.kind(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let kind = self.kind();
        let message = match &self {
            ApiError::Engine(err) if kind == ErrorKind::Internal => {
                tracing::error!(error = %err, "internal server error");
                "internal server error".to_string()
            }
            other => other.to_string(),
        };

        let body = serde_json::json!({ "error": message, "kind": kind_label(kind) });
        (status_for(kind), axum::Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use common::OrderId;

    use super::*;

    #[test]
    fn test_status_mapping() {
        let denied = ApiError::from(EngineError::CancellationDenied {
            order_id: OrderId::new(),
            reason: "shipment has already been delivered".to_string(),
        });
        assert_eq!(status_for(denied.kind()), StatusCode::CONFLICT);

        let transient = ApiError::from(EngineError::TransientFailure { attempts: 5 });
        assert_eq!(status_for(transient.kind()), StatusCode::SERVICE_UNAVAILABLE);

        let bad = ApiError::BadRequest("quantity must be between 1 and 49".to_string());
        assert_eq!(bad.into_response().status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_not_found_mapping() {
        let missing = ApiError::from(EngineError::OrderNotFound(OrderId::new()));
        assert_eq!(missing.into_response().status(), StatusCode::NOT_FOUND);
    }
}
