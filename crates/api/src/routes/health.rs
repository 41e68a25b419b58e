//! Health check endpoint.

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use common::ProductId;
use serde::Serialize;
use storage::StorageGateway;

use crate::state::AppState;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
}

/// GET /health — reports whether the store answers a point read.
pub async fn check<G: StorageGateway + Clone + 'static>(
    State(state): State<Arc<AppState<G>>>,
) -> (StatusCode, Json<HealthResponse>) {
    match state.ledger.gateway().find_product(ProductId::new()).await {
        Ok(_) => (StatusCode::OK, Json(HealthResponse { status: "ok" })),
        Err(e) => {
            tracing::warn!(error = %e, "health check failed");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(HealthResponse {
                    status: "unavailable",
                }),
            )
        }
    }
}
