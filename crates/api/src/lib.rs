//! HTTP API server with observability for the order and inventory engine.
//!
//! Provides REST endpoints for catalog search, order placement,
//! policy-gated cancellation and fulfillment updates, with structured
//! logging (tracing) and Prometheus metrics.

pub mod config;
pub mod error;
pub mod routes;
pub mod seed;
pub mod state;
pub mod validation;

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post};
use metrics_exporter_prometheus::PrometheusHandle;
use storage::StorageGateway;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::config::Config;
use crate::state::AppState;

/// Creates the Axum application router with all routes and shared state.
pub fn create_app<G: StorageGateway + Clone + 'static>(
    state: Arc<AppState<G>>,
    metrics_handle: PrometheusHandle,
) -> Router {
    let metrics_router = Router::new()
        .route("/metrics", get(routes::metrics::get))
        .with_state(metrics_handle);

    Router::new()
        .route("/health", get(routes::health::check::<G>))
        .route("/products", get(routes::products::search::<G>))
        .route("/orders", post(routes::orders::place::<G>))
        .route("/orders/{id}", get(routes::orders::get::<G>))
        .route("/orders/{id}/cancel", post(routes::orders::cancel::<G>))
        .route("/orders/{id}/ship", post(routes::orders::ship::<G>))
        .route("/orders/{id}/deliver", post(routes::orders::deliver::<G>))
        .route(
            "/customers/{id}/orders",
            get(routes::orders::for_customer::<G>),
        )
        .with_state(state)
        .merge(metrics_router)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
}

/// Creates the application state over `gateway`, configured from `config`.
pub fn create_state<G: StorageGateway + Clone + 'static>(
    gateway: G,
    config: &Config,
) -> Arc<AppState<G>> {
    Arc::new(AppState::new(gateway, config))
}
