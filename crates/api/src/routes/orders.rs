//! Order placement, cancellation and fulfillment endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use common::{CustomerId, Order, OrderId, ProductId};
use domain::CancellationOutcome;
use serde::{Deserialize, Serialize};
use storage::StorageGateway;

use crate::error::ApiError;
use crate::state::AppState;
use crate::validation;

// -- Request types --

#[derive(Deserialize)]
pub struct PlaceOrderRequest {
    pub customer_id: String,
    pub product_id: String,
    pub quantity: i64,
}

#[derive(Deserialize)]
pub struct CancelOrderRequest {
    pub reason: String,
}

// -- Response types --

#[derive(Serialize)]
pub struct OrderPlacedResponse {
    pub order_id: String,
    pub product_id: String,
    pub quantity: u32,
    pub unit_price_cents: i64,
    pub total_cents: i64,
    pub total: String,
    pub estimated_delivery: String,
}

#[derive(Serialize)]
pub struct OrderResponse {
    pub id: String,
    pub customer_id: String,
    pub product_id: String,
    pub quantity: u32,
    pub unit_price_cents: i64,
    pub total_cents: i64,
    pub status: String,
    pub shipment_status: String,
    pub cancellation_reason: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl From<Order> for OrderResponse {
    fn from(order: Order) -> Self {
        Self {
            id: order.id.to_string(),
            customer_id: order.customer_id.to_string(),
            product_id: order.product_id.to_string(),
            quantity: order.quantity,
            unit_price_cents: order.unit_price.cents(),
            total_cents: order.total().cents(),
            status: order.status.to_string(),
            shipment_status: order.shipment_status.to_string(),
            cancellation_reason: order.cancellation_reason,
            created_at: order.created_at.to_rfc3339(),
            updated_at: order.updated_at.to_rfc3339(),
        }
    }
}

#[derive(Serialize)]
pub struct CancellationResponse {
    pub order_id: String,
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fee_cents: Option<i64>,
    pub restocked_quantity: u32,
}

impl From<CancellationOutcome> for CancellationResponse {
    fn from(outcome: CancellationOutcome) -> Self {
        Self {
            order_id: outcome.order_id.to_string(),
            status: outcome.status.to_string(),
            fee_cents: outcome.fee.map(|fee| fee.cents()),
            restocked_quantity: outcome.restocked_quantity,
        }
    }
}

// -- Handlers --

/// POST /orders — reserve stock and place an order.
#[tracing::instrument(skip(state, req))]
pub async fn place<G: StorageGateway + Clone + 'static>(
    State(state): State<Arc<AppState<G>>>,
    Json(req): Json<PlaceOrderRequest>,
) -> Result<(StatusCode, Json<OrderPlacedResponse>), ApiError> {
    let customer_id: CustomerId = validation::id("customer_id", &req.customer_id)?;
    let product_id: ProductId = validation::id("product_id", &req.product_id)?;
    let quantity = validation::quantity(req.quantity)?;

    let placed = state
        .ledger
        .place_order(customer_id, product_id, quantity)
        .await?;
    let estimated_delivery = (chrono::Utc::now() + state.delivery_offset).date_naive();

    let response = OrderPlacedResponse {
        order_id: placed.order_id.to_string(),
        product_id: placed.product_id.to_string(),
        quantity: placed.quantity,
        unit_price_cents: placed.unit_price.cents(),
        total_cents: placed.total.cents(),
        total: placed.total.to_string(),
        estimated_delivery: estimated_delivery.format("%Y-%m-%d").to_string(),
    };

    Ok((StatusCode::CREATED, Json(response)))
}

/// GET /orders/{id} — load an order by ID.
#[tracing::instrument(skip(state))]
pub async fn get<G: StorageGateway + Clone + 'static>(
    State(state): State<Arc<AppState<G>>>,
    Path(id): Path<String>,
) -> Result<Json<OrderResponse>, ApiError> {
    let order_id: OrderId = validation::id("order_id", &id)?;
    let order = state.ledger.get_order(order_id).await?;
    Ok(Json(order.into()))
}

/// POST /orders/{id}/cancel — cancel an order if policy allows.
#[tracing::instrument(skip(state, req))]
pub async fn cancel<G: StorageGateway + Clone + 'static>(
    State(state): State<Arc<AppState<G>>>,
    Path(id): Path<String>,
    Json(req): Json<CancelOrderRequest>,
) -> Result<Json<CancellationResponse>, ApiError> {
    let order_id: OrderId = validation::id("order_id", &id)?;
    let reason = validation::reason(&req.reason)?;

    let outcome = state.ledger.cancel_order(order_id, reason).await?;
    Ok(Json(outcome.into()))
}

/// POST /orders/{id}/ship — fulfillment reports the order as shipped.
#[tracing::instrument(skip(state))]
pub async fn ship<G: StorageGateway + Clone + 'static>(
    State(state): State<Arc<AppState<G>>>,
    Path(id): Path<String>,
) -> Result<Json<OrderResponse>, ApiError> {
    let order_id: OrderId = validation::id("order_id", &id)?;
    let order = state.ledger.mark_shipped(order_id).await?;
    Ok(Json(order.into()))
}

/// POST /orders/{id}/deliver — fulfillment reports the order as delivered.
#[tracing::instrument(skip(state))]
pub async fn deliver<G: StorageGateway + Clone + 'static>(
    State(state): State<Arc<AppState<G>>>,
    Path(id): Path<String>,
) -> Result<Json<OrderResponse>, ApiError> {
    let order_id: OrderId = validation::id("order_id", &id)?;
    let order = state.ledger.mark_delivered(order_id).await?;
    Ok(Json(order.into()))
}

/// GET /customers/{id}/orders — a customer's orders, oldest first.
#[tracing::instrument(skip(state))]
pub async fn for_customer<G: StorageGateway + Clone + 'static>(
    State(state): State<Arc<AppState<G>>>,
    Path(id): Path<String>,
) -> Result<Json<Vec<OrderResponse>>, ApiError> {
    let customer_id: CustomerId = validation::id("customer_id", &id)?;
    let orders = state.ledger.orders_for_customer(customer_id).await?;
    Ok(Json(orders.into_iter().map(OrderResponse::from).collect()))
}
