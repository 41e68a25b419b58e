//! Catalog endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Query, State};
use common::Product;
use serde::{Deserialize, Serialize};
use storage::StorageGateway;

use crate::error::ApiError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct SearchParams {
    pub q: Option<String>,
}

#[derive(Serialize)]
pub struct ProductResponse {
    pub id: String,
    pub name: String,
    pub description: String,
    pub category: String,
    pub unit_price_cents: i64,
    pub unit_price: String,
    pub stock_quantity: i64,
}

impl From<Product> for ProductResponse {
    fn from(product: Product) -> Self {
        Self {
            id: product.id.to_string(),
            name: product.name,
            description: product.description,
            category: product.category,
            unit_price_cents: product.unit_price.cents(),
            unit_price: product.unit_price.to_string(),
            stock_quantity: product.stock_quantity,
        }
    }
}

/// GET /products?q= — search the catalog, or list it when no query is given.
#[tracing::instrument(skip(state))]
pub async fn search<G: StorageGateway + Clone + 'static>(
    State(state): State<Arc<AppState<G>>>,
    Query(params): Query<SearchParams>,
) -> Result<Json<Vec<ProductResponse>>, ApiError> {
    let products = match params.q.as_deref() {
        Some(query) => state.catalog.search(query).await?,
        None => state.catalog.list().await?,
    };
    Ok(Json(products.into_iter().map(ProductResponse::from).collect()))
}
