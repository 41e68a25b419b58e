//! Rows persisted by the storage gateway.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{
    AdjustmentId, AdjustmentReason, CustomerId, Money, OrderId, OrderStatus, ProductId,
    ShipmentStatus,
};

/// A catalog product and its authoritative stock count.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    pub id: ProductId,
    pub name: String,
    pub description: String,
    pub category: String,
    pub unit_price: Money,
    /// Never negative at rest.
    pub stock_quantity: i64,
}

impl Product {
    pub fn new(
        name: impl Into<String>,
        category: impl Into<String>,
        unit_price: Money,
        stock_quantity: i64,
    ) -> Self {
        Self {
            id: ProductId::new(),
            name: name.into(),
            description: String::new(),
            category: category.into(),
            unit_price,
            stock_quantity,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }
}

/// A customer order for a single product line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    pub customer_id: CustomerId,
    pub product_id: ProductId,
    /// Fixed at creation.
    pub quantity: u32,
    /// Unit price snapshot taken when the order was placed.
    pub unit_price: Money,
    pub status: OrderStatus,
    pub shipment_status: ShipmentStatus,
    pub cancellation_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Order {
    /// Creates a freshly placed, not yet shipped order.
    pub fn placed(
        id: OrderId,
        customer_id: CustomerId,
        product_id: ProductId,
        quantity: u32,
        unit_price: Money,
    ) -> Self {
        let now = Utc::now();
        Self {
            id,
            customer_id,
            product_id,
            quantity,
            unit_price,
            status: OrderStatus::Placed,
            shipment_status: ShipmentStatus::NotShipped,
            cancellation_reason: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Unit price times quantity; clamps instead of overflowing.
    ///
    /// Placement rejects orders whose total does not fit, so stored orders
    /// never hit the clamp.
    pub fn total(&self) -> Money {
        self.unit_price.saturating_multiply(self.quantity)
    }
}

/// Append-only audit record of one stock mutation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InventoryAdjustment {
    pub id: AdjustmentId,
    pub product_id: ProductId,
    pub delta: i64,
    pub reason: AdjustmentReason,
    pub order_id: OrderId,
    pub created_at: DateTime<Utc>,
}

impl InventoryAdjustment {
    pub fn new(
        product_id: ProductId,
        delta: i64,
        reason: AdjustmentReason,
        order_id: OrderId,
    ) -> Self {
        Self {
            id: AdjustmentId::new(),
            product_id,
            delta,
            reason,
            order_id,
            created_at: Utc::now(),
        }
    }
}
