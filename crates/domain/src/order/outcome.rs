//! Values returned to callers of the order ledger.

use common::{Money, Order, OrderId, ProductId};
use serde::Serialize;

/// Result of a successful placement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlacedOrder {
    pub order_id: OrderId,
    pub product_id: ProductId,
    pub quantity: u32,
    /// Price per unit at the moment the order was placed.
    pub unit_price: Money,
    pub total: Money,
}

impl From<&Order> for PlacedOrder {
    fn from(order: &Order) -> Self {
        Self {
            order_id: order.id,
            product_id: order.product_id,
            quantity: order.quantity,
            unit_price: order.unit_price,
            total: order.total(),
        }
    }
}

/// How a cancellation was settled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum CancellationStatus {
    /// Full refund.
    Refunded,
    /// Refund minus a restocking fee.
    FeeCharged,
}

impl CancellationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CancellationStatus::Refunded => "refunded",
            CancellationStatus::FeeCharged => "fee-charged",
        }
    }
}

impl std::fmt::Display for CancellationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of a successful cancellation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CancellationOutcome {
    pub order_id: OrderId,
    pub status: CancellationStatus,
    /// Present only when `status` is [`CancellationStatus::FeeCharged`].
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fee: Option<Money>,
    pub restocked_quantity: u32,
}
