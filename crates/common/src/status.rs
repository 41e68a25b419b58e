//! Order and shipment status enums.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Returned when a stored status string does not name a known variant.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown {kind} value: {value}")]
pub struct UnknownStatus {
    pub kind: &'static str,
    pub value: String,
}

/// The state of an order in its lifecycle.
///
/// State transitions:
/// ```text
/// Placed ──► Shipped ──► Delivered
///   │           │
///   └───────────┴──► Cancelled
/// ```
/// `Delivered` and `Cancelled` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    Placed,
    Shipped,
    Delivered,
    Cancelled,
}

impl OrderStatus {
    pub const ALL: [OrderStatus; 4] = [
        OrderStatus::Placed,
        OrderStatus::Shipped,
        OrderStatus::Delivered,
        OrderStatus::Cancelled,
    ];

    /// Returns true if the state machine allows moving from `self` to `next`.
    pub fn can_transition_to(&self, next: OrderStatus) -> bool {
        matches!(
            (self, next),
            (OrderStatus::Placed, OrderStatus::Shipped)
                | (OrderStatus::Placed, OrderStatus::Cancelled)
                | (OrderStatus::Shipped, OrderStatus::Delivered)
                | (OrderStatus::Shipped, OrderStatus::Cancelled)
        )
    }

    /// Returns true if this is a terminal state (no further transitions possible).
    pub fn is_terminal(&self) -> bool {
        matches!(self, OrderStatus::Delivered | OrderStatus::Cancelled)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Placed => "placed",
            OrderStatus::Shipped => "shipped",
            OrderStatus::Delivered => "delivered",
            OrderStatus::Cancelled => "cancelled",
        }
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for OrderStatus {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        OrderStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| UnknownStatus {
                kind: "order status",
                value: s.to_string(),
            })
    }
}

/// Fulfillment state, maintained by the fulfillment collaborator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ShipmentStatus {
    #[default]
    NotShipped,
    InTransit,
    Delivered,
}

impl ShipmentStatus {
    pub const ALL: [ShipmentStatus; 3] = [
        ShipmentStatus::NotShipped,
        ShipmentStatus::InTransit,
        ShipmentStatus::Delivered,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ShipmentStatus::NotShipped => "not_shipped",
            ShipmentStatus::InTransit => "in_transit",
            ShipmentStatus::Delivered => "delivered",
        }
    }
}

impl std::fmt::Display for ShipmentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ShipmentStatus {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ShipmentStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| UnknownStatus {
                kind: "shipment status",
                value: s.to_string(),
            })
    }
}

/// Why an inventory adjustment was recorded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdjustmentReason {
    OrderPlaced,
    OrderCancelledRestock,
}

impl AdjustmentReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            AdjustmentReason::OrderPlaced => "order_placed",
            AdjustmentReason::OrderCancelledRestock => "order_cancelled_restock",
        }
    }
}

impl std::fmt::Display for AdjustmentReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for AdjustmentReason {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "order_placed" => Ok(AdjustmentReason::OrderPlaced),
            "order_cancelled_restock" => Ok(AdjustmentReason::OrderCancelledRestock),
            other => Err(UnknownStatus {
                kind: "adjustment reason",
                value: other.to_string(),
            }),
        }
    }
}
