//! Shared types for the order engine: identifiers, money, status enums and
//! the records persisted by the storage layer.

pub mod money;
pub mod records;
pub mod status;
pub mod types;

pub use money::Money;
pub use records::{InventoryAdjustment, Order, Product};
pub use status::{AdjustmentReason, OrderStatus, ShipmentStatus, UnknownStatus};
pub use types::{AdjustmentId, CustomerId, OrderId, ProductId};
