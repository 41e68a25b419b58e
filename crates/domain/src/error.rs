//! Engine error types.

use common::{Money, OrderId, OrderStatus, ProductId};
use storage::StorageError;
use thiserror::Error;

use crate::policy::PolicyError;

/// Coarse classification callers use to decide how to react to an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The request itself is malformed; resubmitting it unchanged never works.
    InvalidInput,
    /// The referenced product or order does not exist.
    NotFound,
    /// An expected business outcome, such as a denied cancellation.
    BusinessRule,
    /// Contention or an unreachable store; the same request may succeed later.
    Transient,
    /// A fault in the system itself.
    Internal,
}

/// Errors that can occur during engine operations.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Order quantity must be positive.
    #[error("Invalid quantity: {quantity} (must be greater than 0)")]
    InvalidQuantity { quantity: u32 },

    /// Unit price times quantity does not fit in the money range.
    #[error("Order total out of range: {quantity} x {unit_price}")]
    AmountOutOfRange { unit_price: Money, quantity: u32 },

    #[error("Product not found: {0}")]
    ProductNotFound(ProductId),

    /// Not enough stock to reserve the requested quantity.
    #[error(
        "Insufficient stock for product {product_id}: requested {requested}, available {available}"
    )]
    InsufficientStock {
        product_id: ProductId,
        requested: u32,
        available: i64,
    },

    #[error("Order not found: {0}")]
    OrderNotFound(OrderId),

    /// The cancellation policy refused the request.
    #[error("Cancellation denied for order {order_id}: {reason}")]
    CancellationDenied { order_id: OrderId, reason: String },

    /// The order state machine does not allow this move.
    #[error("Invalid state transition for order {order_id}: cannot move from {from} to {to}")]
    InvalidTransition {
        order_id: OrderId,
        from: OrderStatus,
        to: OrderStatus,
    },

    /// Every attempt of a transaction lost to a concurrent writer.
    #[error("Transaction abandoned after {attempts} conflicting attempts")]
    TransientFailure { attempts: u32 },

    /// An error occurred in the storage layer.
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    /// The cancellation rule table did not cover a case.
    #[error("Policy engine defect: {0}")]
    PolicyEngineDefect(#[from] PolicyError),
}

impl EngineError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            EngineError::InvalidQuantity { .. } | EngineError::AmountOutOfRange { .. } => {
                ErrorKind::InvalidInput
            }
            EngineError::ProductNotFound(_) | EngineError::OrderNotFound(_) => ErrorKind::NotFound,
            EngineError::InsufficientStock { .. }
            | EngineError::CancellationDenied { .. }
            | EngineError::InvalidTransition { .. } => ErrorKind::BusinessRule,
            EngineError::TransientFailure { .. } => ErrorKind::Transient,
            EngineError::Storage(StorageError::ConcurrencyConflict(_))
            | EngineError::Storage(StorageError::Unavailable(_)) => ErrorKind::Transient,
            EngineError::Storage(_) | EngineError::PolicyEngineDefect(_) => ErrorKind::Internal,
        }
    }

    /// True when the failure came from a concurrent writer and the whole
    /// transaction may be re-run.
    pub fn is_concurrency_conflict(&self) -> bool {
        matches!(self, EngineError::Storage(e) if e.is_concurrency_conflict())
    }
}

/// Result type for engine operations.
pub type Result<T> = std::result::Result<T, EngineError>;
