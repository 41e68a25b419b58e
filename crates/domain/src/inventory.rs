//! Inventory ledger: every stock change paired with an audit row.
//!
//! All mutating operations take an open transaction and never commit it.
//! They are only meaningful as part of a larger unit of work owned by the
//! caller, so a failure anywhere later in that unit undoes both the stock
//! change and its audit row.

use common::{AdjustmentReason, InventoryAdjustment, OrderId, Product, ProductId};
use serde::Serialize;
use storage::{StorageGateway, StorageTransaction};

use crate::error::{EngineError, Result};

/// Stock movement operations.
#[derive(Debug, Clone, Copy, Default)]
pub struct InventoryLedger;

impl InventoryLedger {
    /// Takes `quantity` units out of stock for `order_id`.
    ///
    /// Locks the product row, so concurrent reservations of the same product
    /// serialize. Returns the product as it was before the decrement.
    #[tracing::instrument(skip(tx))]
    pub async fn reserve<T: StorageTransaction>(
        tx: &mut T,
        product_id: ProductId,
        quantity: u32,
        order_id: OrderId,
    ) -> Result<Product> {
        if quantity == 0 {
            return Err(EngineError::InvalidQuantity { quantity });
        }

        let product = tx
            .lock_product(product_id)
            .await?
            .ok_or(EngineError::ProductNotFound(product_id))?;

        let requested = i64::from(quantity);
        if requested > product.stock_quantity {
            return Err(EngineError::InsufficientStock {
                product_id,
                requested: quantity,
                available: product.stock_quantity,
            });
        }

        tx.update_product_stock(product_id, product.stock_quantity - requested)
            .await?;
        tx.insert_adjustment(&InventoryAdjustment::new(
            product_id,
            -requested,
            AdjustmentReason::OrderPlaced,
            order_id,
        ))
        .await?;

        tracing::debug!(
            remaining = product.stock_quantity - requested,
            "stock reserved"
        );
        Ok(product)
    }

    /// Puts `quantity` units back into stock after `order_id` was cancelled.
    /// Returns the new stock level.
    #[tracing::instrument(skip(tx))]
    pub async fn restock<T: StorageTransaction>(
        tx: &mut T,
        product_id: ProductId,
        quantity: u32,
        order_id: OrderId,
    ) -> Result<i64> {
        if quantity == 0 {
            return Err(EngineError::InvalidQuantity { quantity });
        }

        let product = tx
            .lock_product(product_id)
            .await?
            .ok_or(EngineError::ProductNotFound(product_id))?;

        let stock_quantity = product.stock_quantity + i64::from(quantity);
        tx.update_product_stock(product_id, stock_quantity).await?;
        tx.insert_adjustment(&InventoryAdjustment::new(
            product_id,
            i64::from(quantity),
            AdjustmentReason::OrderCancelledRestock,
            order_id,
        ))
        .await?;

        Ok(stock_quantity)
    }

    /// Compares committed stock against `baseline` plus the audit trail.
    ///
    /// `baseline` is the stock level the product was created with; catalog
    /// upserts do not write adjustments, so it cannot be derived.
    pub async fn verify_consistency<G: StorageGateway>(
        gateway: &G,
        product_id: ProductId,
        baseline: i64,
    ) -> Result<ConsistencyReport> {
        let product = gateway
            .find_product(product_id)
            .await?
            .ok_or(EngineError::ProductNotFound(product_id))?;
        let adjustments = gateway.adjustments_for_product(product_id).await?;

        let report = ConsistencyReport {
            product_id,
            baseline,
            adjustments_total: adjustments.iter().map(|a| a.delta).sum(),
            adjustment_count: adjustments.len(),
            stock_quantity: product.stock_quantity,
        };

        if !report.is_consistent() {
            tracing::error!(
                %product_id,
                baseline,
                adjustments_total = report.adjustments_total,
                stock_quantity = report.stock_quantity,
                "stock does not match the audit trail"
            );
        }
        Ok(report)
    }
}

/// Outcome of [`InventoryLedger::verify_consistency`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConsistencyReport {
    pub product_id: ProductId,
    pub baseline: i64,
    pub adjustments_total: i64,
    pub adjustment_count: usize,
    pub stock_quantity: i64,
}

impl ConsistencyReport {
    pub fn is_consistent(&self) -> bool {
        self.baseline + self.adjustments_total == self.stock_quantity
    }
}
