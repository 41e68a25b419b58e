use async_trait::async_trait;
use common::{CustomerId, InventoryAdjustment, Order, OrderId, Product, ProductId};
use futures_util::future::BoxFuture;

use crate::{Result, StorageError};

/// A single open transaction at serializable-or-better isolation.
///
/// Row reads named `lock_*` conflict with any concurrent writer of the same
/// row. Nothing written through a transaction is visible to other callers
/// until [`StorageTransaction::commit`] succeeds.
#[async_trait]
pub trait StorageTransaction: Send + Sized {
    /// Reads a product and takes a write lock on its row.
    async fn lock_product(&mut self, product_id: ProductId) -> Result<Option<Product>>;

    /// Overwrites the stock count of an existing product.
    async fn update_product_stock(&mut self, product_id: ProductId, stock_quantity: i64)
    -> Result<()>;

    /// Appends an audit row. Adjustments are never updated or deleted.
    async fn insert_adjustment(&mut self, adjustment: &InventoryAdjustment) -> Result<()>;

    async fn insert_order(&mut self, order: &Order) -> Result<()>;

    /// Reads an order and takes a write lock on its row.
    async fn lock_order(&mut self, order_id: OrderId) -> Result<Option<Order>>;

    /// Overwrites the mutable columns of an existing order.
    async fn update_order(&mut self, order: &Order) -> Result<()>;

    async fn commit(self) -> Result<()>;

    async fn rollback(self) -> Result<()>;
}

/// Owner of the durable store.
///
/// Writes go through [`StorageGateway::begin`] (usually via
/// [`with_transaction`]); the remaining methods are point-in-time reads that
/// never wait on writers.
#[async_trait]
pub trait StorageGateway: Send + Sync {
    type Transaction: StorageTransaction;

    /// Opens a new transaction.
    async fn begin(&self) -> Result<Self::Transaction>;

    async fn find_product(&self, product_id: ProductId) -> Result<Option<Product>>;

    /// Returns every product, ordered by name.
    async fn list_products(&self) -> Result<Vec<Product>>;

    /// Inserts or replaces a product. This is the catalog-management path and
    /// does not write an inventory adjustment.
    async fn upsert_product(&self, product: &Product) -> Result<()>;

    async fn find_order(&self, order_id: OrderId) -> Result<Option<Order>>;

    /// Returns a customer's orders, oldest first.
    async fn orders_for_customer(&self, customer_id: CustomerId) -> Result<Vec<Order>>;

    /// Returns the audit trail of a product, oldest first.
    async fn adjustments_for_product(
        &self,
        product_id: ProductId,
    ) -> Result<Vec<InventoryAdjustment>>;
}

/// Runs `body` inside one transaction.
///
/// Commits when `body` returns `Ok`, rolls back when it returns `Err` and
/// hands that error back unchanged. Failing to begin or commit surfaces as
/// `E` through `From<StorageError>`.
///
/// `body` receives the transaction by mutable reference, so any operation it
/// calls joins this transaction rather than opening a nested one.
pub async fn with_transaction<G, T, E, F>(gateway: &G, body: F) -> std::result::Result<T, E>
where
    G: StorageGateway,
    T: Send,
    E: From<StorageError> + Send,
    F: for<'t> FnOnce(&'t mut G::Transaction) -> BoxFuture<'t, std::result::Result<T, E>> + Send,
{
    let mut tx = gateway.begin().await?;

    match body(&mut tx).await {
        Ok(value) => {
            tx.commit().await.inspect_err(|e| {
                metrics::counter!("storage_transactions_total", "outcome" => "commit_failed")
                    .increment(1);
                tracing::debug!(error = %e, "transaction commit failed");
            })?;
            metrics::counter!("storage_transactions_total", "outcome" => "committed").increment(1);
            Ok(value)
        }
        Err(err) => {
            if let Err(rollback_err) = tx.rollback().await {
                tracing::warn!(error = %rollback_err, "transaction rollback failed");
            }
            metrics::counter!("storage_transactions_total", "outcome" => "rolled_back")
                .increment(1);
            Err(err)
        }
    }
}
