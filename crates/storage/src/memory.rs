use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use common::{CustomerId, InventoryAdjustment, Order, OrderId, Product, ProductId};
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::{
    Result, StorageError,
    gateway::{StorageGateway, StorageTransaction},
};

#[derive(Debug, Clone, Default)]
struct Tables {
    products: HashMap<ProductId, Product>,
    orders: HashMap<OrderId, Order>,
    adjustments: Vec<InventoryAdjustment>,
}

#[derive(Debug, Default)]
struct Faults {
    pending_conflicts: AtomicU32,
    unavailable: AtomicBool,
}

/// In-memory storage for tests and local runs.
///
/// Committed state is an immutable snapshot that readers clone cheaply.
/// Writers queue on a single owned mutex and work on a private copy of the
/// snapshot, which replaces the shared one on commit. Transactions are
/// therefore fully serialized, and a rollback simply drops the copy.
#[derive(Clone, Default)]
pub struct InMemoryStorage {
    committed: Arc<RwLock<Arc<Tables>>>,
    writer: Arc<Mutex<()>>,
    faults: Arc<Faults>,
}

impl InMemoryStorage {
    /// Creates a new empty in-memory store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes the next `count` commits fail with `ConcurrencyConflict`.
    pub fn inject_commit_conflicts(&self, count: u32) {
        self.faults.pending_conflicts.store(count, Ordering::SeqCst);
    }

    /// Simulates an outage: every operation fails with `Unavailable`.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.faults.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Returns the total number of audit rows stored.
    pub fn adjustment_count(&self) -> usize {
        self.snapshot().adjustments.len()
    }

    fn snapshot(&self) -> Arc<Tables> {
        match self.committed.read() {
            Ok(guard) => Arc::clone(&guard),
            Err(poisoned) => Arc::clone(&poisoned.into_inner()),
        }
    }

    fn publish(&self, tables: Tables) {
        let mut guard = match self.committed.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        *guard = Arc::new(tables);
    }

    fn check_available(&self) -> Result<()> {
        if self.faults.unavailable.load(Ordering::SeqCst) {
            return Err(StorageError::Unavailable(
                "in-memory store marked unavailable".to_string(),
            ));
        }
        Ok(())
    }

    fn take_injected_conflict(&self) -> bool {
        self.faults
            .pending_conflicts
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }
}

/// Transaction handle for [`InMemoryStorage`].
pub struct InMemoryTransaction {
    storage: InMemoryStorage,
    working: Tables,
    _writer: OwnedMutexGuard<()>,
}

impl InMemoryTransaction {
    /// Mirrors the deferred foreign key from audit rows to orders.
    fn check_deferred_constraints(&self) -> Result<()> {
        if let Some(orphan) = self
            .working
            .adjustments
            .iter()
            .find(|a| !self.working.orders.contains_key(&a.order_id))
        {
            return Err(StorageError::IntegrityViolation(format!(
                "inventory adjustment {} references missing order {}",
                orphan.id, orphan.order_id
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl StorageTransaction for InMemoryTransaction {
    async fn lock_product(&mut self, product_id: ProductId) -> Result<Option<Product>> {
        Ok(self.working.products.get(&product_id).cloned())
    }

    async fn update_product_stock(
        &mut self,
        product_id: ProductId,
        stock_quantity: i64,
    ) -> Result<()> {
        if stock_quantity < 0 {
            return Err(StorageError::IntegrityViolation(format!(
                "stock for product {product_id} would become {stock_quantity}"
            )));
        }
        let product =
            self.working
                .products
                .get_mut(&product_id)
                .ok_or_else(|| StorageError::RowNotFound {
                    entity: "Product",
                    id: product_id.to_string(),
                })?;
        product.stock_quantity = stock_quantity;
        Ok(())
    }

    async fn insert_adjustment(&mut self, adjustment: &InventoryAdjustment) -> Result<()> {
        if !self.working.products.contains_key(&adjustment.product_id) {
            return Err(StorageError::IntegrityViolation(format!(
                "inventory adjustment references missing product {}",
                adjustment.product_id
            )));
        }
        if self.working.adjustments.iter().any(|a| a.id == adjustment.id) {
            return Err(StorageError::IntegrityViolation(format!(
                "duplicate inventory adjustment {}",
                adjustment.id
            )));
        }
        self.working.adjustments.push(adjustment.clone());
        Ok(())
    }

    async fn insert_order(&mut self, order: &Order) -> Result<()> {
        if !self.working.products.contains_key(&order.product_id) {
            return Err(StorageError::IntegrityViolation(format!(
                "order references missing product {}",
                order.product_id
            )));
        }
        if self.working.orders.contains_key(&order.id) {
            return Err(StorageError::IntegrityViolation(format!(
                "duplicate order {}",
                order.id
            )));
        }
        self.working.orders.insert(order.id, order.clone());
        Ok(())
    }

    async fn lock_order(&mut self, order_id: OrderId) -> Result<Option<Order>> {
        Ok(self.working.orders.get(&order_id).cloned())
    }

    async fn update_order(&mut self, order: &Order) -> Result<()> {
        let stored =
            self.working
                .orders
                .get_mut(&order.id)
                .ok_or_else(|| StorageError::RowNotFound {
                    entity: "Order",
                    id: order.id.to_string(),
                })?;
        *stored = order.clone();
        Ok(())
    }

    async fn commit(self) -> Result<()> {
        self.storage.check_available()?;
        self.check_deferred_constraints()?;
        if self.storage.take_injected_conflict() {
            return Err(StorageError::ConcurrencyConflict(
                "injected serialization failure".to_string(),
            ));
        }
        self.storage.publish(self.working);
        Ok(())
    }

    async fn rollback(self) -> Result<()> {
        Ok(())
    }
}

#[async_trait]
impl StorageGateway for InMemoryStorage {
    type Transaction = InMemoryTransaction;

    async fn begin(&self) -> Result<InMemoryTransaction> {
        self.check_available()?;
        let writer = Arc::clone(&self.writer).lock_owned().await;
        let working = Tables::clone(&self.snapshot());
        Ok(InMemoryTransaction {
            storage: self.clone(),
            working,
            _writer: writer,
        })
    }

    async fn find_product(&self, product_id: ProductId) -> Result<Option<Product>> {
        self.check_available()?;
        Ok(self.snapshot().products.get(&product_id).cloned())
    }

    async fn list_products(&self) -> Result<Vec<Product>> {
        self.check_available()?;
        let mut products: Vec<_> = self.snapshot().products.values().cloned().collect();
        products.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(products)
    }

    async fn upsert_product(&self, product: &Product) -> Result<()> {
        self.check_available()?;
        if product.stock_quantity < 0 || product.unit_price.is_negative() {
            return Err(StorageError::IntegrityViolation(format!(
                "product {} has negative stock or price",
                product.id
            )));
        }
        let _writer = self.writer.lock().await;
        let mut tables = Tables::clone(&self.snapshot());
        if tables
            .products
            .values()
            .any(|p| p.name == product.name && p.id != product.id)
        {
            return Err(StorageError::IntegrityViolation(format!(
                "product name '{}' already exists",
                product.name
            )));
        }
        tables.products.insert(product.id, product.clone());
        self.publish(tables);
        Ok(())
    }

    async fn find_order(&self, order_id: OrderId) -> Result<Option<Order>> {
        self.check_available()?;
        Ok(self.snapshot().orders.get(&order_id).cloned())
    }

    async fn orders_for_customer(&self, customer_id: CustomerId) -> Result<Vec<Order>> {
        self.check_available()?;
        let mut orders: Vec<_> = self
            .snapshot()
            .orders
            .values()
            .filter(|o| o.customer_id == customer_id)
            .cloned()
            .collect();
        orders.sort_by_key(|o| o.created_at);
        Ok(orders)
    }

    async fn adjustments_for_product(
        &self,
        product_id: ProductId,
    ) -> Result<Vec<InventoryAdjustment>> {
        self.check_available()?;
        Ok(self
            .snapshot()
            .adjustments
            .iter()
            .filter(|a| a.product_id == product_id)
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::with_transaction;
    use common::{AdjustmentReason, Money};

    fn widget(stock: i64) -> Product {
        Product::new("Widget", "Hardware", Money::from_cents(1000), stock)
    }

    async fn seeded(stock: i64) -> (InMemoryStorage, Product) {
        let storage = InMemoryStorage::new();
        let product = widget(stock);
        storage.upsert_product(&product).await.unwrap();
        (storage, product)
    }

    #[tokio::test]
    async fn committed_writes_become_visible() {
        let (storage, product) = seeded(5).await;

        let mut tx = storage.begin().await.unwrap();
        tx.update_product_stock(product.id, 3).await.unwrap();

        // Not visible before commit
        let before = storage.find_product(product.id).await.unwrap().unwrap();
        assert_eq!(before.stock_quantity, 5);

        tx.commit().await.unwrap();
        let after = storage.find_product(product.id).await.unwrap().unwrap();
        assert_eq!(after.stock_quantity, 3);
    }

    #[tokio::test]
    async fn rollback_discards_writes() {
        let (storage, product) = seeded(5).await;

        let mut tx = storage.begin().await.unwrap();
        tx.update_product_stock(product.id, 0).await.unwrap();
        tx.rollback().await.unwrap();

        let stored = storage.find_product(product.id).await.unwrap().unwrap();
        assert_eq!(stored.stock_quantity, 5);
    }

    #[tokio::test]
    async fn with_transaction_rolls_back_on_error() {
        let (storage, product) = seeded(5).await;
        let product_id = product.id;

        let result: std::result::Result<(), StorageError> =
            with_transaction(&storage, move |tx| {
                Box::pin(async move {
                    tx.update_product_stock(product_id, 1).await?;
                    Err::<(), _>(StorageError::IntegrityViolation("boom".to_string()))
                })
            })
            .await;

        assert!(matches!(result, Err(StorageError::IntegrityViolation(_))));
        let stored = storage.find_product(product_id).await.unwrap().unwrap();
        assert_eq!(stored.stock_quantity, 5);
    }

    #[tokio::test]
    async fn negative_stock_is_rejected() {
        let (storage, product) = seeded(1).await;

        let mut tx = storage.begin().await.unwrap();
        let result = tx.update_product_stock(product.id, -1).await;
        assert!(matches!(result, Err(StorageError::IntegrityViolation(_))));
    }

    #[tokio::test]
    async fn orphan_adjustment_fails_at_commit() {
        let (storage, product) = seeded(5).await;

        let mut tx = storage.begin().await.unwrap();
        let adjustment = InventoryAdjustment::new(
            product.id,
            -1,
            AdjustmentReason::OrderPlaced,
            OrderId::new(),
        );
        tx.insert_adjustment(&adjustment).await.unwrap();

        let result = tx.commit().await;
        assert!(matches!(result, Err(StorageError::IntegrityViolation(_))));
        assert_eq!(storage.adjustment_count(), 0);
    }

    #[tokio::test]
    async fn injected_conflicts_fail_commits_then_clear() {
        let (storage, product) = seeded(5).await;
        storage.inject_commit_conflicts(1);

        let mut tx = storage.begin().await.unwrap();
        tx.update_product_stock(product.id, 4).await.unwrap();
        let first = tx.commit().await;
        assert!(matches!(first, Err(StorageError::ConcurrencyConflict(_))));

        let mut tx = storage.begin().await.unwrap();
        tx.update_product_stock(product.id, 4).await.unwrap();
        tx.commit().await.unwrap();

        let stored = storage.find_product(product.id).await.unwrap().unwrap();
        assert_eq!(stored.stock_quantity, 4);
    }

    #[tokio::test]
    async fn unavailable_store_rejects_everything() {
        let (storage, product) = seeded(5).await;
        storage.set_unavailable(true);

        assert!(matches!(
            storage.begin().await,
            Err(StorageError::Unavailable(_))
        ));
        assert!(matches!(
            storage.find_product(product.id).await,
            Err(StorageError::Unavailable(_))
        ));

        storage.set_unavailable(false);
        assert!(storage.find_product(product.id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn duplicate_product_names_are_rejected() {
        let (storage, _) = seeded(5).await;

        let result = storage.upsert_product(&widget(1)).await;
        assert!(matches!(result, Err(StorageError::IntegrityViolation(_))));
        assert_eq!(storage.list_products().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn orders_for_customer_filters_by_customer() {
        let (storage, product) = seeded(5).await;
        let customer = CustomerId::new();

        let mut tx = storage.begin().await.unwrap();
        for customer_id in [customer, customer, CustomerId::new()] {
            let order = Order::placed(
                OrderId::new(),
                customer_id,
                product.id,
                1,
                product.unit_price,
            );
            tx.insert_order(&order).await.unwrap();
        }
        tx.commit().await.unwrap();

        let orders = storage.orders_for_customer(customer).await.unwrap();
        assert_eq!(orders.len(), 2);
        assert!(orders.iter().all(|o| o.customer_id == customer));
    }
}
