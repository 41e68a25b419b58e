use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::{
    AdjustmentId, CustomerId, InventoryAdjustment, Money, Order, OrderId, Product, ProductId,
};
use sqlx::{PgPool, Postgres, Row, Transaction, postgres::PgRow};
use uuid::Uuid;

use crate::{
    Result, StorageError,
    gateway::{StorageGateway, StorageTransaction},
};

const PRODUCT_COLUMNS: &str =
    "id, name, description, category, unit_price_cents, stock_quantity";

const ORDER_COLUMNS: &str = "id, customer_id, product_id, quantity, unit_price_cents, status, \
     shipment_status, cancellation_reason, created_at, updated_at";

/// PostgreSQL-backed storage gateway.
///
/// Every transaction runs at `SERIALIZABLE` and locks the rows it intends to
/// write with `SELECT ... FOR UPDATE`. Serialization failures and deadlocks
/// surface as [`StorageError::ConcurrencyConflict`].
#[derive(Clone)]
pub struct PostgresStorage {
    pool: PgPool,
}

impl PostgresStorage {
    /// Creates a new PostgreSQL storage gateway.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Gets a reference to the underlying connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Runs the database migrations.
    pub async fn run_migrations(&self) -> Result<()> {
        sqlx::migrate!("../../migrations").run(&self.pool).await?;
        Ok(())
    }
}

fn row_to_product(row: PgRow) -> Result<Product> {
    Ok(Product {
        id: ProductId::from_uuid(row.try_get::<Uuid, _>("id")?),
        name: row.try_get("name")?,
        description: row.try_get("description")?,
        category: row.try_get("category")?,
        unit_price: Money::from_cents(row.try_get("unit_price_cents")?),
        stock_quantity: row.try_get("stock_quantity")?,
    })
}

fn row_to_order(row: PgRow) -> Result<Order> {
    let quantity: i64 = row.try_get("quantity")?;
    let quantity = u32::try_from(quantity)
        .map_err(|_| StorageError::CorruptRow(format!("order quantity {quantity} out of range")))?;
    let status: String = row.try_get("status")?;
    let shipment_status: String = row.try_get("shipment_status")?;

    Ok(Order {
        id: OrderId::from_uuid(row.try_get::<Uuid, _>("id")?),
        customer_id: CustomerId::from_uuid(row.try_get::<Uuid, _>("customer_id")?),
        product_id: ProductId::from_uuid(row.try_get::<Uuid, _>("product_id")?),
        quantity,
        unit_price: Money::from_cents(row.try_get("unit_price_cents")?),
        status: status.parse()?,
        shipment_status: shipment_status.parse()?,
        cancellation_reason: row.try_get("cancellation_reason")?,
        created_at: row.try_get::<DateTime<Utc>, _>("created_at")?,
        updated_at: row.try_get::<DateTime<Utc>, _>("updated_at")?,
    })
}

fn row_to_adjustment(row: PgRow) -> Result<InventoryAdjustment> {
    let reason: String = row.try_get("reason")?;
    Ok(InventoryAdjustment {
        id: AdjustmentId::from_uuid(row.try_get::<Uuid, _>("id")?),
        product_id: ProductId::from_uuid(row.try_get::<Uuid, _>("product_id")?),
        delta: row.try_get("delta")?,
        reason: reason.parse()?,
        order_id: OrderId::from_uuid(row.try_get::<Uuid, _>("order_id")?),
        created_at: row.try_get::<DateTime<Utc>, _>("created_at")?,
    })
}

/// Transaction handle for [`PostgresStorage`].
pub struct PostgresTransaction {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl StorageTransaction for PostgresTransaction {
    async fn lock_product(&mut self, product_id: ProductId) -> Result<Option<Product>> {
        let row = sqlx::query(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM products WHERE id = $1 FOR UPDATE"
        ))
        .bind(product_id.as_uuid())
        .fetch_optional(&mut *self.tx)
        .await?;

        row.map(row_to_product).transpose()
    }

    async fn update_product_stock(
        &mut self,
        product_id: ProductId,
        stock_quantity: i64,
    ) -> Result<()> {
        let result = sqlx::query("UPDATE products SET stock_quantity = $2 WHERE id = $1")
            .bind(product_id.as_uuid())
            .bind(stock_quantity)
            .execute(&mut *self.tx)
            .await?;

        if result.rows_affected() == 0 {
            return Err(StorageError::RowNotFound {
                entity: "Product",
                id: product_id.to_string(),
            });
        }
        Ok(())
    }

    async fn insert_adjustment(&mut self, adjustment: &InventoryAdjustment) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO inventory_adjustments (id, product_id, delta, reason, order_id, created_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(adjustment.id.as_uuid())
        .bind(adjustment.product_id.as_uuid())
        .bind(adjustment.delta)
        .bind(adjustment.reason.as_str())
        .bind(adjustment.order_id.as_uuid())
        .bind(adjustment.created_at)
        .execute(&mut *self.tx)
        .await?;

        Ok(())
    }

    async fn insert_order(&mut self, order: &Order) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO orders (id, customer_id, product_id, quantity, unit_price_cents, status,
                                shipment_status, cancellation_reason, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            "#,
        )
        .bind(order.id.as_uuid())
        .bind(order.customer_id.as_uuid())
        .bind(order.product_id.as_uuid())
        .bind(i64::from(order.quantity))
        .bind(order.unit_price.cents())
        .bind(order.status.as_str())
        .bind(order.shipment_status.as_str())
        .bind(order.cancellation_reason.as_deref())
        .bind(order.created_at)
        .bind(order.updated_at)
        .execute(&mut *self.tx)
        .await?;

        Ok(())
    }

    async fn lock_order(&mut self, order_id: OrderId) -> Result<Option<Order>> {
        let row = sqlx::query(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders WHERE id = $1 FOR UPDATE"
        ))
        .bind(order_id.as_uuid())
        .fetch_optional(&mut *self.tx)
        .await?;

        row.map(row_to_order).transpose()
    }

    async fn update_order(&mut self, order: &Order) -> Result<()> {
        // quantity, unit price and customer are fixed at creation
        let result = sqlx::query(
            r#"
            UPDATE orders
            SET status = $2, shipment_status = $3, cancellation_reason = $4, updated_at = $5
            WHERE id = $1
            "#,
        )
        .bind(order.id.as_uuid())
        .bind(order.status.as_str())
        .bind(order.shipment_status.as_str())
        .bind(order.cancellation_reason.as_deref())
        .bind(order.updated_at)
        .execute(&mut *self.tx)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StorageError::RowNotFound {
                entity: "Order",
                id: order.id.to_string(),
            });
        }
        Ok(())
    }

    async fn commit(self) -> Result<()> {
        self.tx.commit().await?;
        Ok(())
    }

    async fn rollback(self) -> Result<()> {
        self.tx.rollback().await?;
        Ok(())
    }
}

#[async_trait]
impl StorageGateway for PostgresStorage {
    type Transaction = PostgresTransaction;

    async fn begin(&self) -> Result<PostgresTransaction> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("SET TRANSACTION ISOLATION LEVEL SERIALIZABLE")
            .execute(&mut *tx)
            .await?;
        Ok(PostgresTransaction { tx })
    }

    async fn find_product(&self, product_id: ProductId) -> Result<Option<Product>> {
        let row = sqlx::query(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM products WHERE id = $1"
        ))
        .bind(product_id.as_uuid())
        .fetch_optional(&self.pool)
        .await?;

        row.map(row_to_product).transpose()
    }

    async fn list_products(&self) -> Result<Vec<Product>> {
        let rows = sqlx::query(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM products ORDER BY name ASC"
        ))
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(row_to_product).collect()
    }

    async fn upsert_product(&self, product: &Product) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO products (id, name, description, category, unit_price_cents, stock_quantity)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (id) DO UPDATE SET
                name = EXCLUDED.name,
                description = EXCLUDED.description,
                category = EXCLUDED.category,
                unit_price_cents = EXCLUDED.unit_price_cents,
                stock_quantity = EXCLUDED.stock_quantity
            "#,
        )
        .bind(product.id.as_uuid())
        .bind(&product.name)
        .bind(&product.description)
        .bind(&product.category)
        .bind(product.unit_price.cents())
        .bind(product.stock_quantity)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn find_order(&self, order_id: OrderId) -> Result<Option<Order>> {
        let row = sqlx::query(&format!("SELECT {ORDER_COLUMNS} FROM orders WHERE id = $1"))
            .bind(order_id.as_uuid())
            .fetch_optional(&self.pool)
            .await?;

        row.map(row_to_order).transpose()
    }

    async fn orders_for_customer(&self, customer_id: CustomerId) -> Result<Vec<Order>> {
        let rows = sqlx::query(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders WHERE customer_id = $1 ORDER BY created_at ASC"
        ))
        .bind(customer_id.as_uuid())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(row_to_order).collect()
    }

    async fn adjustments_for_product(
        &self,
        product_id: ProductId,
    ) -> Result<Vec<InventoryAdjustment>> {
        let rows = sqlx::query(
            r#"
            SELECT id, product_id, delta, reason, order_id, created_at
            FROM inventory_adjustments
            WHERE product_id = $1
            ORDER BY created_at ASC
            "#,
        )
        .bind(product_id.as_uuid())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(row_to_adjustment).collect()
    }
}
