//! Demo catalog and shipped demo order loaded at startup.

use std::collections::HashSet;

use common::{CustomerId, Money, OrderId, Product};
use domain::{EngineError, OrderLedger};
use storage::{StorageError, StorageGateway};
use uuid::Uuid;

/// Product the demo order is placed against.
const DEMO_ORDER_PRODUCT: &str = "Quantum CPU";

/// (name, category, description, unit price in cents, stock)
const DEMO_CATALOG: &[(&str, &str, &str, i64, i64)] = &[
    (
        "Quantum CPU",
        "Hardware",
        "Industrial-grade quantum co-processor",
        120_000,
        45,
    ),
    (
        "Neural Link v2",
        "Neural-Interfaces",
        "Second-generation neural interface",
        85_050,
        10,
    ),
    (
        "Security Token",
        "Security",
        "Hardware authentication token",
        4_500,
        200,
    ),
];

/// Inserts every demo product whose name is not already in the catalog.
/// Returns how many were added.
pub async fn seed_catalog<G: StorageGateway>(gateway: &G) -> Result<usize, StorageError> {
    let existing: HashSet<String> = gateway
        .list_products()
        .await?
        .into_iter()
        .map(|p| p.name)
        .collect();

    let mut added = 0;
    for &(name, category, description, price_cents, stock) in DEMO_CATALOG {
        if existing.contains(name) {
            continue;
        }
        let product = Product::new(name, category, Money::from_cents(price_cents), stock)
            .with_description(description);
        gateway.upsert_product(&product).await?;
        added += 1;
    }

    tracing::info!(added, "demo catalog seeded");
    Ok(added)
}

/// Fixed customer that owns the demo order, so reseeding can find it.
pub fn demo_customer() -> CustomerId {
    CustomerId::from_uuid(Uuid::from_u128(500))
}

/// Places one order for the demo customer and ships it, leaving an order
/// whose cancellation carries a restocking fee. Skipped when the demo
/// customer already has orders or the demo product is missing.
pub async fn seed_demo_order<G: StorageGateway>(
    ledger: &OrderLedger<G>,
) -> Result<Option<OrderId>, EngineError> {
    let customer_id = demo_customer();
    if !ledger.orders_for_customer(customer_id).await?.is_empty() {
        return Ok(None);
    }

    let products = ledger.gateway().list_products().await?;
    let Some(product) = products.iter().find(|p| p.name == DEMO_ORDER_PRODUCT) else {
        tracing::warn!(product = DEMO_ORDER_PRODUCT, "demo product missing, no demo order");
        return Ok(None);
    };

    let placed = ledger.place_order(customer_id, product.id, 1).await?;
    ledger.mark_shipped(placed.order_id).await?;
    tracing::info!(order_id = %placed.order_id, "demo order seeded as shipped");
    Ok(Some(placed.order_id))
}

#[cfg(test)]
mod tests {
    use common::{OrderStatus, ShipmentStatus};
    use storage::InMemoryStorage;

    use super::*;

    #[tokio::test]
    async fn test_seeding_is_idempotent() {
        let storage = InMemoryStorage::new();
        assert_eq!(seed_catalog(&storage).await.unwrap(), 3);
        assert_eq!(seed_catalog(&storage).await.unwrap(), 0);

        let products = storage.list_products().await.unwrap();
        let names: Vec<_> = products.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, ["Neural Link v2", "Quantum CPU", "Security Token"]);
        assert_eq!(products[1].unit_price, Money::from_cents(120_000));
    }

    #[tokio::test]
    async fn test_demo_order_is_shipped_once() {
        let storage = InMemoryStorage::new();
        seed_catalog(&storage).await.unwrap();
        let ledger = OrderLedger::new(storage);

        let order_id = seed_demo_order(&ledger).await.unwrap().unwrap();
        assert_eq!(seed_demo_order(&ledger).await.unwrap(), None);

        let order = ledger.get_order(order_id).await.unwrap();
        assert_eq!(order.customer_id, demo_customer());
        assert_eq!(order.status, OrderStatus::Shipped);
        assert_eq!(order.shipment_status, ShipmentStatus::InTransit);

        let outcome = ledger
            .cancel_order(order_id, "no longer needed")
            .await
            .unwrap();
        assert_eq!(outcome.fee, Some(Money::from_cents(18_000)));
    }

    #[tokio::test]
    async fn test_demo_order_needs_catalog() {
        let ledger = OrderLedger::new(InMemoryStorage::new());
        assert_eq!(seed_demo_order(&ledger).await.unwrap(), None);
    }
}
