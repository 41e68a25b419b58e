//! Concurrent placement and cancellation against one product.
//!
//! Every task runs on a multi-threaded runtime and shares the same ledger,
//! so the storage layer is the only thing keeping stock consistent.

use std::sync::Arc;
use std::time::Duration;

use common::{CustomerId, Money, Product, ProductId};
use domain::{CancellationStatus, EngineError, InventoryLedger, OrderLedger, RetryPolicy};
use storage::{InMemoryStorage, StorageGateway};

async fn shared_ledger(stock: i64) -> (Arc<OrderLedger<InMemoryStorage>>, ProductId) {
    let storage = InMemoryStorage::new();
    let product = Product::new(
        "Neural Link v2",
        "Neural-Interfaces",
        Money::from_cents(85_050),
        stock,
    );
    storage.upsert_product(&product).await.unwrap();

    let retry = RetryPolicy::new(10, Duration::from_millis(1), Duration::from_millis(10));
    (
        Arc::new(OrderLedger::new(storage).with_retry_policy(retry)),
        product.id,
    )
}

async fn stock_of(ledger: &OrderLedger<InMemoryStorage>, product_id: ProductId) -> i64 {
    ledger
        .gateway()
        .find_product(product_id)
        .await
        .unwrap()
        .unwrap()
        .stock_quantity
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_orders_never_oversell() {
    let (ledger, product_id) = shared_ledger(5).await;

    let handles: Vec<_> = (0..20)
        .map(|_| {
            let ledger = Arc::clone(&ledger);
            tokio::spawn(async move { ledger.place_order(CustomerId::new(), product_id, 1).await })
        })
        .collect();

    let mut placed = 0;
    let mut sold_out = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => placed += 1,
            Err(EngineError::InsufficientStock { .. }) => sold_out += 1,
            Err(other) => panic!("unexpected error: {other}"),
        }
    }

    assert_eq!(placed, 5);
    assert_eq!(sold_out, 15);
    assert_eq!(stock_of(&ledger, product_id).await, 0);
    assert_eq!(ledger.gateway().adjustment_count(), 5);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn mixed_quantities_respect_stock() {
    let (ledger, product_id) = shared_ledger(10).await;

    let handles: Vec<_> = [3u32, 4, 5, 2, 6, 1, 3]
        .into_iter()
        .map(|quantity| {
            let ledger = Arc::clone(&ledger);
            tokio::spawn(async move {
                ledger
                    .place_order(CustomerId::new(), product_id, quantity)
                    .await
                    .map(|placed| placed.quantity)
            })
        })
        .collect();

    let mut reserved = 0i64;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(quantity) => reserved += i64::from(quantity),
            Err(EngineError::InsufficientStock { .. }) => {}
            Err(other) => panic!("unexpected error: {other}"),
        }
    }

    assert!(reserved <= 10);
    assert_eq!(stock_of(&ledger, product_id).await, 10 - reserved);

    let report = InventoryLedger::verify_consistency(ledger.gateway(), product_id, 10)
        .await
        .unwrap();
    assert!(report.is_consistent());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn racing_cancels_restock_once() {
    let (ledger, product_id) = shared_ledger(10).await;
    let placed = ledger
        .place_order(CustomerId::new(), product_id, 4)
        .await
        .unwrap();

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let ledger = Arc::clone(&ledger);
            let order_id = placed.order_id;
            tokio::spawn(async move { ledger.cancel_order(order_id, "changed mind").await })
        })
        .collect();

    let mut refunded = 0;
    let mut denied = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(outcome) => {
                assert_eq!(outcome.status, CancellationStatus::Refunded);
                refunded += 1;
            }
            Err(EngineError::CancellationDenied { .. }) => denied += 1,
            Err(other) => panic!("unexpected error: {other}"),
        }
    }

    assert_eq!(refunded, 1);
    assert_eq!(denied, 7);
    assert_eq!(stock_of(&ledger, product_id).await, 10);
    assert_eq!(ledger.gateway().adjustment_count(), 2);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn placements_and_cancellations_interleave() {
    let (ledger, product_id) = shared_ledger(8).await;

    let mut order_ids = Vec::new();
    for _ in 0..4 {
        let placed = ledger
            .place_order(CustomerId::new(), product_id, 2)
            .await
            .unwrap();
        order_ids.push(placed.order_id);
    }
    assert_eq!(stock_of(&ledger, product_id).await, 0);

    let cancels: Vec<_> = order_ids
        .into_iter()
        .map(|order_id| {
            let ledger = Arc::clone(&ledger);
            tokio::spawn(async move { ledger.cancel_order(order_id, "changed mind").await })
        })
        .collect();
    let orders: Vec<_> = (0..8)
        .map(|_| {
            let ledger = Arc::clone(&ledger);
            tokio::spawn(async move { ledger.place_order(CustomerId::new(), product_id, 1).await })
        })
        .collect();

    for handle in cancels {
        handle.await.unwrap().unwrap();
    }
    let mut placed = 0i64;
    for handle in orders {
        match handle.await.unwrap() {
            Ok(_) => placed += 1,
            Err(EngineError::InsufficientStock { .. }) => {}
            Err(other) => panic!("unexpected error: {other}"),
        }
    }

    assert_eq!(stock_of(&ledger, product_id).await, 8 - placed);
    let report = InventoryLedger::verify_consistency(ledger.gateway(), product_id, 8)
        .await
        .unwrap();
    assert!(report.is_consistent());
}
