use std::time::Instant;

use chrono::Utc;
use common::{CustomerId, Order, OrderId, OrderStatus, ProductId, ShipmentStatus};
use storage::{StorageGateway, StorageTransaction, with_transaction};

use crate::error::{EngineError, Result};
use crate::inventory::InventoryLedger;
use crate::policy::{CancellationPolicy, PolicyInput, Verdict};
use crate::retry::RetryPolicy;

use super::{CancellationOutcome, CancellationStatus, PlacedOrder};

/// Order lifecycle over a [`StorageGateway`].
///
/// Holds no mutable state of its own. Every write runs as one transaction
/// that is re-run from scratch when it loses to a concurrent writer.
///
/// ```text
/// Placed ──► Shipped ──► Delivered
///   │           │
///   └───────────┴──► Cancelled
/// ```
#[derive(Clone)]
pub struct OrderLedger<G: StorageGateway> {
    gateway: G,
    policy: CancellationPolicy,
    retry: RetryPolicy,
}

impl<G: StorageGateway> OrderLedger<G> {
    /// Creates a ledger with the default cancellation and retry policies.
    pub fn new(gateway: G) -> Self {
        Self {
            gateway,
            policy: CancellationPolicy::default(),
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_policy(mut self, policy: CancellationPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn gateway(&self) -> &G {
        &self.gateway
    }

    pub fn policy(&self) -> &CancellationPolicy {
        &self.policy
    }

    /// Reserves stock and records a new order in one transaction.
    ///
    /// On any failure nothing is written: no order row, no stock change, no
    /// audit row.
    #[tracing::instrument(skip(self))]
    pub async fn place_order(
        &self,
        customer_id: CustomerId,
        product_id: ProductId,
        quantity: u32,
    ) -> Result<PlacedOrder> {
        let started = Instant::now();
        let result = self.try_place_order(customer_id, product_id, quantity).await;
        metrics::histogram!("place_order_duration_seconds")
            .record(started.elapsed().as_secs_f64());

        match &result {
            Ok(placed) => {
                metrics::counter!("orders_placed_total").increment(1);
                tracing::info!(
                    order_id = %placed.order_id,
                    total = %placed.total,
                    "order placed"
                );
            }
            Err(e) => {
                metrics::counter!("orders_rejected_total", "reason" => rejection_label(e))
                    .increment(1);
                tracing::info!(error = %e, "order rejected");
            }
        }
        result
    }

    async fn try_place_order(
        &self,
        customer_id: CustomerId,
        product_id: ProductId,
        quantity: u32,
    ) -> Result<PlacedOrder> {
        if quantity == 0 {
            return Err(EngineError::InvalidQuantity { quantity });
        }

        self.retry
            .run("place_order", || {
                with_transaction(&self.gateway, move |tx| {
                    Box::pin(async move {
                        let order_id = OrderId::new();
                        let product =
                            InventoryLedger::reserve(tx, product_id, quantity, order_id).await?;
                        if product.unit_price.checked_multiply(quantity).is_none() {
                            return Err(EngineError::AmountOutOfRange {
                                unit_price: product.unit_price,
                                quantity,
                            });
                        }
                        let order = Order::placed(
                            order_id,
                            customer_id,
                            product_id,
                            quantity,
                            product.unit_price,
                        );
                        tx.insert_order(&order).await?;
                        Ok::<_, EngineError>(PlacedOrder::from(&order))
                    })
                })
            })
            .await
    }

    /// Cancels an order if the cancellation policy allows it, putting its
    /// quantity back into stock.
    ///
    /// The policy is consulted twice: once on a plain read, so denials never
    /// open a transaction, and again on the locked row, so a concurrent
    /// cancel or fulfillment update cannot slip between check and write.
    #[tracing::instrument(skip(self))]
    pub async fn cancel_order(&self, order_id: OrderId, reason: &str) -> Result<CancellationOutcome> {
        let result = self.try_cancel_order(order_id, reason).await;

        match &result {
            Ok(outcome) => {
                metrics::counter!("orders_cancelled_total", "outcome" => outcome.status.as_str())
                    .increment(1);
                tracing::info!(
                    outcome = %outcome.status,
                    restocked = outcome.restocked_quantity,
                    "order cancelled"
                );
            }
            Err(EngineError::CancellationDenied { reason: denial, .. }) => {
                metrics::counter!("cancellations_denied_total").increment(1);
                tracing::warn!(denial = %denial, "cancellation denied");
            }
            Err(EngineError::PolicyEngineDefect(e)) => {
                tracing::error!(error = %e, "cancellation policy defect");
            }
            Err(e) => {
                tracing::warn!(error = %e, "cancellation failed");
            }
        }
        result
    }

    async fn try_cancel_order(
        &self,
        order_id: OrderId,
        reason: &str,
    ) -> Result<CancellationOutcome> {
        let order = self
            .gateway
            .find_order(order_id)
            .await?
            .ok_or(EngineError::OrderNotFound(order_id))?;

        if let Verdict::Deny { reason: denial } =
            self.policy.evaluate(&PolicyInput::for_order(&order, reason))?
        {
            return Err(EngineError::CancellationDenied {
                order_id,
                reason: denial,
            });
        }

        self.cancel_locked(order_id, reason).await
    }

    /// Locked phase of a cancellation: re-evaluates the policy on the locked
    /// row, restocks and marks the order cancelled.
    async fn cancel_locked(&self, order_id: OrderId, reason: &str) -> Result<CancellationOutcome> {
        self.retry
            .run("cancel_order", || {
                let policy = self.policy.clone();
                let reason = reason.to_string();
                with_transaction(&self.gateway, move |tx| {
                    Box::pin(async move {
                        let mut order = tx
                            .lock_order(order_id)
                            .await?
                            .ok_or(EngineError::OrderNotFound(order_id))?;

                        let (status, fee) =
                            match policy.evaluate(&PolicyInput::for_order(&order, &reason))? {
                                Verdict::AllowAndRefund => (CancellationStatus::Refunded, None),
                                Verdict::AllowWithFee { fee } => {
                                    (CancellationStatus::FeeCharged, Some(fee))
                                }
                                Verdict::Deny { reason: denial } => {
                                    return Err(EngineError::CancellationDenied {
                                        order_id,
                                        reason: denial,
                                    });
                                }
                            };

                        if !order.status.can_transition_to(OrderStatus::Cancelled) {
                            return Err(EngineError::InvalidTransition {
                                order_id,
                                from: order.status,
                                to: OrderStatus::Cancelled,
                            });
                        }

                        InventoryLedger::restock(tx, order.product_id, order.quantity, order_id)
                            .await?;

                        order.status = OrderStatus::Cancelled;
                        order.cancellation_reason = Some(reason);
                        order.updated_at = Utc::now();
                        tx.update_order(&order).await?;

                        Ok::<_, EngineError>(CancellationOutcome {
                            order_id,
                            status,
                            fee,
                            restocked_quantity: order.quantity,
                        })
                    })
                })
            })
            .await
    }

    /// Fulfillment hook: the order left the warehouse.
    #[tracing::instrument(skip(self))]
    pub async fn mark_shipped(&self, order_id: OrderId) -> Result<Order> {
        self.advance(order_id, OrderStatus::Shipped, ShipmentStatus::InTransit)
            .await
    }

    /// Fulfillment hook: the carrier confirmed delivery.
    #[tracing::instrument(skip(self))]
    pub async fn mark_delivered(&self, order_id: OrderId) -> Result<Order> {
        self.advance(order_id, OrderStatus::Delivered, ShipmentStatus::Delivered)
            .await
    }

    async fn advance(
        &self,
        order_id: OrderId,
        to: OrderStatus,
        shipment_status: ShipmentStatus,
    ) -> Result<Order> {
        let order = self
            .retry
            .run("advance_order", || {
                with_transaction(&self.gateway, move |tx| {
                    Box::pin(async move {
                        let mut order = tx
                            .lock_order(order_id)
                            .await?
                            .ok_or(EngineError::OrderNotFound(order_id))?;

                        if !order.status.can_transition_to(to) {
                            return Err(EngineError::InvalidTransition {
                                order_id,
                                from: order.status,
                                to,
                            });
                        }

                        order.status = to;
                        order.shipment_status = shipment_status;
                        order.updated_at = Utc::now();
                        tx.update_order(&order).await?;
                        Ok::<_, EngineError>(order)
                    })
                })
            })
            .await?;

        tracing::info!(status = %order.status, "order advanced");
        Ok(order)
    }

    pub async fn get_order(&self, order_id: OrderId) -> Result<Order> {
        self.gateway
            .find_order(order_id)
            .await?
            .ok_or(EngineError::OrderNotFound(order_id))
    }

    /// A customer's orders, oldest first.
    pub async fn orders_for_customer(&self, customer_id: CustomerId) -> Result<Vec<Order>> {
        Ok(self.gateway.orders_for_customer(customer_id).await?)
    }
}

fn rejection_label(error: &EngineError) -> &'static str {
    match error {
        EngineError::InvalidQuantity { .. } => "invalid_quantity",
        EngineError::AmountOutOfRange { .. } => "amount_out_of_range",
        EngineError::ProductNotFound(_) => "product_not_found",
        EngineError::InsufficientStock { .. } => "insufficient_stock",
        EngineError::TransientFailure { .. } => "transient",
        _ => "internal",
    }
}

#[cfg(test)]
mod tests {
    use common::{Money, Product};
    use storage::InMemoryStorage;

    use super::*;

    async fn ledger_with_product(stock: i64) -> (OrderLedger<InMemoryStorage>, Product) {
        let storage = InMemoryStorage::new();
        let product = Product::new(
            "Neural Link v2",
            "Neural-Interfaces",
            Money::from_cents(85_050),
            stock,
        );
        storage.upsert_product(&product).await.unwrap();
        (OrderLedger::new(storage), product)
    }

    #[tokio::test]
    async fn place_order_snapshots_price() {
        let (ledger, product) = ledger_with_product(10).await;
        let placed = ledger
            .place_order(CustomerId::new(), product.id, 2)
            .await
            .unwrap();

        assert_eq!(placed.unit_price, Money::from_cents(85_050));
        assert_eq!(placed.total, Money::from_cents(170_100));

        // later price changes do not touch existing orders
        let mut repriced = ledger.gateway().find_product(product.id).await.unwrap().unwrap();
        repriced.unit_price = Money::from_cents(1);
        ledger.gateway().upsert_product(&repriced).await.unwrap();

        let order = ledger.get_order(placed.order_id).await.unwrap();
        assert_eq!(order.total(), Money::from_cents(170_100));
    }

    #[tokio::test]
    async fn ship_then_deliver() {
        let (ledger, product) = ledger_with_product(10).await;
        let placed = ledger
            .place_order(CustomerId::new(), product.id, 1)
            .await
            .unwrap();

        let shipped = ledger.mark_shipped(placed.order_id).await.unwrap();
        assert_eq!(shipped.status, OrderStatus::Shipped);
        assert_eq!(shipped.shipment_status, ShipmentStatus::InTransit);

        let delivered = ledger.mark_delivered(placed.order_id).await.unwrap();
        assert_eq!(delivered.status, OrderStatus::Delivered);
        assert_eq!(delivered.shipment_status, ShipmentStatus::Delivered);

        let err = ledger.mark_shipped(placed.order_id).await.unwrap_err();
        assert!(matches!(
            err,
            EngineError::InvalidTransition {
                from: OrderStatus::Delivered,
                to: OrderStatus::Shipped,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn cannot_deliver_unshipped_order() {
        let (ledger, product) = ledger_with_product(10).await;
        let placed = ledger
            .place_order(CustomerId::new(), product.id, 1)
            .await
            .unwrap();

        let err = ledger.mark_delivered(placed.order_id).await.unwrap_err();
        assert!(matches!(err, EngineError::InvalidTransition { .. }));
        let order = ledger.get_order(placed.order_id).await.unwrap();
        assert_eq!(order.status, OrderStatus::Placed);
    }

    #[tokio::test]
    async fn unknown_order_is_not_found() {
        let (ledger, _) = ledger_with_product(1).await;
        let missing = OrderId::new();

        assert!(matches!(
            ledger.cancel_order(missing, "changed mind").await,
            Err(EngineError::OrderNotFound(id)) if id == missing
        ));
        assert!(matches!(
            ledger.mark_shipped(missing).await,
            Err(EngineError::OrderNotFound(_))
        ));
        assert!(matches!(
            ledger.get_order(missing).await,
            Err(EngineError::OrderNotFound(_))
        ));
    }

    #[tokio::test]
    async fn cancellation_records_reason() {
        let (ledger, product) = ledger_with_product(3).await;
        let placed = ledger
            .place_order(CustomerId::new(), product.id, 3)
            .await
            .unwrap();

        ledger
            .cancel_order(placed.order_id, "ordered the wrong size")
            .await
            .unwrap();

        let order = ledger.get_order(placed.order_id).await.unwrap();
        assert_eq!(order.status, OrderStatus::Cancelled);
        assert_eq!(
            order.cancellation_reason.as_deref(),
            Some("ordered the wrong size")
        );
        assert!(order.updated_at >= order.created_at);
    }

    #[tokio::test]
    async fn rejects_order_whose_total_overflows() {
        let storage = InMemoryStorage::new();
        let product = Product::new(
            "Orbital Drydock",
            "Infrastructure",
            Money::from_cents(i64::MAX / 2),
            10,
        );
        storage.upsert_product(&product).await.unwrap();
        let ledger = OrderLedger::new(storage);

        let err = ledger
            .place_order(CustomerId::new(), product.id, 3)
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::AmountOutOfRange { quantity: 3, .. }));
        assert_eq!(err.kind(), crate::ErrorKind::InvalidInput);

        let stock = ledger
            .gateway()
            .find_product(product.id)
            .await
            .unwrap()
            .unwrap()
            .stock_quantity;
        assert_eq!(stock, 10);
        assert_eq!(ledger.gateway().adjustment_count(), 0);

        // two units still fit
        let placed = ledger
            .place_order(CustomerId::new(), product.id, 2)
            .await
            .unwrap();
        assert_eq!(placed.total.cents(), i64::MAX - 1);
    }

    #[tokio::test]
    async fn locked_recheck_denies_cancel_committed_after_pre_read() {
        let (ledger, product) = ledger_with_product(5).await;
        let placed = ledger
            .place_order(CustomerId::new(), product.id, 2)
            .await
            .unwrap();

        let snapshot = ledger.get_order(placed.order_id).await.unwrap();
        let verdict = ledger
            .policy()
            .evaluate(&PolicyInput::for_order(&snapshot, "changed my mind"))
            .unwrap();
        assert_eq!(verdict, Verdict::AllowAndRefund);

        // a competing cancel commits between the read and the locked phase
        ledger
            .cancel_order(placed.order_id, "duplicate purchase")
            .await
            .unwrap();

        let err = ledger
            .cancel_locked(placed.order_id, "changed my mind")
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::CancellationDenied { .. }));

        let stock = ledger
            .gateway()
            .find_product(product.id)
            .await
            .unwrap()
            .unwrap()
            .stock_quantity;
        assert_eq!(stock, 5);
        // one reservation, one restock
        assert_eq!(ledger.gateway().adjustment_count(), 2);
        let order = ledger.get_order(placed.order_id).await.unwrap();
        assert_eq!(order.cancellation_reason.as_deref(), Some("duplicate purchase"));
    }

    #[tokio::test]
    async fn locked_recheck_denies_cancel_after_delivery() {
        let (ledger, product) = ledger_with_product(5).await;
        let placed = ledger
            .place_order(CustomerId::new(), product.id, 1)
            .await
            .unwrap();

        ledger.mark_shipped(placed.order_id).await.unwrap();
        ledger.mark_delivered(placed.order_id).await.unwrap();

        let err = ledger
            .cancel_locked(placed.order_id, "arrived too late")
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::CancellationDenied { .. }));
        assert_eq!(ledger.gateway().adjustment_count(), 1);
    }

    #[test]
    fn rejection_labels() {
        assert_eq!(
            rejection_label(&EngineError::InvalidQuantity { quantity: 0 }),
            "invalid_quantity"
        );
        assert_eq!(
            rejection_label(&EngineError::TransientFailure { attempts: 5 }),
            "transient"
        );
        assert_eq!(
            rejection_label(&EngineError::AmountOutOfRange {
                unit_price: Money::from_cents(1),
                quantity: 1,
            }),
            "amount_out_of_range"
        );
    }
}
