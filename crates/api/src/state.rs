//! Shared application state.

use domain::{CatalogIndex, OrderLedger};
use storage::StorageGateway;

use crate::config::Config;

/// Shared application state accessible from all handlers.
pub struct AppState<G: StorageGateway> {
    pub ledger: OrderLedger<G>,
    pub catalog: CatalogIndex<G>,
    /// Added to the placement date to quote a delivery date.
    pub delivery_offset: chrono::Duration,
}

impl<G: StorageGateway + Clone> AppState<G> {
    pub fn new(gateway: G, config: &Config) -> Self {
        Self {
            ledger: OrderLedger::new(gateway.clone())
                .with_policy(config.cancellation_policy())
                .with_retry_policy(config.retry_policy()),
            catalog: CatalogIndex::new(gateway),
            delivery_offset: config.delivery_offset(),
        }
    }
}
