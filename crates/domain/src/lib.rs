//! Transactional order and inventory engine.
//!
//! This crate provides:
//! - `InventoryLedger`: stock reservations and restocks, each paired with an audit row
//! - `OrderLedger`: order placement, policy-gated cancellation and fulfillment transitions
//! - `CancellationPolicy`: the decision table behind cancellations
//! - `CatalogIndex`: read-only product search
//! - `RetryPolicy`: bounded re-runs of transactions that hit a concurrency conflict

pub mod catalog;
pub mod error;
pub mod inventory;
pub mod order;
pub mod policy;
pub mod retry;

pub use catalog::CatalogIndex;
pub use error::{EngineError, ErrorKind, Result};
pub use inventory::{ConsistencyReport, InventoryLedger};
pub use order::{CancellationOutcome, CancellationStatus, OrderLedger, PlacedOrder};
pub use policy::{
    CancellationPolicy, DEFAULT_RESTOCKING_FEE_BPS, DEFAULT_RULES, Matcher, PolicyError,
    PolicyInput, Rule, RuleOutcome, Verdict,
};
pub use retry::RetryPolicy;
