//! Order ledger: placement, cancellation and the fulfillment transitions.

mod ledger;
mod outcome;

pub use ledger::OrderLedger;
pub use outcome::{CancellationOutcome, CancellationStatus, PlacedOrder};
