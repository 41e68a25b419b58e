//! Cancellation policy engine.
//!
//! The whole business policy is one ordered rule table. Evaluation is pure
//! and holds no shared mutable state, so a policy can be cloned into any
//! number of concurrent requests.
//!
//! Default rules, first match wins:
//!
//! | # | order status          | shipment      | verdict          |
//! |---|-----------------------|---------------|------------------|
//! | 1 | delivered, cancelled  | any           | deny             |
//! | 2 | placed                | not shipped   | allow and refund |
//! | 3 | shipped               | in transit    | allow with fee   |
//! | 4 | any                   | delivered     | deny             |
//! | 5 | any                   | any           | deny             |

use std::sync::Arc;

use common::{Money, Order, OrderStatus, ShipmentStatus};
use serde::Serialize;
use thiserror::Error;

/// Restocking fee charged on in-transit cancellations, in basis points.
pub const DEFAULT_RESTOCKING_FEE_BPS: u32 = 1500;

/// Raised when the rule table leaves a case unhandled.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PolicyError {
    #[error("no cancellation rule covers order status {order_status} with shipment {shipment_status}")]
    Uncovered {
        order_status: OrderStatus,
        shipment_status: ShipmentStatus,
    },
}

/// The policy's decision for one cancellation request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "verdict", rename_all = "snake_case")]
pub enum Verdict {
    AllowAndRefund,
    AllowWithFee { fee: Money },
    Deny { reason: String },
}

impl Verdict {
    pub fn is_allowed(&self) -> bool {
        !matches!(self, Verdict::Deny { .. })
    }
}

/// Matches a single enum value against a rule column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Matcher<T: 'static> {
    Any,
    OneOf(&'static [T]),
}

impl<T: PartialEq + 'static> Matcher<T> {
    fn matches(&self, value: &T) -> bool {
        match self {
            Matcher::Any => true,
            Matcher::OneOf(values) => values.contains(value),
        }
    }
}

/// What a matching rule decides.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuleOutcome {
    AllowAndRefund,
    AllowWithFee,
    Deny(&'static str),
}

/// One row of the decision table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rule {
    pub name: &'static str,
    pub order_status: Matcher<OrderStatus>,
    pub shipment_status: Matcher<ShipmentStatus>,
    pub outcome: RuleOutcome,
}

pub const DEFAULT_RULES: &[Rule] = &[
    Rule {
        name: "terminal-order",
        order_status: Matcher::OneOf(&[OrderStatus::Delivered, OrderStatus::Cancelled]),
        shipment_status: Matcher::Any,
        outcome: RuleOutcome::Deny("order is already delivered or cancelled"),
    },
    Rule {
        name: "not-yet-shipped",
        order_status: Matcher::OneOf(&[OrderStatus::Placed]),
        shipment_status: Matcher::OneOf(&[ShipmentStatus::NotShipped]),
        outcome: RuleOutcome::AllowAndRefund,
    },
    Rule {
        name: "in-transit",
        order_status: Matcher::OneOf(&[OrderStatus::Shipped]),
        shipment_status: Matcher::OneOf(&[ShipmentStatus::InTransit]),
        outcome: RuleOutcome::AllowWithFee,
    },
    Rule {
        name: "shipment-delivered",
        order_status: Matcher::Any,
        shipment_status: Matcher::OneOf(&[ShipmentStatus::Delivered]),
        outcome: RuleOutcome::Deny("shipment has already been delivered"),
    },
    Rule {
        name: "ineligible",
        order_status: Matcher::Any,
        shipment_status: Matcher::Any,
        outcome: RuleOutcome::Deny("order is not eligible for cancellation in its current state"),
    },
];

/// Inputs to a policy decision.
#[derive(Debug, Clone, Copy)]
pub struct PolicyInput<'a> {
    pub order_status: OrderStatus,
    pub shipment_status: ShipmentStatus,
    /// Free text from the caller. Recorded, never used to decide.
    pub reason: &'a str,
    pub order_total: Money,
}

impl<'a> PolicyInput<'a> {
    pub fn for_order(order: &Order, reason: &'a str) -> Self {
        Self {
            order_status: order.status,
            shipment_status: order.shipment_status,
            reason,
            order_total: order.total(),
        }
    }
}

/// Decision table mapping order and shipment state to a [`Verdict`].
#[derive(Debug, Clone)]
pub struct CancellationPolicy {
    rules: Arc<[Rule]>,
    restocking_fee_bps: u32,
}

impl CancellationPolicy {
    /// Builds a policy, rejecting tables that leave any
    /// (order status, shipment status) pair unmatched.
    pub fn new(rules: Vec<Rule>, restocking_fee_bps: u32) -> Result<Self, PolicyError> {
        let policy = Self {
            rules: rules.into(),
            restocking_fee_bps,
        };
        policy.check_coverage()?;
        Ok(policy)
    }

    pub fn with_restocking_fee_bps(mut self, restocking_fee_bps: u32) -> Self {
        self.restocking_fee_bps = restocking_fee_bps;
        self
    }

    pub fn restocking_fee_bps(&self) -> u32 {
        self.restocking_fee_bps
    }

    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    /// Verifies every combination of the two status enums hits some rule.
    pub fn check_coverage(&self) -> Result<(), PolicyError> {
        for order_status in OrderStatus::ALL {
            for shipment_status in ShipmentStatus::ALL {
                self.matching_rule(order_status, shipment_status)?;
            }
        }
        Ok(())
    }

    /// Decides a cancellation request. First matching rule wins.
    pub fn evaluate(&self, input: &PolicyInput<'_>) -> Result<Verdict, PolicyError> {
        let rule = self
            .matching_rule(input.order_status, input.shipment_status)
            .inspect_err(|e| tracing::error!(error = %e, "cancellation policy has a gap"))?;

        tracing::debug!(
            rule = rule.name,
            order_status = %input.order_status,
            shipment_status = %input.shipment_status,
            reason = input.reason,
            "cancellation rule matched"
        );

        Ok(match rule.outcome {
            RuleOutcome::AllowAndRefund => Verdict::AllowAndRefund,
            RuleOutcome::AllowWithFee => Verdict::AllowWithFee {
                fee: self.restocking_fee(input.order_total),
            },
            RuleOutcome::Deny(reason) => Verdict::Deny {
                reason: format!(
                    "{reason} (order status: {}, shipment: {})",
                    input.order_status, input.shipment_status
                ),
            },
        })
    }

    /// Fee for an in-transit cancellation; at least one cent.
    pub fn restocking_fee(&self, order_total: Money) -> Money {
        let fee = order_total.basis_points(self.restocking_fee_bps);
        if fee.is_positive() {
            fee
        } else {
            Money::from_cents(1)
        }
    }

    fn matching_rule(
        &self,
        order_status: OrderStatus,
        shipment_status: ShipmentStatus,
    ) -> Result<&Rule, PolicyError> {
        self.rules
            .iter()
            .find(|rule| {
                rule.order_status.matches(&order_status)
                    && rule.shipment_status.matches(&shipment_status)
            })
            .ok_or(PolicyError::Uncovered {
                order_status,
                shipment_status,
            })
    }
}

impl Default for CancellationPolicy {
    fn default() -> Self {
        Self {
            rules: DEFAULT_RULES.into(),
            restocking_fee_bps: DEFAULT_RESTOCKING_FEE_BPS,
        }
    }
}
