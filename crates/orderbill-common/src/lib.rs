//! # OrderBill Common
//!
//! Shared types and errors for the OrderBill billing engine.
//!
//! ## Core Types
//!
//! - [`Order`]: historical order record with loosely-typed numeric fields
//! - [`RuleCondition`]/[`RuleGroup`]: field/operator/value tests and their
//!   AND/OR combinations
//! - [`CustomerService`]: a billable service with rules and [`Calculation`]s
//! - [`BillingReport`]: per-customer report of [`OrderCost`]s and service
//!   totals

pub mod error;
pub mod types;

// Re-export commonly used types at crate root
pub use error::{CalculationError, ConfigError, OrderbillError, Result};
pub use types::{
    order::{FieldKind, FieldName, Order, UnknownField},
    report::{BillingReport, OrderCost, ReportMetadata, ServiceCost, ServiceTotal},
    rule::{LogicOperator, Operator, RuleCondition, RuleGroup, RuleNode, UnknownOperator},
    service::{Calculation, CalculationKind, CustomerService, TierConfiguration, TierRange},
};

/// OrderBill version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Decimal places monetary amounts are rounded to
pub const MONEY_DECIMAL_PLACES: u32 = 2;
