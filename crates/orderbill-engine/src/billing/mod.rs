//! Billing module
//!
//! Report generation and aggregation:
//! - BillingCalculator: evaluates orders against customer-services
//! - Aggregator: folds order costs into report totals

pub mod aggregator;
pub mod calculator;

pub use aggregator::{add_order_cost, merge_reports, recompute_totals};
pub use calculator::{BillingCalculator, BillingRun, ReportRequest, SkippedCharge};
