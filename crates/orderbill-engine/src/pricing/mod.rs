//! Pricing module
//!
//! Turns a matching order into a charge:
//! - Tier resolution over case totals
//! - Calculation strategies per calculation kind
//! - Per-service summing and rounding

pub mod strategy;
pub mod tier;

pub use strategy::{compute, round_money, service_charge, OrderContext};
pub use tier::{case_summary, resolve_order_tier, resolve_tier};
