//! Rule evaluation
//!
//! - [`field`]: typed access to order fields
//! - [`condition`]: single field/operator/values conditions
//! - [`group`]: AND/OR rule groups and service applicability

pub mod condition;
pub mod field;
pub mod group;

pub use condition::{evaluate, evaluate_condition};
pub use field::{get_field, FieldValue};
pub use group::{evaluate_group, service_applies};
