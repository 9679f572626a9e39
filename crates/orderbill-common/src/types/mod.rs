//! Core data types for OrderBill

pub mod order;
pub mod report;
pub mod rule;
pub mod service;
