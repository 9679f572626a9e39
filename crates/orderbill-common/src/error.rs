//! Error types for OrderBill
//!
//! Provides a unified error type and domain-specific error variants.
//! Data errors (malformed order fields, unparseable SKU payloads) are never
//! represented here: they degrade to a non-match or an empty value at the
//! point of evaluation.

use thiserror::Error;

/// Result type alias using OrderbillError
pub type Result<T> = std::result::Result<T, OrderbillError>;

/// Unified error type for OrderBill operations
#[derive(Debug, Error)]
pub enum OrderbillError {
    // Rule/service configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    // Per-order calculation errors
    #[error("Calculation error: {0}")]
    Calculation(#[from] CalculationError),

    // Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    // Export errors
    #[error("Export error: {0}")]
    Export(String),

    // Storage errors
    #[error("Storage error: {0}")]
    Storage(String),

    // Generic internal error
    #[error("Internal error: {0}")]
    Internal(String),

    // Report generation was cancelled
    #[error("Report generation cancelled")]
    Cancelled,
}

/// Configuration errors, raised before any order is evaluated.
///
/// Every variant carries the path of the offending element, e.g.
/// `services[1].calculations[0].tier_config.ranges[2]`.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{path}: malformed configuration: {message}")]
    Malformed { path: String, message: String },

    #[error("{path}: {field} is required")]
    MissingField { path: String, field: String },

    #[error("{path}: {field} must not be negative (got {value})")]
    Negative {
        path: String,
        field: String,
        value: String,
    },

    #[error("{path}: tier range min {min} is greater than max {max}")]
    InvertedRange {
        path: String,
        min: String,
        max: String,
    },

    #[error("{path}: calculation type {kind} requires a tier configuration")]
    MissingTierConfig { path: String, kind: String },

    #[error("{path}: calculation type {kind} requires at least one SKU")]
    EmptySkuAllowList { path: String, kind: String },

    #[error("{path}: operator {operator} requires at least one value")]
    EmptyValues { path: String, operator: String },

    #[error("{path}: unknown operator: {operator}")]
    UnknownOperator { path: String, operator: String },

    #[error("{path}: unknown field: {field}")]
    UnknownField { path: String, field: String },

    #[error("{path}: unknown calculation type: {kind}")]
    UnknownCalculationKind { path: String, kind: String },
}

impl ConfigError {
    /// Path of the configuration element this error refers to
    pub fn path(&self) -> &str {
        match self {
            ConfigError::Malformed { path, .. }
            | ConfigError::MissingField { path, .. }
            | ConfigError::Negative { path, .. }
            | ConfigError::InvertedRange { path, .. }
            | ConfigError::MissingTierConfig { path, .. }
            | ConfigError::EmptySkuAllowList { path, .. }
            | ConfigError::EmptyValues { path, .. }
            | ConfigError::UnknownOperator { path, .. }
            | ConfigError::UnknownField { path, .. }
            | ConfigError::UnknownCalculationKind { path, .. } => path,
        }
    }
}

/// Errors raised while computing one service charge for one order.
///
/// These never abort a report: the calculator records them and skips the
/// offending order/service pair.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum CalculationError {
    #[error("order field {field} is not numeric: {value}")]
    NonNumericField { field: String, value: String },

    #[error("amount overflow while computing {kind}")]
    Overflow { kind: String },
}

// Implement From for common external error types
impl From<serde_json::Error> for OrderbillError {
    fn from(err: serde_json::Error) -> Self {
        OrderbillError::Serialization(err.to_string())
    }
}

impl From<std::io::Error> for OrderbillError {
    fn from(err: std::io::Error) -> Self {
        OrderbillError::Storage(err.to_string())
    }
}

impl From<anyhow::Error> for OrderbillError {
    fn from(err: anyhow::Error) -> Self {
        OrderbillError::Internal(err.to_string())
    }
}
