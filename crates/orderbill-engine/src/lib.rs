//! # OrderBill Engine
//!
//! Rule evaluation, tiered pricing and billing report aggregation.
//!
//! ## Flow
//!
//! ```text
//! orders ─┬─> rule groups match? ──> calculation strategies ──> service cost
//!         │                                                       │
//! services┘                                   report aggregator <─┘
//! ```
//!
//! Each order is tested against every selected customer-service. Matching
//! services are priced (flat fee, per unit, weight, volume, percentage,
//! case tiers, product allow-lists) and the per-service amounts, rounded to
//! cents, are folded into a [`BillingReport`](orderbill_common::BillingReport)
//! whose totals always agree.

pub mod billing;
pub mod catalog;
pub mod config;
pub mod export;
pub mod metrics;
pub mod pricing;
pub mod rules;
pub mod sku;

pub use billing::{BillingCalculator, BillingRun, ReportRequest, SkippedCharge};
pub use catalog::ServiceCatalog;
pub use config::EngineConfig;
pub use metrics::EngineMetrics;

use orderbill_common::{Order, OrderbillError, Result};
use std::path::Path;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, instrument};

/// OrderBill service
///
/// Owns a validated calculator and hands report generation to the blocking
/// pool so async callers are never stalled by a large batch.
pub struct OrderBill {
    config: EngineConfig,
    calculator: Arc<BillingCalculator>,
    metrics: Option<Arc<EngineMetrics>>,
}

impl OrderBill {
    pub fn new(catalog: ServiceCatalog, config: EngineConfig) -> Self {
        Self {
            calculator: Arc::new(BillingCalculator::from_catalog(catalog, config.clone())),
            config,
            metrics: None,
        }
    }

    /// Load and validate a service catalog from a JSON file
    pub fn from_catalog_file(path: impl AsRef<Path>, config: EngineConfig) -> Result<Self> {
        let text = std::fs::read_to_string(path.as_ref())?;
        let catalog = ServiceCatalog::from_json_str(&text)?;
        info!(path = %path.as_ref().display(), services = catalog.len(), "Loaded catalog file");
        Ok(Self::new(catalog, config))
    }

    /// Record engine metrics into `metrics`
    pub fn with_metrics(self, metrics: Arc<EngineMetrics>) -> Self {
        let calculator = BillingCalculator::from_catalog(
            self.calculator.catalog().clone(),
            self.config.clone(),
        )
        .with_metrics(metrics.clone());
        Self {
            config: self.config,
            calculator: Arc::new(calculator),
            metrics: Some(metrics),
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn calculator(&self) -> &BillingCalculator {
        &self.calculator
    }

    pub fn metrics(&self) -> Option<&Arc<EngineMetrics>> {
        self.metrics.as_ref()
    }

    /// Generate a report without blocking the async runtime
    #[instrument(skip(self, orders, cancel), fields(customer_id = %request.customer_id))]
    pub async fn generate_report(
        &self,
        request: ReportRequest,
        orders: Arc<Vec<Order>>,
        cancel: Option<CancellationToken>,
    ) -> Result<BillingRun> {
        let calculator = self.calculator.clone();
        tokio::task::spawn_blocking(move || {
            calculator.generate_report(&request, &orders, cancel.as_ref())
        })
        .await
        .map_err(|e| {
            if e.is_cancelled() {
                OrderbillError::Cancelled
            } else {
                OrderbillError::Internal(format!("report task failed: {}", e))
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use orderbill_common::{Calculation, CalculationKind, CustomerService, FieldName};
    use rust_decimal_macros::dec;

    fn engine() -> OrderBill {
        let catalog = ServiceCatalog::new(vec![CustomerService::new(
            "cs-1", "c-1", "svc-1", "Picking", dec!(1.5),
        )
        .with_calculation(Calculation::new(CalculationKind::PerUnit, dec!(0)))])
        .unwrap();
        OrderBill::new(catalog, EngineConfig::default())
    }

    #[tokio::test]
    async fn test_generate_report_async() {
        let day = NaiveDate::from_ymd_opt(2024, 5, 1).unwrap();
        let orders = Arc::new(vec![
            Order::new("o-1", "c-1", day).with_number(FieldName::TotalItemQty, 4),
            Order::new("o-2", "c-1", day).with_number(FieldName::TotalItemQty, "3"),
        ]);
        let run = engine()
            .generate_report(ReportRequest::new("c-1", day, day), orders, None)
            .await
            .unwrap();

        assert_eq!(run.report.total_amount, dec!(10.5));
        assert_eq!(run.report.orders.len(), 2);
        assert!(!run.cancelled);
    }

    #[tokio::test]
    async fn test_metrics_shared_with_calculator() {
        let metrics = Arc::new(EngineMetrics::new().unwrap());
        let engine = engine().with_metrics(metrics.clone());
        let day = NaiveDate::from_ymd_opt(2024, 5, 1).unwrap();
        engine
            .generate_report(ReportRequest::new("c-1", day, day), Arc::new(vec![]), None)
            .await
            .unwrap();
        assert_eq!(metrics.reports_generated.get(), 1);
        assert!(engine.metrics().is_some());
    }

    #[test]
    fn test_missing_catalog_file() {
        let err = OrderBill::from_catalog_file("/nonexistent/services.json", EngineConfig::default())
            .err()
            .unwrap();
        assert!(matches!(err, OrderbillError::Storage(_)));
    }
}
