//! Prometheus metrics for report generation

use prometheus::{Histogram, HistogramOpts, IntCounter, Registry};

/// Engine metrics
pub struct EngineMetrics {
    pub reports_generated: IntCounter,
    pub orders_evaluated: IntCounter,
    pub orders_skipped: IntCounter,
    pub service_costs_recorded: IntCounter,
    pub report_duration_seconds: Histogram,
}

impl EngineMetrics {
    pub fn new() -> prometheus::Result<Self> {
        Ok(Self {
            reports_generated: IntCounter::new(
                "orderbill_reports_generated_total",
                "Total billing reports generated",
            )?,
            orders_evaluated: IntCounter::new(
                "orderbill_orders_evaluated_total",
                "Total orders evaluated against customer services",
            )?,
            orders_skipped: IntCounter::new(
                "orderbill_charges_skipped_total",
                "Total order/service charges skipped after calculation errors",
            )?,
            service_costs_recorded: IntCounter::new(
                "orderbill_service_costs_recorded_total",
                "Total service costs attached to reports",
            )?,
            report_duration_seconds: Histogram::with_opts(
                HistogramOpts::new(
                    "orderbill_report_duration_seconds",
                    "Billing report generation duration",
                )
                .buckets(vec![0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0, 5.0, 30.0]),
            )?,
        })
    }

    pub fn register(&self, registry: &Registry) -> prometheus::Result<()> {
        registry.register(Box::new(self.reports_generated.clone()))?;
        registry.register(Box::new(self.orders_evaluated.clone()))?;
        registry.register(Box::new(self.orders_skipped.clone()))?;
        registry.register(Box::new(self.service_costs_recorded.clone()))?;
        registry.register(Box::new(self.report_duration_seconds.clone()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_once() {
        let metrics = EngineMetrics::new().unwrap();
        let registry = Registry::new();
        metrics.register(&registry).unwrap();
        metrics.orders_evaluated.inc_by(3);

        let families = registry.gather();
        assert_eq!(families.len(), 5);
        assert!(metrics.register(&registry).is_err());
    }
}
