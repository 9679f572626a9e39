//! Billing report value objects
//!
//! A billing report holds the charged orders of one customer over one date
//! range. `total_amount` always equals the sum of `service_totals`, which in
//! turn equals the sum of every order cost's `total_amount`. The engine's
//! report aggregator is the only code that mutates totals.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::CalculationError;

/// Charge of one service against one order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceCost {
    pub service_id: String,
    pub service_name: String,
    #[serde(with = "rust_decimal::serde::float")]
    pub amount: Decimal,
}

impl ServiceCost {
    pub fn new(
        service_id: impl Into<String>,
        service_name: impl Into<String>,
        amount: Decimal,
    ) -> Self {
        Self {
            service_id: service_id.into(),
            service_name: service_name.into(),
            amount,
        }
    }
}

/// All charges of one order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderCost {
    pub order_id: String,
    pub reference_number: Option<String>,
    pub order_date: NaiveDate,
    pub service_costs: Vec<ServiceCost>,
    #[serde(with = "rust_decimal::serde::float")]
    pub total_amount: Decimal,
}

impl OrderCost {
    pub fn new(
        order_id: impl Into<String>,
        reference_number: Option<String>,
        order_date: NaiveDate,
    ) -> Self {
        Self {
            order_id: order_id.into(),
            reference_number,
            order_date,
            service_costs: Vec::new(),
            total_amount: Decimal::ZERO,
        }
    }

    /// Append a service cost and keep `total_amount` in step.
    ///
    /// The cost is not appended when the order total would overflow.
    pub fn push(&mut self, cost: ServiceCost) -> Result<(), CalculationError> {
        self.total_amount = self
            .total_amount
            .checked_add(cost.amount)
            .ok_or_else(|| CalculationError::Overflow {
                kind: "order total".into(),
            })?;
        self.service_costs.push(cost);
        Ok(())
    }

    /// Sum of the service costs, independent of `total_amount`
    pub fn service_cost_sum(&self) -> Decimal {
        self.service_costs.iter().map(|c| c.amount).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.service_costs.is_empty()
    }
}

/// Running total of one service across a report
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceTotal {
    pub service_name: String,
    #[serde(with = "rust_decimal::serde::float")]
    pub amount: Decimal,
}

/// Audit metadata attached to a report
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportMetadata {
    /// Customer-service IDs that were in scope for this report
    pub selected_services: Vec<String>,
    pub generated_at: DateTime<Utc>,
    /// Set when generation was cancelled before every order was processed
    #[serde(default)]
    pub partial: bool,
}

impl Default for ReportMetadata {
    fn default() -> Self {
        Self {
            selected_services: Vec::new(),
            generated_at: Utc::now(),
            partial: false,
        }
    }
}

/// Billing report for one customer and date range
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BillingReport {
    pub customer_id: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    #[serde(with = "rust_decimal::serde::float")]
    pub total_amount: Decimal,
    /// `service_id -> {service_name, amount}`
    pub service_totals: BTreeMap<String, ServiceTotal>,
    pub orders: Vec<OrderCost>,
    pub metadata: ReportMetadata,
}

impl BillingReport {
    /// Create an empty report
    pub fn new(customer_id: impl Into<String>, start_date: NaiveDate, end_date: NaiveDate) -> Self {
        Self {
            customer_id: customer_id.into(),
            start_date,
            end_date,
            total_amount: Decimal::ZERO,
            service_totals: BTreeMap::new(),
            orders: Vec::new(),
            metadata: ReportMetadata::default(),
        }
    }

    /// Sum of `service_totals` amounts
    pub fn service_totals_sum(&self) -> Decimal {
        self.service_totals.values().map(|t| t.amount).sum()
    }

    /// Sum of every order cost's `total_amount`
    pub fn order_totals_sum(&self) -> Decimal {
        self.orders.iter().map(|o| o.total_amount).sum()
    }

    /// Whether the three views of the total agree
    pub fn is_consistent(&self) -> bool {
        let by_service = self.service_totals_sum();
        self.total_amount == by_service && by_service == self.order_totals_sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn date(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, day).unwrap()
    }

    #[test]
    fn test_order_cost_push_tracks_total() {
        let mut cost = OrderCost::new("o-1", Some("REF-1".into()), date(2));
        cost.push(ServiceCost::new("svc-1", "Picking", dec!(12.50))).unwrap();
        cost.push(ServiceCost::new("svc-2", "Storage", dec!(100))).unwrap();

        assert_eq!(cost.total_amount, dec!(112.50));
        assert_eq!(cost.service_cost_sum(), dec!(112.50));
        assert!(!cost.is_empty());
    }

    #[test]
    fn test_order_cost_push_rejects_overflow() {
        let mut cost = OrderCost::new("o-1", None, date(2));
        cost.push(ServiceCost::new("svc-1", "Picking", Decimal::MAX)).unwrap();

        let err = cost.push(ServiceCost::new("svc-2", "Storage", dec!(1))).unwrap_err();
        assert!(matches!(err, CalculationError::Overflow { .. }));
        assert_eq!(cost.service_costs.len(), 1);
        assert_eq!(cost.total_amount, Decimal::MAX);
    }

    #[test]
    fn test_empty_report_is_consistent() {
        let report = BillingReport::new("c-1", date(1), date(31));
        assert!(report.is_consistent());
        assert_eq!(report.total_amount, Decimal::ZERO);
    }

    #[test]
    fn test_report_serializes_amounts_as_numbers() {
        let mut report = BillingReport::new("c-1", date(1), date(31));
        report.total_amount = dec!(400.00);
        report.service_totals.insert(
            "svc-1".into(),
            ServiceTotal {
                service_name: "Storage".into(),
                amount: dec!(400.00),
            },
        );

        let value = serde_json::to_value(&report).unwrap();
        assert_eq!(value["total_amount"], serde_json::json!(400.0));
        assert_eq!(value["service_totals"]["svc-1"]["amount"], serde_json::json!(400.0));
        assert_eq!(value["start_date"], serde_json::json!("2024-01-01"));
    }
}
