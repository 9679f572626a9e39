//! Report aggregation
//!
//! Folds order costs into a billing report while keeping
//! `total_amount == sum(service_totals) == sum(order totals)`.
//! `service_totals` is the authoritative source for `total_amount`.

use std::collections::BTreeMap;

use orderbill_common::{BillingReport, CalculationError, OrderCost, ServiceTotal};
use rust_decimal::Decimal;
use tracing::{debug, warn};

/// Append an order cost and fold its service costs into the report totals.
///
/// Totals are staged first, so an overflowing cost leaves the report untouched.
pub fn add_order_cost(report: &mut BillingReport, order_cost: OrderCost) -> Result<(), CalculationError> {
    let mut staged: BTreeMap<&str, Decimal> = BTreeMap::new();
    for cost in &order_cost.service_costs {
        let current = match staged.get(cost.service_id.as_str()) {
            Some(amount) => *amount,
            None => report
                .service_totals
                .get(&cost.service_id)
                .map_or(Decimal::ZERO, |total| total.amount),
        };
        staged.insert(cost.service_id.as_str(), checked_add(current, cost.amount, "service total")?);
    }
    let untouched = report
        .service_totals
        .iter()
        .filter(|(id, _)| !staged.contains_key(id.as_str()))
        .map(|(_, total)| total.amount);
    let total = checked_sum(untouched.chain(staged.values().copied()), "report total")?;

    for cost in &order_cost.service_costs {
        let amount = staged[cost.service_id.as_str()];
        report
            .service_totals
            .entry(cost.service_id.clone())
            .and_modify(|total| total.amount = amount)
            .or_insert_with(|| ServiceTotal {
                service_name: cost.service_name.clone(),
                amount,
            });
    }
    debug!(
        order_id = %order_cost.order_id,
        services = order_cost.service_costs.len(),
        "Added order cost"
    );
    report.orders.push(order_cost);
    report.total_amount = total;
    Ok(())
}

/// Rebuild every total from the order costs.
///
/// The report is left as it was when any rebuilt total overflows.
pub fn recompute_totals(report: &mut BillingReport) -> Result<(), CalculationError> {
    let mut order_totals = Vec::with_capacity(report.orders.len());
    let mut service_totals: BTreeMap<String, ServiceTotal> = BTreeMap::new();
    for order in &report.orders {
        order_totals.push(checked_sum(
            order.service_costs.iter().map(|c| c.amount),
            "order total",
        )?);
        for cost in &order.service_costs {
            match service_totals.get_mut(&cost.service_id) {
                Some(total) => total.amount = checked_add(total.amount, cost.amount, "service total")?,
                None => {
                    service_totals.insert(
                        cost.service_id.clone(),
                        ServiceTotal {
                            service_name: cost.service_name.clone(),
                            amount: cost.amount,
                        },
                    );
                }
            }
        }
    }
    let total = checked_sum(service_totals.values().map(|t| t.amount), "report total")?;

    for (order, sum) in report.orders.iter_mut().zip(order_totals) {
        if order.total_amount != sum {
            warn!(
                order_id = %order.order_id,
                recorded = %order.total_amount,
                actual = %sum,
                "Order total disagreed with its service costs"
            );
            order.total_amount = sum;
        }
    }
    report.service_totals = service_totals;
    report.total_amount = total;
    Ok(())
}

/// Fold every order cost of `other` into `report`.
///
/// Returns the order IDs whose costs could not be added.
pub fn merge_reports(report: &mut BillingReport, other: BillingReport) -> Vec<(String, CalculationError)> {
    let mut rejected = Vec::new();
    for order_cost in other.orders {
        let order_id = order_cost.order_id.clone();
        if let Err(e) = add_order_cost(report, order_cost) {
            rejected.push((order_id, e));
        }
    }
    rejected
}

fn checked_add(a: Decimal, b: Decimal, kind: &str) -> Result<Decimal, CalculationError> {
    a.checked_add(b).ok_or_else(|| CalculationError::Overflow { kind: kind.into() })
}

fn checked_sum(
    mut amounts: impl Iterator<Item = Decimal>,
    kind: &str,
) -> Result<Decimal, CalculationError> {
    amounts.try_fold(Decimal::ZERO, |acc, amount| checked_add(acc, amount, kind))
}
