//! Calculation strategies
//!
//! Each calculation kind maps `(unit_price, order, resolved tier)` to a
//! non-negative amount. Amounts stay unrounded until a service's
//! calculations have been summed; [`service_charge`] rounds once to
//! [`MONEY_DECIMAL_PLACES`].

use orderbill_common::{
    Calculation, CalculationError, CalculationKind, CustomerService, FieldName, Order,
    MONEY_DECIMAL_PLACES,
};
use rust_decimal::prelude::*;
use serde_json::Value;
use std::sync::OnceLock;
use tracing::trace;

use super::tier::resolve_order_tier;
use crate::sku::{normalized_set, SkuLedger};

/// Round a monetary amount to 2 places, half away from zero
pub fn round_money(amount: Decimal) -> Decimal {
    amount.round_dp_with_strategy(MONEY_DECIMAL_PLACES, RoundingStrategy::MidpointAwayFromZero)
}

/// An order plus its lazily parsed SKU ledger
pub struct OrderContext<'a> {
    order: &'a Order,
    ledger: OnceLock<SkuLedger>,
}

impl<'a> OrderContext<'a> {
    pub fn new(order: &'a Order) -> Self {
        Self {
            order,
            ledger: OnceLock::new(),
        }
    }

    pub fn order(&self) -> &'a Order {
        self.order
    }

    /// SKU ledger, parsed on first use
    pub fn ledger(&self) -> &SkuLedger {
        self.ledger.get_or_init(|| {
            self.order
                .sku_quantity
                .as_ref()
                .map(SkuLedger::parse)
                .unwrap_or_default()
        })
    }

    /// Numeric order field as a decimal; missing fields count as zero
    pub fn decimal_field(&self, field: FieldName) -> Result<Decimal, CalculationError> {
        let Some(raw) = self.order.raw_number(field) else {
            return Ok(Decimal::ZERO);
        };
        parse_decimal(raw).ok_or_else(|| CalculationError::NonNumericField {
            field: field.to_string(),
            value: raw.to_string(),
        })
    }
}

fn parse_decimal(raw: &Value) -> Option<Decimal> {
    let text = match raw {
        Value::Number(n) => n.to_string(),
        Value::String(s) => s.trim().to_string(),
        _ => return None,
    };
    Decimal::from_str(&text)
        .or_else(|_| Decimal::from_scientific(&text))
        .ok()
}

/// Amount of one calculation, unrounded and clamped at zero
pub fn compute(
    calculation: &Calculation,
    unit_price: Decimal,
    ctx: &OrderContext<'_>,
) -> Result<Decimal, CalculationError> {
    let kind = calculation.kind;
    let amount = match kind {
        CalculationKind::FlatFee => calculation.value,
        CalculationKind::Percentage => {
            checked_mul(unit_price, calculation.value, kind)? / Decimal::ONE_HUNDRED
        }
        CalculationKind::PerUnit => {
            checked_mul(unit_price, ctx.decimal_field(FieldName::TotalItemQty)?, kind)?
        }
        CalculationKind::WeightBased => {
            checked_mul(unit_price, ctx.decimal_field(FieldName::WeightLb)?, kind)?
        }
        CalculationKind::VolumeBased => {
            checked_mul(unit_price, ctx.decimal_field(FieldName::VolumeCuft)?, kind)?
        }
        CalculationKind::CaseBasedTier => match tier_multiplier(calculation, ctx)? {
            Some(multiplier) => checked_mul(unit_price, multiplier, kind)?,
            None => Decimal::ZERO,
        },
        CalculationKind::TieredPercentage => match tier_multiplier(calculation, ctx)? {
            Some(multiplier) => checked_mul(unit_price, multiplier, kind)? / Decimal::ONE_HUNDRED,
            None => Decimal::ZERO,
        },
        CalculationKind::ProductSpecific => {
            let allowed = normalized_set(&calculation.skus);
            let matched = ctx.ledger().quantity_of(&allowed)?;
            checked_mul(unit_price, matched, kind)?
        }
    };

    trace!(order_id = %ctx.order().order_id, %kind, %amount, "Computed calculation");
    Ok(amount.max(Decimal::ZERO))
}

fn tier_multiplier(
    calculation: &Calculation,
    ctx: &OrderContext<'_>,
) -> Result<Option<Decimal>, CalculationError> {
    match calculation.tier_config.as_ref() {
        Some(tiers) => resolve_order_tier(ctx.ledger(), tiers),
        None => Ok(None),
    }
}

fn checked_mul(a: Decimal, b: Decimal, kind: CalculationKind) -> Result<Decimal, CalculationError> {
    a.checked_mul(b).ok_or_else(|| CalculationError::Overflow {
        kind: kind.to_string(),
    })
}

/// Total charge of a service for one order, rounded to 2 places.
///
/// Calculations are summed before rounding. A service without calculations
/// charges its unit price once.
pub fn service_charge(
    service: &CustomerService,
    ctx: &OrderContext<'_>,
) -> Result<Decimal, CalculationError> {
    if service.calculations.is_empty() {
        return Ok(round_money(service.unit_price.max(Decimal::ZERO)));
    }

    let mut total = Decimal::ZERO;
    for calculation in &service.calculations {
        let amount = compute(calculation, service.unit_price, ctx)?;
        total = total
            .checked_add(amount)
            .ok_or_else(|| CalculationError::Overflow {
                kind: calculation.kind.to_string(),
            })?;
    }
    Ok(round_money(total))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use orderbill_common::{TierConfiguration, TierRange};
    use rust_decimal_macros::dec;
    use serde_json::json;

    fn order() -> Order {
        Order::new("o-1", "c-1", NaiveDate::from_ymd_opt(2024, 5, 1).unwrap())
            .with_number(FieldName::TotalItemQty, 20)
            .with_number(FieldName::WeightLb, "12.5")
            .with_number(FieldName::VolumeCuft, 0.75)
            .with_skus(json!([
                {"sku": "A-1", "quantity": 3},
                {"sku": "B-2", "quantity": 2},
                {"sku": "WRAP", "quantity": 9}
            ]))
    }

    fn tiers() -> TierConfiguration {
        TierConfiguration {
            ranges: vec![
                TierRange::new(dec!(1), dec!(3), dec!(1.0)),
                TierRange::new(dec!(4), dec!(6), dec!(2.0)),
                TierRange::new(dec!(7), dec!(10), dec!(3.0)),
            ],
            excluded_skus: vec!["wrap".to_string()],
        }
    }

    fn run(calculation: Calculation, unit_price: Decimal) -> Decimal {
        let o = order();
        compute(&calculation, unit_price, &OrderContext::new(&o)).unwrap()
    }

    #[test]
    fn test_flat_fee_and_percentage() {
        assert_eq!(run(Calculation::new(CalculationKind::FlatFee, dec!(100)), dec!(7)), dec!(100));
        assert_eq!(
            run(Calculation::new(CalculationKind::Percentage, dec!(15)), dec!(80)),
            dec!(12)
        );
    }

    #[test]
    fn test_field_scaled_kinds() {
        assert_eq!(run(Calculation::new(CalculationKind::PerUnit, dec!(0)), dec!(2.50)), dec!(50));
        assert_eq!(
            run(Calculation::new(CalculationKind::WeightBased, dec!(0)), dec!(0.40)),
            dec!(5)
        );
        assert_eq!(
            run(Calculation::new(CalculationKind::VolumeBased, dec!(0)), dec!(3)),
            dec!(2.25)
        );
    }

    #[test]
    fn test_case_based_tier() {
        // 3 + 2 cases after excluding WRAP
        let calc = Calculation::new(CalculationKind::CaseBasedTier, dec!(0)).with_tiers(tiers());
        assert_eq!(run(calc, dec!(4.00)), dec!(8.00));
    }

    #[test]
    fn test_tier_without_match_contributes_zero() {
        let mut t = tiers();
        t.excluded_skus.clear();
        // 14 cases, beyond the table
        let calc = Calculation::new(CalculationKind::CaseBasedTier, dec!(0)).with_tiers(t);
        assert_eq!(run(calc, dec!(4.00)), Decimal::ZERO);
    }

    #[test]
    fn test_tiered_percentage() {
        let calc = Calculation::new(CalculationKind::TieredPercentage, dec!(0)).with_tiers(tiers());
        assert_eq!(run(calc, dec!(50)), dec!(1));
    }

    #[test]
    fn test_product_specific() {
        let calc = Calculation::new(CalculationKind::ProductSpecific, dec!(0)).with_skus(["a1", "C-3"]);
        assert_eq!(run(calc, dec!(1.10)), dec!(3.30));
    }

    #[test]
    fn test_missing_field_is_zero_and_unparseable_is_error() {
        let o = order().with_number(FieldName::WeightLb, "heavy");
        let ctx = OrderContext::new(&o);
        let err = compute(&Calculation::new(CalculationKind::WeightBased, dec!(0)), dec!(1), &ctx)
            .unwrap_err();
        assert!(matches!(err, CalculationError::NonNumericField { .. }));

        let mut bare = order();
        bare.total_item_qty = None;
        let ctx = OrderContext::new(&bare);
        let amount = compute(&Calculation::new(CalculationKind::PerUnit, dec!(0)), dec!(3), &ctx);
        assert_eq!(amount.unwrap(), Decimal::ZERO);
    }

    #[test]
    fn test_oversized_sku_totals_are_calculation_errors() {
        let o = order().with_skus(json!({"A": 7e28, "B": 7e28}));
        let ctx = OrderContext::new(&o);
        let tiered = Calculation::new(CalculationKind::CaseBasedTier, dec!(0)).with_tiers(tiers());
        let err = compute(&tiered, dec!(1), &ctx).unwrap_err();
        assert!(matches!(err, CalculationError::Overflow { .. }));

        let product = Calculation::new(CalculationKind::ProductSpecific, dec!(0)).with_skus(["A", "B"]);
        assert!(compute(&product, dec!(1), &ctx).is_err());
    }

    #[test]
    fn test_negative_results_clamp_to_zero() {
        let o = order().with_number(FieldName::WeightLb, -4);
        let ctx = OrderContext::new(&o);
        let amount = compute(&Calculation::new(CalculationKind::WeightBased, dec!(0)), dec!(2), &ctx);
        assert_eq!(amount.unwrap(), Decimal::ZERO);
    }

    #[test]
    fn test_service_charge_sums_then_rounds() {
        let o = order().with_number(FieldName::TotalItemQty, 3);
        let ctx = OrderContext::new(&o);
        // 3 * 0.335 = 1.005 and 1.005 * 2 = 2.01 when summed first;
        // rounding each first would give 1.01 + 1.01 = 2.02
        let service = CustomerService::new("cs-1", "c-1", "svc-1", "Pick", dec!(0.335))
            .with_calculation(Calculation::new(CalculationKind::PerUnit, dec!(0)))
            .with_calculation(Calculation::new(CalculationKind::PerUnit, dec!(0)));
        assert_eq!(service_charge(&service, &ctx).unwrap(), dec!(2.01));
    }

    #[test]
    fn test_service_without_calculations_charges_unit_price() {
        let o = order();
        let ctx = OrderContext::new(&o);
        let service = CustomerService::new("cs-1", "c-1", "svc-1", "Handling", dec!(1.255));
        assert_eq!(service_charge(&service, &ctx).unwrap(), dec!(1.26));
    }

    #[test]
    fn test_round_money() {
        assert_eq!(round_money(dec!(2.345)), dec!(2.35));
        assert_eq!(round_money(dec!(2.344)), dec!(2.34));
        assert_eq!(round_money(dec!(100)), dec!(100));
    }
}
