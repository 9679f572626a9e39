//! Tier resolution
//!
//! Maps an order's case total onto a tier table. Ranges are scanned in
//! configuration order and the first inclusive match wins, so overlapping
//! tables resolve deterministically.

use orderbill_common::{CalculationError, TierConfiguration, TierRange};
use rust_decimal::Decimal;
use tracing::trace;

use crate::sku::{normalized_set, CaseSummary, SkuLedger};

/// Multiplier of the first range containing `cases.total_cases`.
///
/// Returns `None` when nothing matches, when the total is zero, or when every
/// SKU on the order is excluded.
pub fn resolve_tier(cases: &CaseSummary, ranges: &[TierRange]) -> Option<Decimal> {
    if cases.excluded_only || cases.total_cases <= Decimal::ZERO {
        return None;
    }
    let multiplier = ranges
        .iter()
        .find(|range| range.contains(cases.total_cases))
        .map(|range| range.multiplier);
    trace!(total_cases = %cases.total_cases, ?multiplier, "Resolved tier");
    multiplier
}

/// Case summary of an order against a tier configuration's exclusions
pub fn case_summary(
    ledger: &SkuLedger,
    tiers: &TierConfiguration,
) -> Result<CaseSummary, CalculationError> {
    ledger.case_summary(&normalized_set(&tiers.excluded_skus))
}

/// Resolve the multiplier for an order's SKUs
pub fn resolve_order_tier(
    ledger: &SkuLedger,
    tiers: &TierConfiguration,
) -> Result<Option<Decimal>, CalculationError> {
    Ok(resolve_tier(&case_summary(ledger, tiers)?, &tiers.ranges))
}
