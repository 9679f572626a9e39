//! Customer-service configuration
//!
//! A customer-service is one billable service attached to one customer:
//! a unit price, the rule groups deciding which orders it applies to, and
//! the calculations turning a matching order into a charge.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

use super::rule::RuleGroup;

/// How a calculation turns an order into an amount
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CalculationKind {
    /// The configured value, verbatim
    FlatFee,
    /// `unit_price * value / 100`
    Percentage,
    /// `unit_price * total_item_qty`
    PerUnit,
    /// `unit_price * weight_lb`
    WeightBased,
    /// `unit_price * volume_cuft`
    VolumeBased,
    /// `unit_price * tier multiplier / 100`
    TieredPercentage,
    /// `unit_price * tier multiplier`
    CaseBasedTier,
    /// `unit_price * quantity of allow-listed SKUs`
    ProductSpecific,
}

impl CalculationKind {
    /// Whether this kind resolves a tier before computing
    pub fn requires_tiers(&self) -> bool {
        matches!(
            self,
            CalculationKind::CaseBasedTier | CalculationKind::TieredPercentage
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            CalculationKind::FlatFee => "flat_fee",
            CalculationKind::Percentage => "percentage",
            CalculationKind::PerUnit => "per_unit",
            CalculationKind::WeightBased => "weight_based",
            CalculationKind::VolumeBased => "volume_based",
            CalculationKind::TieredPercentage => "tiered_percentage",
            CalculationKind::CaseBasedTier => "case_based_tier",
            CalculationKind::ProductSpecific => "product_specific",
        }
    }
}

impl fmt::Display for CalculationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One `[min, max] -> multiplier` tier, inclusive on both ends
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TierRange {
    pub min: Decimal,
    pub max: Decimal,
    pub multiplier: Decimal,
}

impl TierRange {
    pub fn new(min: Decimal, max: Decimal, multiplier: Decimal) -> Self {
        Self {
            min,
            max,
            multiplier,
        }
    }

    /// Whether `value` falls inside this range
    pub fn contains(&self, value: Decimal) -> bool {
        self.min <= value && value <= self.max
    }
}

/// Ordered tier table plus the SKUs that never count towards case totals.
///
/// Ranges are expected not to overlap; when they do, the first matching
/// range wins.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct TierConfiguration {
    pub ranges: Vec<TierRange>,
    #[serde(default)]
    pub excluded_skus: Vec<String>,
}

/// One pricing calculation attached to a customer-service
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Calculation {
    #[serde(rename = "type")]
    pub kind: CalculationKind,
    #[serde(default)]
    pub value: Decimal,
    #[serde(default)]
    pub tier_config: Option<TierConfiguration>,
    /// SKU allow-list for `product_specific`
    #[serde(default)]
    pub skus: Vec<String>,
}

impl Calculation {
    pub fn new(kind: CalculationKind, value: Decimal) -> Self {
        Self {
            kind,
            value,
            tier_config: None,
            skus: Vec::new(),
        }
    }

    pub fn with_tiers(mut self, tiers: TierConfiguration) -> Self {
        self.tier_config = Some(tiers);
        self
    }

    pub fn with_skus<I, S>(mut self, skus: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.skus = skus.into_iter().map(Into::into).collect();
        self
    }
}

fn default_active() -> bool {
    true
}

/// A billable service configured for one customer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CustomerService {
    /// ID of this customer-service assignment
    pub id: String,
    pub customer_id: String,
    /// ID of the underlying service, used as the report's totals key
    pub service_id: String,
    pub service_name: String,
    /// Base price the calculations scale
    pub unit_price: Decimal,
    #[serde(default = "default_active")]
    pub active: bool,
    /// Every group must match for the service to apply; none means always
    #[serde(default)]
    pub rule_groups: Vec<RuleGroup>,
    /// Summed into one service cost; none means `unit_price` once per order
    #[serde(default)]
    pub calculations: Vec<Calculation>,
}

impl CustomerService {
    pub fn new(
        id: impl Into<String>,
        customer_id: impl Into<String>,
        service_id: impl Into<String>,
        service_name: impl Into<String>,
        unit_price: Decimal,
    ) -> Self {
        Self {
            id: id.into(),
            customer_id: customer_id.into(),
            service_id: service_id.into(),
            service_name: service_name.into(),
            unit_price,
            active: true,
            rule_groups: Vec::new(),
            calculations: Vec::new(),
        }
    }

    pub fn with_rule_group(mut self, group: RuleGroup) -> Self {
        self.rule_groups.push(group);
        self
    }

    pub fn with_calculation(mut self, calculation: Calculation) -> Self {
        self.calculations.push(calculation);
        self
    }

    pub fn inactive(mut self) -> Self {
        self.active = false;
        self
    }
}
