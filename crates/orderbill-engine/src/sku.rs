//! SKU normalization
//!
//! Orders carry their SKU breakdown in several shapes: JSON text, a list of
//! `{sku, quantity}` objects, or a `sku -> quantity` mapping whose values may
//! be bare numbers or `{quantity, cases}` objects. Everything here folds
//! those shapes into one canonical mapping. Parsing never fails: malformed
//! input degrades to an empty ledger.

use orderbill_common::CalculationError;
use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;
use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::{BTreeMap, BTreeSet};
use std::ops::Add;
use tracing::debug;

/// Canonical `sku -> quantity` mapping
pub type SkuQuantities = BTreeMap<String, Quantity>;

/// Canonical SKU form: whitespace and hyphens removed, upper-cased
pub fn normalize_sku(raw: &str) -> String {
    raw.chars()
        .filter(|c| !c.is_whitespace() && *c != '-')
        .flat_map(char::to_uppercase)
        .collect()
}

/// Parse any SKU payload into a canonical mapping, merging SKUs that
/// normalize identically
pub fn parse_sku_quantities(raw: &Value) -> SkuQuantities {
    SkuLedger::parse(raw).quantities()
}

/// Parse JSON-encoded SKU text into a canonical mapping
pub fn parse_sku_quantities_str(raw: &str) -> SkuQuantities {
    SkuLedger::from_text(raw).quantities()
}

/// An item quantity. Whole inputs stay whole; anything fractional is
/// carried as a float.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Quantity {
    Whole(u64),
    Fractional(f64),
}

impl Quantity {
    /// Read a strictly positive quantity from a JSON number or numeric text
    pub fn from_value(value: &Value) -> Option<Self> {
        let quantity = match value {
            Value::Number(n) => {
                if let Some(whole) = n.as_u64() {
                    Quantity::Whole(whole)
                } else if n.is_i64() {
                    return None;
                } else {
                    Quantity::Fractional(n.as_f64()?)
                }
            }
            Value::String(s) => {
                let s = s.trim();
                match s.parse::<u64>() {
                    Ok(whole) => Quantity::Whole(whole),
                    Err(_) => Quantity::Fractional(s.parse::<f64>().ok()?),
                }
            }
            _ => return None,
        };
        quantity.is_positive().then_some(quantity)
    }

    pub fn as_f64(&self) -> f64 {
        match *self {
            Quantity::Whole(q) => q as f64,
            Quantity::Fractional(q) => q,
        }
    }

    pub fn to_decimal(&self) -> Option<Decimal> {
        match *self {
            Quantity::Whole(q) => Some(Decimal::from(q)),
            Quantity::Fractional(q) => Decimal::from_f64(q),
        }
    }

    fn is_positive(&self) -> bool {
        match *self {
            Quantity::Whole(q) => q > 0,
            Quantity::Fractional(q) => q.is_finite() && q > 0.0,
        }
    }
}

impl Add for Quantity {
    type Output = Quantity;

    fn add(self, rhs: Quantity) -> Quantity {
        match (self, rhs) {
            (Quantity::Whole(a), Quantity::Whole(b)) => match a.checked_add(b) {
                Some(sum) => Quantity::Whole(sum),
                None => Quantity::Fractional(a as f64 + b as f64),
            },
            (a, b) => Quantity::Fractional(a.as_f64() + b.as_f64()),
        }
    }
}

/// One SKU line as it appeared on the order
#[derive(Debug, Clone, PartialEq)]
pub struct SkuEntry {
    /// SKU exactly as supplied
    pub raw_sku: String,
    /// Normalized SKU
    pub sku: String,
    pub quantity: Quantity,
    /// Case count: the `cases` sub-field when present, else the quantity
    pub cases: Quantity,
}

/// Case totals of an order, used for tier resolution
#[derive(Debug, Clone, PartialEq)]
pub struct CaseSummary {
    /// Cases over SKUs not in the exclusion set
    pub total_cases: Decimal,
    /// The order has SKUs and every one of them is excluded
    pub excluded_only: bool,
}

/// Parsed SKU lines of one order
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SkuLedger {
    entries: Vec<SkuEntry>,
}

impl SkuLedger {
    /// Parse a SKU payload of any supported shape
    pub fn parse(raw: &Value) -> Self {
        match raw {
            Value::String(text) => Self::from_text(text),
            Value::Array(items) => Self::from_list(items),
            Value::Object(map) => Self::from_map(map),
            Value::Null => Self::default(),
            other => {
                debug!(kind = %json_kind(other), "Unsupported SKU payload");
                Self::default()
            }
        }
    }

    /// Parse JSON-encoded SKU text
    pub fn from_text(text: &str) -> Self {
        let text = text.trim();
        if text.is_empty() {
            return Self::default();
        }
        match serde_json::from_str::<Value>(text) {
            // Double-encoded payloads are unwrapped once
            Ok(Value::String(inner)) => match serde_json::from_str::<Value>(&inner) {
                Ok(Value::String(_)) | Err(_) => Self::default(),
                Ok(value) => Self::parse(&value),
            },
            Ok(value) => Self::parse(&value),
            Err(e) => {
                debug!(error = %e, "Malformed SKU JSON, treating as empty");
                Self::default()
            }
        }
    }

    fn from_list(items: &[Value]) -> Self {
        let mut ledger = Self::default();
        for item in items {
            let Value::Object(obj) = item else {
                debug!("Skipping SKU list element that is not an object");
                continue;
            };
            let (Some(sku), Some(quantity)) = (
                obj.get("sku").and_then(sku_text),
                obj.get("quantity").and_then(Quantity::from_value),
            ) else {
                debug!("Skipping SKU list element without usable sku/quantity");
                continue;
            };
            let cases = obj
                .get("cases")
                .and_then(Quantity::from_value)
                .unwrap_or(quantity);
            ledger.push(sku, quantity, cases);
        }
        ledger
    }

    fn from_map(map: &Map<String, Value>) -> Self {
        let mut ledger = Self::default();
        for (sku, value) in map {
            let parsed = match value {
                Value::Object(obj) => {
                    let cases = obj.get("cases").and_then(Quantity::from_value);
                    match obj.get("quantity") {
                        // An explicit but unusable quantity drops the entry
                        Some(quantity) => {
                            Quantity::from_value(quantity).map(|q| (q, cases.unwrap_or(q)))
                        }
                        None => cases.map(|c| (c, c)),
                    }
                }
                other => Quantity::from_value(other).map(|q| (q, q)),
            };
            match parsed {
                Some((quantity, cases)) => ledger.push(sku.clone(), quantity, cases),
                None => debug!(sku = %sku, "Skipping SKU with unusable quantity"),
            }
        }
        ledger
    }

    fn push(&mut self, raw_sku: String, quantity: Quantity, cases: Quantity) {
        let sku = normalize_sku(&raw_sku);
        if sku.is_empty() {
            return;
        }
        self.entries.push(SkuEntry {
            raw_sku,
            sku,
            quantity,
            cases,
        });
    }

    pub fn entries(&self) -> &[SkuEntry] {
        &self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Canonical mapping with duplicates summed
    pub fn quantities(&self) -> SkuQuantities {
        let mut out = SkuQuantities::new();
        for entry in &self.entries {
            out.entry(entry.sku.clone())
                .and_modify(|q| *q = *q + entry.quantity)
                .or_insert(entry.quantity);
        }
        out
    }

    /// Whether `value` names one of the order's SKUs, either after
    /// normalization or as a raw substring of a supplied SKU
    pub fn mentions(&self, value: &str) -> bool {
        if value.is_empty() {
            return false;
        }
        let wanted = normalize_sku(value);
        self.entries
            .iter()
            .any(|e| (!wanted.is_empty() && e.sku == wanted) || e.raw_sku.contains(value))
    }

    /// Canonical mapping serialized as JSON text
    pub fn serialized(&self) -> String {
        serde_json::to_string(&self.quantities()).unwrap_or_default()
    }

    /// Case totals excluding `excluded` (already normalized) SKUs
    pub fn case_summary(&self, excluded: &BTreeSet<String>) -> Result<CaseSummary, CalculationError> {
        let mut total_cases = Decimal::ZERO;
        let mut counted = 0usize;
        for entry in &self.entries {
            if excluded.contains(&entry.sku) {
                continue;
            }
            counted += 1;
            let cases = entry.cases.to_decimal().unwrap_or(Decimal::ZERO);
            total_cases = total_cases
                .checked_add(cases)
                .ok_or_else(|| overflow("case total"))?;
        }
        Ok(CaseSummary {
            total_cases,
            excluded_only: !self.entries.is_empty() && counted == 0,
        })
    }

    /// Total quantity of the SKUs in `allowed` (already normalized)
    pub fn quantity_of(&self, allowed: &BTreeSet<String>) -> Result<Decimal, CalculationError> {
        self.entries
            .iter()
            .filter(|e| allowed.contains(&e.sku))
            .filter_map(|e| e.quantity.to_decimal())
            .try_fold(Decimal::ZERO, |total, quantity| {
                total
                    .checked_add(quantity)
                    .ok_or_else(|| overflow("sku quantity total"))
            })
    }
}

fn overflow(what: &str) -> CalculationError {
    CalculationError::Overflow {
        kind: what.to_string(),
    }
}

/// Normalize a list of SKUs into a lookup set
pub fn normalized_set<'a, I>(skus: I) -> BTreeSet<String>
where
    I: IntoIterator<Item = &'a String>,
{
    skus.into_iter()
        .map(|s| normalize_sku(s))
        .filter(|s| !s.is_empty())
        .collect()
}

fn sku_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use serde_json::json;

    #[test]
    fn test_normalize_sku() {
        assert_eq!(normalize_sku("sku-12 3"), "SKU123");
        assert_eq!(normalize_sku(" ab\tc-d "), "ABCD");
        assert_eq!(normalize_sku(""), "");
        assert_eq!(normalize_sku(" - "), "");
    }

    #[test]
    fn test_duplicate_skus_merge_after_normalization() {
        let quantities = parse_sku_quantities_str(
            r#"[{"sku":"SKU-123","quantity":5},{"sku":"SKU 123","quantity":10}]"#,
        );
        assert_eq!(quantities.len(), 1);
        assert_eq!(quantities["SKU123"], Quantity::Whole(15));
    }

    #[test]
    fn test_mapping_payload_with_nested_objects() {
        let quantities = parse_sku_quantities(&json!({
            "sku-1": 3,
            "SKU 1": {"quantity": 2},
            "box-9": {"cases": 4},
            "half": 0.5
        }));
        assert_eq!(quantities["SKU1"], Quantity::Whole(5));
        assert_eq!(quantities["BOX9"], Quantity::Whole(4));
        assert_eq!(quantities["HALF"], Quantity::Fractional(0.5));
    }

    #[test]
    fn test_whole_plus_fractional_becomes_fractional() {
        let quantities = parse_sku_quantities(&json!([
            {"sku": "A", "quantity": 1},
            {"sku": "a", "quantity": 1.5}
        ]));
        assert_eq!(quantities["A"], Quantity::Fractional(2.5));
    }

    #[test]
    fn test_invalid_elements_are_skipped() {
        let quantities = parse_sku_quantities(&json!([
            {"sku": "A", "quantity": 0},
            {"sku": "B", "quantity": -3},
            {"sku": "C"},
            {"quantity": 4},
            {"sku": "D", "quantity": "lots"},
            "E",
            {"sku": "F", "quantity": "2"}
        ]));
        assert_eq!(quantities.len(), 1);
        assert_eq!(quantities["F"], Quantity::Whole(2));
    }

    #[test]
    fn test_malformed_input_is_empty() {
        assert!(parse_sku_quantities_str("{not json").is_empty());
        assert!(parse_sku_quantities_str("").is_empty());
        assert!(parse_sku_quantities(&json!(42)).is_empty());
        assert!(parse_sku_quantities(&Value::Null).is_empty());
        assert!(parse_sku_quantities_str("\"still a string\"").is_empty());
    }

    #[test]
    fn test_double_encoded_text() {
        let inner = r#"{"SKU-7": 2}"#;
        let outer = serde_json::to_string(inner).unwrap();
        let quantities = parse_sku_quantities_str(&outer);
        assert_eq!(quantities["SKU7"], Quantity::Whole(2));
    }

    #[test]
    fn test_mentions_normalized_and_raw() {
        let ledger = SkuLedger::parse(&json!({"Widget-Blue-L": 2}));
        assert!(ledger.mentions("widget blue l"));
        assert!(ledger.mentions("Blue"));
        assert!(!ledger.mentions("blue"));
        assert!(!ledger.mentions(""));
    }

    #[test]
    fn test_case_summary_honors_exclusions() {
        let ledger = SkuLedger::parse(&json!({
            "A-1": {"quantity": 24, "cases": 2},
            "B-2": 3,
            "PALLET": 1
        }));
        let excluded = normalized_set(&["pallet".to_string()]);
        let summary = ledger.case_summary(&excluded).unwrap();
        assert_eq!(summary.total_cases, dec!(5));
        assert!(!summary.excluded_only);

        let all = normalized_set(&["A-1".to_string(), "b2".to_string(), "PALLET".to_string()]);
        let summary = ledger.case_summary(&all).unwrap();
        assert_eq!(summary.total_cases, Decimal::ZERO);
        assert!(summary.excluded_only);
    }

    #[test]
    fn test_quantity_of_allow_list() {
        let ledger = SkuLedger::parse(&json!([
            {"sku": "A-1", "quantity": 4},
            {"sku": "B-2", "quantity": 6},
            {"sku": "a 1", "quantity": 1}
        ]));
        let allowed = normalized_set(&["a1".to_string()]);
        assert_eq!(ledger.quantity_of(&allowed).unwrap(), dec!(5));
    }

    #[test]
    fn test_serialized_mapping() {
        let ledger = SkuLedger::parse(&json!({"b": 1, "a": 2}));
        assert_eq!(ledger.serialized(), r#"{"A":2,"B":1}"#);
    }

    #[test]
    fn test_explicit_zero_quantity_does_not_fall_back_to_cases() {
        let quantities = parse_sku_quantities(&json!({
            "A": {"quantity": 0, "cases": 3},
            "B": {"quantity": -2, "cases": 1},
            "C": {"quantity": "none", "cases": 2},
            "D": {"cases": 4}
        }));
        assert_eq!(quantities.len(), 1);
        assert_eq!(quantities["D"], Quantity::Whole(4));
    }

    #[test]
    fn test_oversized_totals_report_overflow() {
        let ledger = SkuLedger::parse(&json!({"A": 7e28, "B": 7e28}));
        assert_eq!(ledger.entries().len(), 2);

        let err = ledger.case_summary(&BTreeSet::new()).unwrap_err();
        assert!(matches!(err, CalculationError::Overflow { .. }));

        let allowed = normalized_set(&["a".to_string(), "b".to_string()]);
        assert!(ledger.quantity_of(&allowed).is_err());
        let only_a = normalized_set(&["a".to_string()]);
        assert!(ledger.quantity_of(&only_a).is_ok());
    }
}
