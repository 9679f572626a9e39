//! Typed access to order fields

use orderbill_common::{FieldKind, FieldName, Order};
use serde_json::Value;

use crate::sku::SkuLedger;

/// Value of one order field, tagged by comparison category
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue<'a> {
    Number(f64),
    Text(&'a str),
    Skus(SkuLedger),
    /// Present on a numeric field but not coercible to a number
    Unparseable,
    Missing,
}

/// Read `field` from `order`
pub fn get_field(order: &Order, field: FieldName) -> FieldValue<'_> {
    match field.kind() {
        FieldKind::Numeric => match order.raw_number(field) {
            None => FieldValue::Missing,
            Some(raw) => match coerce_number(raw) {
                Some(n) => FieldValue::Number(n),
                None => FieldValue::Unparseable,
            },
        },
        FieldKind::Text => match order.text(field) {
            Some(text) => FieldValue::Text(text),
            None => FieldValue::Missing,
        },
        FieldKind::Sku => match order.sku_quantity.as_ref() {
            None | Some(Value::Null) => FieldValue::Missing,
            Some(raw) => FieldValue::Skus(SkuLedger::parse(raw)),
        },
    }
}

/// Coerce a JSON number or numeric text to a finite float
pub fn coerce_number(value: &Value) -> Option<f64> {
    let n = match value {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => parse_number(s)?,
        _ => return None,
    };
    n.is_finite().then_some(n)
}

/// Parse rule-side numeric text
pub fn parse_number(text: &str) -> Option<f64> {
    text.trim().parse::<f64>().ok().filter(|n| n.is_finite())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use serde_json::json;

    fn order() -> Order {
        Order::new("o-1", "c-1", NaiveDate::from_ymd_opt(2024, 5, 1).unwrap())
    }

    #[test]
    fn test_numeric_field_coercion() {
        let o = order()
            .with_number(FieldName::WeightLb, "12.5")
            .with_number(FieldName::Packages, 3)
            .with_number(FieldName::LineItems, "n/a");

        assert_eq!(get_field(&o, FieldName::WeightLb), FieldValue::Number(12.5));
        assert_eq!(get_field(&o, FieldName::Packages), FieldValue::Number(3.0));
        assert_eq!(get_field(&o, FieldName::LineItems), FieldValue::Unparseable);
        assert_eq!(get_field(&o, FieldName::VolumeCuft), FieldValue::Missing);
    }

    #[test]
    fn test_text_and_sku_fields() {
        let o = order()
            .with_text(FieldName::Carrier, "UPS")
            .with_skus(json!({"A-1": 2}));

        assert_eq!(get_field(&o, FieldName::Carrier), FieldValue::Text("UPS"));
        assert_eq!(get_field(&o, FieldName::Notes), FieldValue::Missing);
        match get_field(&o, FieldName::SkuQuantity) {
            FieldValue::Skus(ledger) => assert_eq!(ledger.entries().len(), 1),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_non_finite_numbers_rejected() {
        assert_eq!(coerce_number(&json!("NaN")), None);
        assert_eq!(coerce_number(&json!("inf")), None);
        assert_eq!(coerce_number(&json!(true)), None);
        assert_eq!(parse_number(" 7 "), Some(7.0));
    }
}
