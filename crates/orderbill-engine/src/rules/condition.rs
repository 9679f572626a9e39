//! Condition evaluation
//!
//! Matches one order against one `field / operator / values` condition.
//! Evaluation never fails: a missing field, a non-numeric value on a
//! numeric comparison, an unknown operator or an operator that does not
//! apply to the field's category all evaluate to `false`.

use orderbill_common::{FieldName, Operator, Order, RuleCondition};
use tracing::{debug, trace};

use super::field::{get_field, parse_number, FieldValue};
use crate::sku::SkuLedger;

/// Evaluate a condition given as raw strings.
///
/// Unknown field names and operators evaluate to `false`.
pub fn evaluate(order: &Order, field: &str, operator: &str, values: &[String]) -> bool {
    let Ok(field) = field.parse::<FieldName>() else {
        debug!(field, "Unknown field in condition");
        return false;
    };
    let Ok(operator) = operator.parse::<Operator>() else {
        debug!(operator, "Unknown operator in condition");
        return false;
    };
    evaluate_parts(order, field, operator, values)
}

/// Evaluate a typed condition
pub fn evaluate_condition(order: &Order, condition: &RuleCondition) -> bool {
    evaluate_parts(order, condition.field, condition.operator, &condition.values)
}

fn evaluate_parts(order: &Order, field: FieldName, operator: Operator, values: &[String]) -> bool {
    if values.is_empty() {
        trace!(%field, %operator, "Condition without values");
        return false;
    }

    let matched = match get_field(order, field) {
        // A missing field matches nothing, `ne` included
        FieldValue::Missing => false,
        FieldValue::Unparseable => {
            debug!(order_id = %order.order_id, %field, "Non-numeric value in numeric field");
            false
        }
        FieldValue::Number(actual) => compare_number(actual, operator, values),
        FieldValue::Text(actual) => compare_text(actual, operator, values),
        FieldValue::Skus(ledger) => compare_skus(&ledger, operator, values),
    };

    trace!(order_id = %order.order_id, %field, %operator, matched, "Evaluated condition");
    matched
}

fn compare_number(actual: f64, operator: Operator, values: &[String]) -> bool {
    if operator == Operator::Between {
        return match between_bounds(values) {
            Some((min, max)) => min <= actual && actual <= max,
            None => {
                debug!(?values, "Malformed between range");
                false
            }
        };
    }

    let Some(expected) = parse_number(&values[0]) else {
        debug!(value = %values[0], "Non-numeric comparison value");
        return false;
    };

    match operator {
        Operator::Eq => actual == expected,
        Operator::Ne => actual != expected,
        Operator::Gt => actual > expected,
        Operator::Lt => actual < expected,
        Operator::Ge => actual >= expected,
        Operator::Le => actual <= expected,
        other => {
            debug!(operator = %other, "Operator not supported on numeric fields");
            false
        }
    }
}

/// Bounds from either `["min,max"]` or `["min", "max"]`
fn between_bounds(values: &[String]) -> Option<(f64, f64)> {
    let (min, max) = match values {
        [single] => single.split_once(',')?,
        [min, max, ..] => (min.as_str(), max.as_str()),
        [] => return None,
    };
    Some((parse_number(min)?, parse_number(max)?))
}

fn compare_text(actual: &str, operator: Operator, values: &[String]) -> bool {
    match operator {
        Operator::Eq => actual == values[0],
        Operator::Ne => actual != values[0],
        Operator::In => values.iter().any(|v| v == actual),
        Operator::NotIn => !values.iter().any(|v| v == actual),
        Operator::Contains => contains_any_ignore_case(actual, values),
        Operator::NotContains => !contains_any_ignore_case(actual, values),
        Operator::StartsWith => values.iter().any(|v| actual.starts_with(v.as_str())),
        Operator::EndsWith => values.iter().any(|v| actual.ends_with(v.as_str())),
        other => {
            debug!(operator = %other, "Operator not supported on text fields");
            false
        }
    }
}

fn contains_any_ignore_case(actual: &str, values: &[String]) -> bool {
    let haystack = actual.to_lowercase();
    values.iter().any(|v| haystack.contains(&v.to_lowercase()))
}

fn compare_skus(ledger: &SkuLedger, operator: Operator, values: &[String]) -> bool {
    match operator {
        Operator::Contains => values.iter().any(|v| ledger.mentions(v)),
        Operator::NotContains => !values.iter().any(|v| ledger.mentions(v)),
        // Legacy rules match against the serialized mapping
        Operator::In | Operator::NotIn => {
            let serialized = ledger.serialized();
            let found = values.iter().any(|v| serialized.contains(v.as_str()));
            (operator == Operator::In) == found
        }
        other => {
            debug!(operator = %other, "Operator not supported on sku_quantity");
            false
        }
    }
}
