//! Service catalog loading and validation
//!
//! Configuration is the one place the engine fails loudly: a bad rule
//! silently mis-billing customers is worse than refusing to run. Every
//! service is validated before any order is evaluated, and each error names
//! the path of the offending element.

use orderbill_common::{
    CalculationKind, ConfigError, CustomerService, FieldName, Operator, RuleGroup, RuleNode,
    TierConfiguration,
};
use rust_decimal::Decimal;
use serde_json::Value;
use std::collections::BTreeSet;
use tracing::{debug, info, instrument};

use crate::sku::normalized_set;

/// Validated set of customer-services
#[derive(Debug, Clone, Default)]
pub struct ServiceCatalog {
    services: Vec<CustomerService>,
}

impl ServiceCatalog {
    /// Build a catalog from typed services, validating each one
    pub fn new(services: Vec<CustomerService>) -> Result<Self, ConfigError> {
        for (i, service) in services.iter().enumerate() {
            validate_service(service, &format!("services[{}]", i))?;
        }
        Ok(Self { services })
    }

    /// Parse a JSON document holding either a list of services or an object
    /// with a `services` list
    #[instrument(skip(text))]
    pub fn from_json_str(text: &str) -> Result<Self, ConfigError> {
        let document: Value = serde_json::from_str(text).map_err(|e| ConfigError::Malformed {
            path: "$".to_string(),
            message: e.to_string(),
        })?;

        let values = match document {
            Value::Array(values) => values,
            Value::Object(mut obj) => match obj.remove("services") {
                Some(Value::Array(values)) => values,
                Some(_) => {
                    return Err(ConfigError::Malformed {
                        path: "services".to_string(),
                        message: "expected a list of services".to_string(),
                    })
                }
                None => {
                    return Err(ConfigError::MissingField {
                        path: "$".to_string(),
                        field: "services".to_string(),
                    })
                }
            },
            _ => {
                return Err(ConfigError::Malformed {
                    path: "$".to_string(),
                    message: "expected a list of services".to_string(),
                })
            }
        };

        Self::from_values(values)
    }

    /// Deserialize and validate services one by one
    pub fn from_values(values: Vec<Value>) -> Result<Self, ConfigError> {
        let mut services = Vec::with_capacity(values.len());
        for (i, value) in values.into_iter().enumerate() {
            check_names(&value, &format!("services[{}]", i))?;
            let service: CustomerService =
                serde_json::from_value(value).map_err(|e| ConfigError::Malformed {
                    path: format!("services[{}]", i),
                    message: e.to_string(),
                })?;
            services.push(service);
        }
        let catalog = Self::new(services)?;
        info!(services = catalog.services.len(), "Loaded service catalog");
        Ok(catalog)
    }

    pub fn services(&self) -> &[CustomerService] {
        &self.services
    }

    pub fn len(&self) -> usize {
        self.services.len()
    }

    pub fn is_empty(&self) -> bool {
        self.services.is_empty()
    }

    /// Active services of a customer, optionally narrowed to the given
    /// customer-service IDs. `None` selects all; an empty set selects none.
    pub fn select(
        &self,
        customer_id: &str,
        included: Option<&BTreeSet<String>>,
    ) -> Vec<&CustomerService> {
        let selected: Vec<&CustomerService> = self
            .services
            .iter()
            .filter(|s| s.customer_id == customer_id && s.active)
            .filter(|s| included.map_or(true, |ids| ids.contains(&s.id)))
            .collect();
        debug!(customer_id, selected = selected.len(), "Selected services");
        selected
    }
}

/// Validate one customer-service; `path` prefixes every error
pub fn validate_service(service: &CustomerService, path: &str) -> Result<(), ConfigError> {
    if service.id.trim().is_empty() {
        return Err(missing(path, "id"));
    }
    if service.service_id.trim().is_empty() {
        return Err(missing(path, "service_id"));
    }
    non_negative(path, "unit_price", service.unit_price)?;

    for (i, calculation) in service.calculations.iter().enumerate() {
        let calc_path = format!("{}.calculations[{}]", path, i);
        non_negative(&calc_path, "value", calculation.value)?;

        if calculation.kind.requires_tiers() {
            match &calculation.tier_config {
                Some(tiers) => validate_tiers(tiers, &format!("{}.tier_config", calc_path))?,
                None => {
                    return Err(ConfigError::MissingTierConfig {
                        path: calc_path,
                        kind: calculation.kind.to_string(),
                    })
                }
            }
        } else if let Some(tiers) = &calculation.tier_config {
            validate_tiers(tiers, &format!("{}.tier_config", calc_path))?;
        }

        if calculation.kind == CalculationKind::ProductSpecific
            && normalized_set(&calculation.skus).is_empty()
        {
            return Err(ConfigError::EmptySkuAllowList {
                path: calc_path,
                kind: calculation.kind.to_string(),
            });
        }
    }

    for (i, group) in service.rule_groups.iter().enumerate() {
        validate_group(group, &format!("{}.rule_groups[{}]", path, i))?;
    }
    Ok(())
}

/// Reject unknown operators, fields and calculation types with the exact
/// path of the offending element, ahead of typed deserialization
fn check_names(service: &Value, path: &str) -> Result<(), ConfigError> {
    if let Some(calculations) = service.get("calculations").and_then(Value::as_array) {
        for (i, calculation) in calculations.iter().enumerate() {
            if let Some(kind) = calculation.get("type").and_then(Value::as_str) {
                if serde_json::from_value::<CalculationKind>(Value::from(kind)).is_err() {
                    return Err(ConfigError::UnknownCalculationKind {
                        path: format!("{}.calculations[{}]", path, i),
                        kind: kind.to_string(),
                    });
                }
            }
        }
    }
    if let Some(groups) = service.get("rule_groups").and_then(Value::as_array) {
        for (i, group) in groups.iter().enumerate() {
            check_group_names(group, &format!("{}.rule_groups[{}]", path, i))?;
        }
    }
    Ok(())
}

fn check_group_names(group: &Value, path: &str) -> Result<(), ConfigError> {
    let Some(conditions) = group.get("conditions").and_then(Value::as_array) else {
        return Ok(());
    };
    for (i, node) in conditions.iter().enumerate() {
        let node_path = format!("{}.conditions[{}]", path, i);
        if !node.is_object() {
            return Err(ConfigError::Malformed {
                path: node_path,
                message: "expected a condition or a rule group object".to_string(),
            });
        }
        if node.get("field").is_none() {
            if node.get("conditions").is_none() && node.get("logic_operator").is_none() {
                return Err(ConfigError::Malformed {
                    path: node_path,
                    message: "neither a condition (no `field`) nor a rule group (no `conditions`)"
                        .to_string(),
                });
            }
            check_group_names(node, &node_path)?;
            continue;
        }
        if let Some(field) = node.get("field").and_then(Value::as_str) {
            if field.parse::<FieldName>().is_err() {
                return Err(ConfigError::UnknownField {
                    path: node_path,
                    field: field.to_string(),
                });
            }
        }
        if let Some(operator) = node.get("operator").and_then(Value::as_str) {
            if operator.parse::<Operator>().is_err() {
                return Err(ConfigError::UnknownOperator {
                    path: node_path,
                    operator: operator.to_string(),
                });
            }
        }
    }
    Ok(())
}

fn validate_tiers(tiers: &TierConfiguration, path: &str) -> Result<(), ConfigError> {
    if tiers.ranges.is_empty() {
        return Err(missing(path, "ranges"));
    }
    for (i, range) in tiers.ranges.iter().enumerate() {
        let range_path = format!("{}.ranges[{}]", path, i);
        non_negative(&range_path, "min", range.min)?;
        non_negative(&range_path, "max", range.max)?;
        non_negative(&range_path, "multiplier", range.multiplier)?;
        if range.min > range.max {
            return Err(ConfigError::InvertedRange {
                path: range_path,
                min: range.min.to_string(),
                max: range.max.to_string(),
            });
        }
    }
    Ok(())
}

fn validate_group(group: &RuleGroup, path: &str) -> Result<(), ConfigError> {
    for (i, node) in group.conditions.iter().enumerate() {
        let node_path = format!("{}.conditions[{}]", path, i);
        match node {
            RuleNode::Condition(condition) if condition.values.is_empty() => {
                return Err(ConfigError::EmptyValues {
                    path: node_path,
                    operator: condition.operator.to_string(),
                })
            }
            RuleNode::Condition(_) => {}
            RuleNode::Group(inner) => validate_group(inner, &node_path)?,
        }
    }
    Ok(())
}

fn missing(path: &str, field: &str) -> ConfigError {
    ConfigError::MissingField {
        path: path.to_string(),
        field: field.to_string(),
    }
}

fn non_negative(path: &str, field: &str, value: Decimal) -> Result<(), ConfigError> {
    if value < Decimal::ZERO {
        return Err(ConfigError::Negative {
            path: path.to_string(),
            field: field.to_string(),
            value: value.to_string(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use orderbill_common::{Calculation, FieldName, Operator, RuleCondition, TierRange};
    use rust_decimal_macros::dec;
    use serde_json::json;

    fn service() -> CustomerService {
        CustomerService::new("cs-1", "c-1", "svc-1", "Picking", dec!(2.50))
    }

    fn tier_calc(ranges: Vec<TierRange>) -> Calculation {
        Calculation::new(CalculationKind::CaseBasedTier, dec!(0)).with_tiers(TierConfiguration {
            ranges,
            excluded_skus: vec![],
        })
    }

    #[test]
    fn test_valid_service_passes() {
        let s = service()
            .with_calculation(tier_calc(vec![TierRange::new(dec!(1), dec!(3), dec!(1))]))
            .with_rule_group(RuleGroup::all(vec![RuleCondition::new(
                FieldName::Carrier,
                Operator::Eq,
                ["UPS"],
            )
            .into()]));
        assert!(ServiceCatalog::new(vec![s]).is_ok());
    }

    #[test]
    fn test_inverted_range_is_attributed() {
        let s = service().with_calculation(tier_calc(vec![
            TierRange::new(dec!(1), dec!(3), dec!(1)),
            TierRange::new(dec!(9), dec!(4), dec!(2)),
        ]));
        let err = ServiceCatalog::new(vec![service(), s]).unwrap_err();
        assert!(matches!(err, ConfigError::InvertedRange { .. }));
        assert_eq!(err.path(), "services[1].calculations[0].tier_config.ranges[1]");
    }

    #[test]
    fn test_negative_multiplier_rejected() {
        let s = service().with_calculation(tier_calc(vec![TierRange::new(dec!(1), dec!(3), dec!(-1))]));
        let err = validate_service(&s, "services[0]").unwrap_err();
        assert!(err.to_string().contains("multiplier"));
    }

    #[test]
    fn test_tier_kind_without_tiers_rejected() {
        let s = service().with_calculation(Calculation::new(CalculationKind::TieredPercentage, dec!(0)));
        let err = validate_service(&s, "services[0]").unwrap_err();
        assert!(matches!(err, ConfigError::MissingTierConfig { .. }));
    }

    #[test]
    fn test_product_specific_needs_skus() {
        let s = service().with_calculation(
            Calculation::new(CalculationKind::ProductSpecific, dec!(0)).with_skus([" - "]),
        );
        let err = validate_service(&s, "services[0]").unwrap_err();
        assert!(matches!(err, ConfigError::EmptySkuAllowList { .. }));
    }

    #[test]
    fn test_empty_condition_values_rejected() {
        let inner = RuleGroup::any(vec![RuleCondition::new(
            FieldName::Carrier,
            Operator::In,
            Vec::<String>::new(),
        )
        .into()]);
        let s = service().with_rule_group(RuleGroup::all(vec![inner.into()]));
        let err = validate_service(&s, "services[0]").unwrap_err();
        assert_eq!(err.path(), "services[0].rule_groups[0].conditions[0].conditions[0]");
    }

    #[test]
    fn test_malformed_json_names_service() {
        let text = json!({
            "services": [
                {"id": "cs-1", "customer_id": "c", "service_id": "s", "service_name": "n",
                 "unit_price": 1},
                {"id": "cs-2", "customer_id": "c", "service_id": "s", "service_name": "n",
                 "unit_price": 1,
                 "calculations": [{"type": "case_based_tier",
                   "tier_config": {"ranges": [{"min": "one", "max": 3, "multiplier": 1}]}}]}
            ]
        })
        .to_string();
        let err = ServiceCatalog::from_json_str(&text).unwrap_err();
        assert_eq!(err.path(), "services[1]");
    }

    #[test]
    fn test_unknown_operator_names_service() {
        let text = json!([
            {"id": "cs-1", "customer_id": "c", "service_id": "s", "service_name": "n",
             "unit_price": 1,
             "rule_groups": [{"logic_operator": "AND", "conditions": [
                 {"field": "carrier", "operator": "like", "values": ["UPS"]}]}]}
        ])
        .to_string();
        let err = ServiceCatalog::from_json_str(&text).unwrap_err();
        assert!(matches!(err, ConfigError::UnknownOperator { .. }));
        assert_eq!(err.path(), "services[0].rule_groups[0].conditions[0]");
        assert!(err.to_string().contains("like"));
    }

    #[test]
    fn test_misspelled_condition_key_is_attributed() {
        let text = json!([
            {"id": "cs-1", "customer_id": "c", "service_id": "s", "service_name": "UPS only",
             "unit_price": 5,
             "rule_groups": [{"logic_operator": "AND", "conditions": [
                 {"feild": "carrier", "operator": "eq", "values": ["UPS"]}]}]}
        ])
        .to_string();
        let err = ServiceCatalog::from_json_str(&text).unwrap_err();
        assert!(matches!(err, ConfigError::Malformed { .. }));
        assert_eq!(err.path(), "services[0].rule_groups[0].conditions[0]");

        // A group-shaped node with a stray key still fails typed deserialization
        let text = json!([
            {"id": "cs-1", "customer_id": "c", "service_id": "s", "service_name": "n",
             "unit_price": 5,
             "rule_groups": [{"conditions": [
                 {"conditions": [], "feild": "carrier"}]}]}
        ])
        .to_string();
        let err = ServiceCatalog::from_json_str(&text).unwrap_err();
        assert_eq!(err.path(), "services[0]");
        assert!(err.to_string().contains("feild"));
    }

    #[test]
    fn test_unknown_field_and_kind_are_attributed() {
        let text = json!([
            {"id": "cs-1", "customer_id": "c", "service_id": "s", "service_name": "n",
             "unit_price": 1,
             "rule_groups": [{"conditions": [
                 {"logic_operator": "OR", "conditions": [
                     {"field": "color", "operator": "eq", "values": ["red"]}]}]}]}
        ])
        .to_string();
        let err = ServiceCatalog::from_json_str(&text).unwrap_err();
        assert!(matches!(err, ConfigError::UnknownField { .. }));
        assert_eq!(err.path(), "services[0].rule_groups[0].conditions[0].conditions[0]");

        let text = json!({"services": [
            {"id": "cs-1", "customer_id": "c", "service_id": "s", "service_name": "n",
             "unit_price": 1, "calculations": [{"type": "per_pallet", "value": 1}]}
        ]})
        .to_string();
        let err = ServiceCatalog::from_json_str(&text).unwrap_err();
        assert!(matches!(err, ConfigError::UnknownCalculationKind { .. }));
        assert_eq!(err.path(), "services[0].calculations[0]");
    }

    #[test]
    fn test_select_filters() {
        let catalog = ServiceCatalog::new(vec![
            service(),
            CustomerService::new("cs-2", "c-1", "svc-2", "Storage", dec!(100)),
            CustomerService::new("cs-3", "c-1", "svc-3", "Old", dec!(1)).inactive(),
            CustomerService::new("cs-4", "c-2", "svc-1", "Picking", dec!(2)),
        ])
        .unwrap();

        assert_eq!(catalog.select("c-1", None).len(), 2);
        assert!(catalog.select("c-1", Some(&BTreeSet::new())).is_empty());

        let only: BTreeSet<String> = ["cs-2".to_string()].into_iter().collect();
        let selected = catalog.select("c-1", Some(&only));
        assert_eq!(selected.len(), 1);
        assert_eq!(selected[0].id, "cs-2");

        let unknown: BTreeSet<String> = ["cs-99".to_string()].into_iter().collect();
        assert!(catalog.select("c-1", Some(&unknown)).is_empty());
    }
}
