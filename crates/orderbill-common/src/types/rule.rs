//! Rule conditions and rule groups
//!
//! A rule condition compares one order field against one or more values.
//! Rule groups combine conditions (and nested groups) with AND/OR logic.
//! Operator aliases are folded into one canonical variant when parsing, so
//! evaluators never see `neq` or `not_contains`.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::order::FieldName;

/// Comparison operator of a rule condition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Operator {
    Eq,
    Ne,
    Gt,
    Lt,
    Ge,
    Le,
    Between,
    In,
    NotIn,
    Contains,
    NotContains,
    StartsWith,
    EndsWith,
}

impl Operator {
    /// Canonical wire name
    pub fn as_str(&self) -> &'static str {
        match self {
            Operator::Eq => "eq",
            Operator::Ne => "ne",
            Operator::Gt => "gt",
            Operator::Lt => "lt",
            Operator::Ge => "ge",
            Operator::Le => "le",
            Operator::Between => "between",
            Operator::In => "in",
            Operator::NotIn => "ni",
            Operator::Contains => "contains",
            Operator::NotContains => "ncontains",
            Operator::StartsWith => "startswith",
            Operator::EndsWith => "endswith",
        }
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when an operator name is not recognised
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown operator: {0}")]
pub struct UnknownOperator(pub String);

impl FromStr for Operator {
    type Err = UnknownOperator;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let op = match s.trim().to_ascii_lowercase().as_str() {
            "eq" | "==" => Operator::Eq,
            "ne" | "neq" | "!=" => Operator::Ne,
            "gt" | ">" => Operator::Gt,
            "lt" | "<" => Operator::Lt,
            "ge" | "gte" | ">=" => Operator::Ge,
            "le" | "lte" | "<=" => Operator::Le,
            "between" => Operator::Between,
            "in" => Operator::In,
            "ni" | "not_in" => Operator::NotIn,
            "contains" => Operator::Contains,
            "ncontains" | "not_contains" => Operator::NotContains,
            "startswith" => Operator::StartsWith,
            "endswith" => Operator::EndsWith,
            _ => return Err(UnknownOperator(s.to_string())),
        };
        Ok(op)
    }
}

impl TryFrom<String> for Operator {
    type Error = UnknownOperator;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Operator> for String {
    fn from(op: Operator) -> Self {
        op.as_str().to_string()
    }
}

/// A single field/operator/values test
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RuleCondition {
    pub field: FieldName,
    pub operator: Operator,
    /// OR-list for `in`, `ni`, `contains`, `ncontains`, `startswith`,
    /// `endswith`; comparison operators use the first value
    pub values: Vec<String>,
}

impl RuleCondition {
    pub fn new<I, S>(field: FieldName, operator: Operator, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            field,
            operator,
            values: values.into_iter().map(Into::into).collect(),
        }
    }
}

/// How the children of a rule group combine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum LogicOperator {
    #[default]
    #[serde(alias = "and")]
    And,
    #[serde(alias = "or")]
    Or,
}

/// A child of a rule group: a condition or a nested group
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum RuleNode {
    Condition(RuleCondition),
    Group(RuleGroup),
}

// Objects carrying a `field` key are conditions, everything else is a group.
impl<'de> Deserialize<'de> for RuleNode {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        use serde::de::Error;

        let value = serde_json::Value::deserialize(deserializer)?;
        if value.get("field").is_some() {
            serde_json::from_value(value)
                .map(RuleNode::Condition)
                .map_err(D::Error::custom)
        } else {
            serde_json::from_value(value)
                .map(RuleNode::Group)
                .map_err(D::Error::custom)
        }
    }
}

impl From<RuleCondition> for RuleNode {
    fn from(condition: RuleCondition) -> Self {
        RuleNode::Condition(condition)
    }
}

impl From<RuleGroup> for RuleNode {
    fn from(group: RuleGroup) -> Self {
        RuleNode::Group(group)
    }
}

/// AND/OR combination of conditions and nested groups.
///
/// An empty AND group matches every order; an empty OR group matches none.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RuleGroup {
    #[serde(default)]
    pub logic_operator: LogicOperator,
    #[serde(default)]
    pub conditions: Vec<RuleNode>,
}

impl RuleGroup {
    pub fn all(conditions: Vec<RuleNode>) -> Self {
        Self {
            logic_operator: LogicOperator::And,
            conditions,
        }
    }

    pub fn any(conditions: Vec<RuleNode>) -> Self {
        Self {
            logic_operator: LogicOperator::Or,
            conditions,
        }
    }

    /// Iterate over every leaf condition, depth first
    pub fn leaf_conditions(&self) -> Vec<&RuleCondition> {
        let mut leaves = Vec::new();
        for node in &self.conditions {
            match node {
                RuleNode::Condition(c) => leaves.push(c),
                RuleNode::Group(g) => leaves.extend(g.leaf_conditions()),
            }
        }
        leaves
    }
}
