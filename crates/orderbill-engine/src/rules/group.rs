//! Rule group evaluation

use orderbill_common::{CustomerService, LogicOperator, Order, RuleGroup, RuleNode};

use super::condition::evaluate_condition;

/// Evaluate a rule group recursively.
///
/// An AND group with no children matches; an OR group with no children
/// does not.
pub fn evaluate_group(order: &Order, group: &RuleGroup) -> bool {
    let mut results = group.conditions.iter().map(|node| evaluate_node(order, node));
    match group.logic_operator {
        LogicOperator::And => results.all(|matched| matched),
        LogicOperator::Or => results.any(|matched| matched),
    }
}

fn evaluate_node(order: &Order, node: &RuleNode) -> bool {
    match node {
        RuleNode::Condition(condition) => evaluate_condition(order, condition),
        RuleNode::Group(group) => evaluate_group(order, group),
    }
}

/// Whether a customer-service applies to an order: every rule group must
/// match, and a service without rule groups applies to every order
pub fn service_applies(order: &Order, service: &CustomerService) -> bool {
    service
        .rule_groups
        .iter()
        .all(|group| evaluate_group(order, group))
}
