//! rule evaluator
//!
//! evaluates conditional logic against the current values of a field's
//! siblings. every rule is evaluated in order, errors included,
//! before the results are combined; there is no short-circuiting.

use std::collections::HashMap;
use std::fmt;

use thiserror::Error;

use super::compare::{compare, CompareError};
use super::types::{ConditionalLogic, Relation, Value};

/// read access to sibling values by short name
pub trait SiblingValues {
    fn value_of(&self, name: &str) -> Option<&Value>;
}

impl SiblingValues for HashMap<String, Value> {
    fn value_of(&self, name: &str) -> Option<&Value> {
        self.get(name)
    }
}

/// why a single rule could not be evaluated
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RuleErrorKind {
    /// the rule references a field that is not a sibling
    #[error("field '{0}' is not a sibling in this scope")]
    UnresolvedField(String),
    #[error(transparent)]
    Compare(#[from] CompareError),
}

/// a configuration error in one rule
#[derive(Debug, Clone, PartialEq, Error)]
#[error("rules[{index}] ({field}): {kind}")]
pub struct RuleError {
    /// position of the rule in the rule list
    pub index: usize,
    /// the rule's field reference
    pub field: String,
    pub kind: RuleErrorKind,
}

/// every rule error from one evaluation
#[derive(Debug, Clone, PartialEq)]
pub struct EvalError {
    pub errors: Vec<RuleError>,
}

impl fmt::Display for EvalError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} rule(s) could not be evaluated", self.errors.len())?;
        for e in &self.errors {
            write!(f, "; {}", e)?;
        }
        Ok(())
    }
}

impl std::error::Error for EvalError {}

/// evaluate conditional logic; any rule error fails the whole evaluation
///
/// an empty rule list is `true` under AND (vacuous truth) and `false` under OR.
pub fn evaluate(logic: &ConditionalLogic, siblings: &impl SiblingValues) -> Result<bool, EvalError> {
    let mut results = Vec::with_capacity(logic.rules.len());
    let mut errors = Vec::new();

    for outcome in rule_results(logic, siblings) {
        match outcome {
            Ok(r) => results.push(r),
            Err(e) => errors.push(e),
        }
    }

    if !errors.is_empty() {
        return Err(EvalError { errors });
    }

    Ok(combine(logic.relation, &results))
}

/// evaluate conditional logic, letting each failing rule contribute `false`
///
/// returns the verdict together with the rule errors that were folded in.
pub fn evaluate_lenient(
    logic: &ConditionalLogic,
    siblings: &impl SiblingValues,
) -> (bool, Vec<RuleError>) {
    let mut results = Vec::with_capacity(logic.rules.len());
    let mut errors = Vec::new();

    for outcome in rule_results(logic, siblings) {
        match outcome {
            Ok(r) => results.push(r),
            Err(e) => {
                results.push(false);
                errors.push(e);
            }
        }
    }

    (combine(logic.relation, &results), errors)
}

/// fold rule results with the relation
pub fn combine(relation: Relation, results: &[bool]) -> bool {
    match relation {
        Relation::And => results.iter().all(|r| *r),
        Relation::Or => results.iter().any(|r| *r),
    }
}

fn rule_results(
    logic: &ConditionalLogic,
    siblings: &impl SiblingValues,
) -> Vec<Result<bool, RuleError>> {
    logic
        .rules
        .iter()
        .enumerate()
        .map(|(index, rule)| {
            let fail = |kind| RuleError {
                index,
                field: rule.field.clone(),
                kind,
            };

            let value = siblings
                .value_of(&rule.field)
                .ok_or_else(|| fail(RuleErrorKind::UnresolvedField(rule.field.clone())))?;

            compare(value, &rule.value, &rule.compare).map_err(|e| fail(e.into()))
        })
        .collect()
}
