//! dependency resolution: which siblings a field's conditional logic reads

use std::collections::BTreeSet;

use super::types::ConditionalLogic;

/// the distinct sibling short names referenced by the rules
pub fn dependencies_of(logic: &ConditionalLogic) -> BTreeSet<String> {
    logic.rules.iter().map(|r| r.field.clone()).collect()
}

/// check whether any rule reads the given sibling
pub fn depends_on(logic: &ConditionalLogic, name: &str) -> bool {
    logic.rules.iter().any(|r| r.field == name)
}
