//! conditional-logic evaluation for field visibility
//!
//! a field's conditional logic is a relation (AND / OR) over an ordered list of
//! rules, each comparing a sibling field's current value against an operand:
//! - comparison operators: =, !=, >, <, >=, <= (loose coercion)
//! - set operators: IN, NOT IN
//! - search operators: INCLUDES, EXCLUDES
//!
//! nothing here knows how fields are stored; callers supply sibling values
//! through [`SiblingValues`].

mod compare;
mod deps;
mod eval;
mod parser;
mod types;

pub use compare::{compare, compare_op, CompareError};
pub use deps::{dependencies_of, depends_on};
pub use eval::{
    combine, evaluate, evaluate_lenient, EvalError, RuleError, RuleErrorKind, SiblingValues,
};
pub use parser::{
    parse_conditional_logic, parse_value, suggest, verify_logic, ParseError, Problem, Severity,
};
pub use types::{CompareOp, ConditionalLogic, Relation, Rule, Value};
