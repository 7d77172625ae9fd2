//! core types for conditional logic

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

/// comparison operators a rule can use
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CompareOp {
    /// loose equality: =
    Eq,
    /// loose inequality: !=
    Ne,
    /// greater than: >
    Gt,
    /// less than: <
    Lt,
    /// greater than or equal: >=
    Gte,
    /// less than or equal: <=
    Lte,
    /// field value is one of the rule values: IN
    In,
    /// field value is none of the rule values: NOT IN
    NotIn,
    /// every rule value is found within the field value: INCLUDES
    Includes,
    /// no rule value is found within the field value: EXCLUDES
    Excludes,
}

impl CompareOp {
    /// parse operator exactly as authored in a field definition
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "=" => Some(CompareOp::Eq),
            "!=" => Some(CompareOp::Ne),
            ">" => Some(CompareOp::Gt),
            "<" => Some(CompareOp::Lt),
            ">=" => Some(CompareOp::Gte),
            "<=" => Some(CompareOp::Lte),
            "IN" => Some(CompareOp::In),
            "NOT IN" => Some(CompareOp::NotIn),
            "INCLUDES" => Some(CompareOp::Includes),
            "EXCLUDES" => Some(CompareOp::Excludes),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            CompareOp::Eq => "=",
            CompareOp::Ne => "!=",
            CompareOp::Gt => ">",
            CompareOp::Lt => "<",
            CompareOp::Gte => ">=",
            CompareOp::Lte => "<=",
            CompareOp::In => "IN",
            CompareOp::NotIn => "NOT IN",
            CompareOp::Includes => "INCLUDES",
            CompareOp::Excludes => "EXCLUDES",
        }
    }

    /// every supported operator, in documentation order
    pub fn all() -> &'static [CompareOp] {
        &[
            CompareOp::Eq,
            CompareOp::Ne,
            CompareOp::Gt,
            CompareOp::Lt,
            CompareOp::Gte,
            CompareOp::Lte,
            CompareOp::In,
            CompareOp::NotIn,
            CompareOp::Includes,
            CompareOp::Excludes,
        ]
    }
}

impl fmt::Display for CompareOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// how rule results are folded into one verdict
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Relation {
    #[default]
    #[serde(rename = "AND", alias = "and")]
    And,
    #[serde(rename = "OR", alias = "or")]
    Or,
}

impl Relation {
    /// parse relation, case-insensitive
    pub fn parse(s: &str) -> Option<Self> {
        if s.eq_ignore_ascii_case("and") {
            Some(Relation::And)
        } else if s.eq_ignore_ascii_case("or") {
            Some(Relation::Or)
        } else {
            None
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Relation::And => "AND",
            Relation::Or => "OR",
        }
    }
}

impl fmt::Display for Relation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// a field value or rule operand
///
/// values are opaque to the engine and only ever inspected through the
/// comparator, which applies loose coercion between the scalar kinds.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    /// empty value (JSON null)
    #[default]
    Null,
    /// boolean value
    Bool(bool),
    /// integer value
    Number(i64),
    /// floating point value
    Float(f64),
    /// string value
    String(String),
    /// list of values (multi-select fields, IN operands)
    List(Vec<Value>),
}

impl Value {
    /// try to get as string
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// try to get as float
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n as f64),
            Value::Float(f) => Some(*f),
            _ => None,
        }
    }

    /// try to get as list
    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(l) => Some(l),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// short name of the value kind, used in error messages
    pub fn kind(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Number(_) | Value::Float(_) => "number",
            Value::String(_) => "string",
            Value::List(_) => "list",
        }
    }

    /// convert from a JSON value; objects have no comparable form
    pub fn from_json(json: &JsonValue) -> Option<Value> {
        match json {
            JsonValue::Null => Some(Value::Null),
            JsonValue::Bool(b) => Some(Value::Bool(*b)),
            JsonValue::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Some(Value::Number(i))
                } else {
                    n.as_f64().map(Value::Float)
                }
            }
            JsonValue::String(s) => Some(Value::String(s.clone())),
            JsonValue::Array(arr) => arr
                .iter()
                .map(Value::from_json)
                .collect::<Option<Vec<_>>>()
                .map(Value::List),
            JsonValue::Object(_) => None,
        }
    }

    pub fn to_json(&self) -> JsonValue {
        match self {
            Value::Null => JsonValue::Null,
            Value::Bool(b) => JsonValue::Bool(*b),
            Value::Number(n) => JsonValue::from(*n),
            Value::Float(f) => serde_json::Number::from_f64(*f)
                .map(JsonValue::Number)
                .unwrap_or(JsonValue::Null),
            Value::String(s) => JsonValue::String(s.clone()),
            Value::List(l) => JsonValue::Array(l.iter().map(Value::to_json).collect()),
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Number(n)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Number(n as i64)
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::Float(f)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<Vec<Value>> for Value {
    fn from(l: Vec<Value>) -> Self {
        Value::List(l)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "null"),
            Value::String(s) => write!(f, "\"{}\"", s),
            Value::Number(n) => write!(f, "{}", n),
            Value::Float(n) => write!(f, "{}", n),
            Value::Bool(b) => write!(f, "{}", b),
            Value::List(l) => {
                write!(f, "[")?;
                for (i, v) in l.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", v)?;
                }
                write!(f, "]")
            }
        }
    }
}

fn default_compare() -> String {
    CompareOp::Eq.as_str().to_string()
}

/// a single `(field, value, compare)` test against a sibling field
///
/// `compare` is kept as authored so that an unknown operator surfaces as a
/// configuration error at evaluation time instead of being dropped on load.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rule {
    /// short name of the sibling field
    pub field: String,
    /// comparison operand
    #[serde(default)]
    pub value: Value,
    /// comparison operator
    #[serde(default = "default_compare")]
    pub compare: String,
}

impl Rule {
    pub fn new(field: impl Into<String>, compare: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            field: field.into(),
            value: value.into(),
            compare: compare.into(),
        }
    }

    /// create an equality rule
    pub fn eq(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::new(field, CompareOp::Eq.as_str(), value)
    }

    /// the parsed operator, if it is a known one
    pub fn op(&self) -> Option<CompareOp> {
        CompareOp::parse(&self.compare)
    }
}

impl fmt::Display for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.field, self.compare, self.value)
    }
}

/// the `(relation, rules)` pair controlling a field's visibility
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ConditionalLogic {
    #[serde(default)]
    pub relation: Relation,
    #[serde(default)]
    pub rules: Vec<Rule>,
}

impl ConditionalLogic {
    pub fn new(relation: Relation, rules: Vec<Rule>) -> Self {
        Self { relation, rules }
    }

    /// all rules must pass
    pub fn all(rules: Vec<Rule>) -> Self {
        Self::new(Relation::And, rules)
    }

    /// at least one rule must pass
    pub fn any(rules: Vec<Rule>) -> Self {
        Self::new(Relation::Or, rules)
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

impl fmt::Display for ConditionalLogic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self.relation {
            Relation::And => "all",
            Relation::Or => "any",
        };
        write!(f, "{}(", name)?;
        for (i, rule) in self.rules.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", rule)?;
        }
        write!(f, ")")
    }
}
