//! comparator: one relational test between a field value and a rule operand
//!
//! equality and ordering are loose: operands of different scalar kinds are
//! coerced before comparing, so a `"1"` field value equals a numeric `1`
//! rule value. the coercion table:
//! - null equals only null
//! - booleans become 0/1
//! - strings compared against numbers are parsed as numbers
//! - lists compared against scalars become their comma-joined string form
//! - two lists are never loosely equal

use std::borrow::Cow;

use thiserror::Error;

use super::types::{CompareOp, Value};

/// configuration errors raised while comparing
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CompareError {
    /// the rule names an operator the comparator has no case for
    #[error("unknown comparison operator: '{0}'")]
    UnknownOperator(String),
    /// INCLUDES/EXCLUDES against a value that cannot be searched
    #[error("operator {op} needs a string or list field value, got {kind} {value}")]
    NotSearchable {
        op: CompareOp,
        kind: &'static str,
        value: Value,
    },
}

/// compare `left` (field value) with `right` (rule value) under `operator`
pub fn compare(left: &Value, right: &Value, operator: &str) -> Result<bool, CompareError> {
    let op = CompareOp::parse(operator)
        .ok_or_else(|| CompareError::UnknownOperator(operator.to_string()))?;
    compare_op(left, right, op)
}

/// compare with an already-parsed operator
pub fn compare_op(left: &Value, right: &Value, op: CompareOp) -> Result<bool, CompareError> {
    let result = match op {
        CompareOp::Eq => loose_eq(left, right),
        CompareOp::Ne => !loose_eq(left, right),
        CompareOp::Gt => less_than(right, left) == Some(true),
        CompareOp::Lt => less_than(left, right) == Some(true),
        // NaN on either side makes the inclusive forms false as well
        CompareOp::Gte => less_than(left, right) == Some(false),
        CompareOp::Lte => less_than(right, left) == Some(false),
        CompareOp::In => sequence(right).iter().any(|v| loose_eq(v, left)),
        CompareOp::NotIn => sequence(right).iter().all(|v| !loose_eq(v, left)),
        CompareOp::Includes => {
            for needle in needles(right).iter() {
                if !search(left, needle, op)? {
                    return Ok(false);
                }
            }
            true
        }
        CompareOp::Excludes => {
            for needle in needles(right).iter() {
                if search(left, needle, op)? {
                    return Ok(false);
                }
            }
            true
        }
    };

    Ok(result)
}

// ============================================================================
// Coercion
// ============================================================================

/// a value reduced to a scalar; lists collapse to their joined string form
#[derive(Debug)]
enum Primitive<'a> {
    Null,
    Bool(bool),
    Num(f64),
    Str(Cow<'a, str>),
}

fn to_primitive(value: &Value) -> Primitive<'_> {
    match value {
        Value::Null => Primitive::Null,
        Value::Bool(b) => Primitive::Bool(*b),
        Value::Number(n) => Primitive::Num(*n as f64),
        Value::Float(f) => Primitive::Num(*f),
        Value::String(s) => Primitive::Str(Cow::Borrowed(s)),
        Value::List(l) => Primitive::Str(Cow::Owned(join(l))),
    }
}

fn to_number(p: &Primitive<'_>) -> f64 {
    match p {
        Primitive::Null => 0.0,
        Primitive::Bool(true) => 1.0,
        Primitive::Bool(false) => 0.0,
        Primitive::Num(n) => *n,
        Primitive::Str(s) => string_to_number(s),
    }
}

/// numeric reading of a string; anything that is not a complete number is NaN
fn string_to_number(s: &str) -> f64 {
    let t = s.trim();
    if t.is_empty() {
        return 0.0;
    }

    match t {
        "Infinity" | "+Infinity" => return f64::INFINITY,
        "-Infinity" => return f64::NEG_INFINITY,
        _ => {}
    }

    let prefixes = [("0x", 16), ("0X", 16), ("0o", 8), ("0O", 8), ("0b", 2), ("0B", 2)];
    for (prefix, radix) in prefixes {
        if let Some(digits) = t.strip_prefix(prefix) {
            return u64::from_str_radix(digits, radix)
                .map(|n| n as f64)
                .unwrap_or(f64::NAN);
        }
    }

    // rejects the "inf"/"nan" spellings the float parser would accept
    let decimal = t
        .bytes()
        .all(|b| b.is_ascii_digit() || matches!(b, b'.' | b'e' | b'E' | b'+' | b'-'));
    if !decimal {
        return f64::NAN;
    }

    t.parse::<f64>().unwrap_or(f64::NAN)
}

fn number_to_string(n: f64) -> String {
    if n.is_nan() {
        "NaN".to_string()
    } else if n.is_infinite() {
        let s = if n > 0.0 { "Infinity" } else { "-Infinity" };
        s.to_string()
    } else if n == 0.0 {
        "0".to_string()
    } else {
        format!("{}", n)
    }
}

/// string form of a value as used for substring search and list joining
fn string_of(value: &Value) -> String {
    match value {
        Value::Null => "null".to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::Float(f) => number_to_string(*f),
        Value::String(s) => s.clone(),
        Value::List(l) => join(l),
    }
}

fn join(list: &[Value]) -> String {
    list.iter()
        .map(|v| match v {
            Value::Null => String::new(),
            other => string_of(other),
        })
        .collect::<Vec<_>>()
        .join(",")
}

// ============================================================================
// Equality and ordering
// ============================================================================

fn loose_eq(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::List(_), Value::List(_)) => false,
        _ => primitive_eq(&to_primitive(a), &to_primitive(b)),
    }
}

fn primitive_eq(a: &Primitive<'_>, b: &Primitive<'_>) -> bool {
    match (a, b) {
        (Primitive::Null, Primitive::Null) => true,
        (Primitive::Null, _) | (_, Primitive::Null) => false,
        (Primitive::Str(x), Primitive::Str(y)) => x == y,
        (Primitive::Bool(x), Primitive::Bool(y)) => x == y,
        // remaining mixes of number, string and bool compare numerically
        _ => to_number(a) == to_number(b),
    }
}

/// strict equality, used when searching inside a list
fn strict_eq(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Null, Value::Null) => true,
        (Value::Bool(x), Value::Bool(y)) => x == y,
        (Value::String(x), Value::String(y)) => x == y,
        (Value::List(_), Value::List(_)) => false,
        _ => match (a.as_f64(), b.as_f64()) {
            (Some(x), Some(y)) => x == y,
            _ => false,
        },
    }
}

/// `a < b`; `None` when the comparison is undefined (a NaN operand)
fn less_than(a: &Value, b: &Value) -> Option<bool> {
    let (pa, pb) = (to_primitive(a), to_primitive(b));

    if let (Primitive::Str(x), Primitive::Str(y)) = (&pa, &pb) {
        return Some(x.encode_utf16().lt(y.encode_utf16()));
    }

    let (x, y) = (to_number(&pa), to_number(&pb));
    if x.is_nan() || y.is_nan() {
        None
    } else {
        Some(x < y)
    }
}

// ============================================================================
// Sequences
// ============================================================================

/// operand of IN / NOT IN viewed as a sequence
fn sequence(value: &Value) -> Cow<'_, [Value]> {
    match value {
        Value::List(l) => Cow::Borrowed(l.as_slice()),
        Value::String(s) => Cow::Owned(s.chars().map(|c| Value::String(c.to_string())).collect()),
        _ => Cow::Borrowed(&[]),
    }
}

/// operand of INCLUDES / EXCLUDES; a scalar becomes a one-element sequence
fn needles(value: &Value) -> Cow<'_, [Value]> {
    match value {
        Value::List(l) => Cow::Borrowed(l.as_slice()),
        other => Cow::Owned(vec![other.clone()]),
    }
}

fn search(haystack: &Value, needle: &Value, op: CompareOp) -> Result<bool, CompareError> {
    match haystack {
        Value::String(s) => Ok(s.contains(string_of(needle).as_str())),
        Value::List(l) => Ok(l.iter().any(|v| strict_eq(v, needle))),
        other => Err(CompareError::NotSearchable {
            op,
            kind: other.kind(),
            value: other.clone(),
        }),
    }
}
