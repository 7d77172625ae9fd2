//! conditional-logic parser - converts JSON field definitions to rules
//!
//! accepts:
//! - `{ "relation": "AND" | "OR", "rules": [ { "field", "value", "compare" } ] }`
//! - a bare array of rules (shorthand for relation AND)
//! - `null` or `{}` for a field without conditional logic
//!
//! `relation` defaults to AND, `compare` to `=`, `value` to `""`.

use serde::Serialize;
use serde_json::Value as JsonValue;
use strsim::levenshtein;

use super::types::{CompareOp, ConditionalLogic, Relation, Rule, Value};

/// largest edit distance still offered as a suggestion
const SUGGESTION_DISTANCE: usize = 2;

const RULE_KEYS: &[&str] = &["field", "value", "compare"];
const LOGIC_KEYS: &[&str] = &["relation", "rules"];

/// error type for parsing conditional logic
#[derive(Debug, Clone, PartialEq)]
pub struct ParseError {
    pub message: String,
    pub path: String,
    pub suggestions: Vec<String>,
}

impl ParseError {
    pub fn new(message: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            path: path.into(),
            suggestions: Vec::new(),
        }
    }

    pub fn with_suggestions(mut self, suggestions: Vec<String>) -> Self {
        self.suggestions = suggestions;
        self
    }

    /// prefix the path, used when the logic is nested in a larger document
    pub fn within(mut self, prefix: &str) -> Self {
        self.path = join_path(prefix, &self.path);
        self
    }
}

impl std::fmt::Display for ParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.path.is_empty() {
            write!(f, "{}", self.message)?;
        } else {
            write!(f, "{}: {}", self.path, self.message)?;
        }
        if !self.suggestions.is_empty() {
            write!(f, " (did you mean {}?)", quote_list(&self.suggestions))?;
        }
        Ok(())
    }
}

impl std::error::Error for ParseError {}

/// parse a JSON value into conditional logic; `None` means the field is inert
pub fn parse_conditional_logic(json: &JsonValue) -> Result<Option<ConditionalLogic>, ParseError> {
    match json {
        JsonValue::Null => Ok(None),
        JsonValue::Object(obj) if obj.is_empty() => Ok(None),
        JsonValue::Object(obj) => parse_object(obj).map(Some),
        JsonValue::Array(arr) => {
            let rules = parse_rules(arr, "")?;
            Ok(Some(ConditionalLogic::all(rules)))
        }
        _ => Err(ParseError::new(
            format!("expected object or array, got {}", json_kind(json)),
            "",
        )),
    }
}

fn parse_object(obj: &serde_json::Map<String, JsonValue>) -> Result<ConditionalLogic, ParseError> {
    check_keys(obj, LOGIC_KEYS, "")?;

    let relation = match obj.get("relation") {
        None | Some(JsonValue::Null) => Relation::default(),
        Some(JsonValue::String(s)) => Relation::parse(s).ok_or_else(|| {
            ParseError::new(
                format!("unknown relation '{}': use AND or OR", s),
                "relation",
            )
        })?,
        Some(other) => {
            return Err(ParseError::new(
                format!("'relation' must be a string, got {}", json_kind(other)),
                "relation",
            ))
        }
    };

    let rules = match obj.get("rules") {
        None | Some(JsonValue::Null) => Vec::new(),
        Some(JsonValue::Array(arr)) => parse_rules(arr, "rules")?,
        Some(other) => {
            return Err(ParseError::new(
                format!("'rules' must be an array, got {}", json_kind(other)),
                "rules",
            ))
        }
    };

    Ok(ConditionalLogic::new(relation, rules))
}

fn parse_rules(arr: &[JsonValue], path: &str) -> Result<Vec<Rule>, ParseError> {
    arr.iter()
        .enumerate()
        .map(|(i, v)| parse_rule(v, &format!("{}[{}]", path, i)))
        .collect()
}

fn parse_rule(json: &JsonValue, path: &str) -> Result<Rule, ParseError> {
    let obj = json.as_object().ok_or_else(|| {
        ParseError::new(format!("rule must be an object, got {}", json_kind(json)), path)
    })?;

    check_keys(obj, RULE_KEYS, path)?;

    let field = match obj.get("field") {
        Some(JsonValue::String(s)) if !s.is_empty() => s.clone(),
        Some(JsonValue::String(_)) => {
            return Err(ParseError::new("'field' cannot be empty", join_path(path, "field")))
        }
        Some(other) => {
            return Err(ParseError::new(
                format!("'field' must be a string, got {}", json_kind(other)),
                join_path(path, "field"),
            ))
        }
        None => return Err(ParseError::new("rule requires a 'field'", path)),
    };

    let value = match obj.get("value") {
        None => Value::String(String::new()),
        Some(v) => parse_value(v, &join_path(path, "value"))?,
    };

    let compare = match obj.get("compare") {
        None | Some(JsonValue::Null) => CompareOp::Eq.as_str().to_string(),
        Some(JsonValue::String(s)) => s.clone(),
        Some(other) => {
            return Err(ParseError::new(
                format!("'compare' must be a string, got {}", json_kind(other)),
                join_path(path, "compare"),
            ))
        }
    };

    Ok(Rule {
        field,
        value,
        compare,
    })
}

/// parse a rule operand or field value
pub fn parse_value(json: &JsonValue, path: &str) -> Result<Value, ParseError> {
    Value::from_json(json)
        .ok_or_else(|| ParseError::new("nested objects not supported as values", path))
}

fn check_keys(
    obj: &serde_json::Map<String, JsonValue>,
    allowed: &[&str],
    path: &str,
) -> Result<(), ParseError> {
    for key in obj.keys() {
        if !allowed.contains(&key.as_str()) {
            let candidates: Vec<String> = allowed.iter().map(|s| s.to_string()).collect();
            return Err(
                ParseError::new(format!("unknown key '{}'", key), join_path(path, key))
                    .with_suggestions(suggest(key, &candidates)),
            );
        }
    }
    Ok(())
}

// ============================================================================
// Static verification
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// evaluation will fail or produce a configuration error
    Error,
    /// evaluation succeeds but likely not as intended
    Warning,
}

/// a problem found by static verification of one field's logic
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Problem {
    pub severity: Severity,
    pub path: String,
    pub message: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub suggestions: Vec<String>,
}

impl Problem {
    fn error(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Error,
            path: path.into(),
            message: message.into(),
            suggestions: Vec::new(),
        }
    }

    fn warning(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Warning,
            ..Self::error(path, message)
        }
    }

    fn suggesting(mut self, suggestions: Vec<String>) -> Self {
        self.suggestions = suggestions;
        self
    }

    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }
}

impl std::fmt::Display for Problem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self.severity {
            Severity::Error => "error",
            Severity::Warning => "warning",
        };
        write!(f, "{}: {}: {}", label, self.path, self.message)?;
        if !self.suggestions.is_empty() {
            write!(f, " (did you mean {}?)", quote_list(&self.suggestions))?;
        }
        Ok(())
    }
}

/// check a field's logic against the names of its siblings
///
/// `owner` is the short name of the field carrying the logic; it is never part
/// of its own sibling set.
pub fn verify_logic(logic: &ConditionalLogic, owner: &str, siblings: &[String]) -> Vec<Problem> {
    let mut problems = Vec::new();

    if logic.rules.is_empty() {
        let outcome = match logic.relation {
            Relation::And => "always visible",
            Relation::Or => "always hidden",
        };
        problems.push(Problem::warning(
            "rules",
            format!("no rules; relation {} makes the field {}", logic.relation, outcome),
        ));
    }

    for (i, rule) in logic.rules.iter().enumerate() {
        let path = format!("rules[{}]", i);

        match rule.op() {
            Some(CompareOp::In) | Some(CompareOp::NotIn) if rule.value.as_list().is_none() => {
                problems.push(Problem::warning(
                    join_path(&path, "value"),
                    format!(
                        "operator {} expects a list; a {} operand is not matched element-wise",
                        rule.compare,
                        rule.value.kind()
                    ),
                ));
            }
            Some(_) => {}
            None => {
                let candidates: Vec<String> =
                    CompareOp::all().iter().map(|op| op.as_str().to_string()).collect();
                problems.push(
                    Problem::error(
                        join_path(&path, "compare"),
                        format!("unknown comparison operator '{}'", rule.compare),
                    )
                    .suggesting(suggest_operator(&rule.compare, &candidates)),
                );
            }
        }

        if rule.field == owner {
            problems.push(Problem::error(
                join_path(&path, "field"),
                format!("field '{}' cannot depend on itself", owner),
            ));
        } else if !siblings.iter().any(|s| s == &rule.field) {
            problems.push(
                Problem::error(
                    join_path(&path, "field"),
                    format!("field '{}' is not a sibling in this scope", rule.field),
                )
                .suggesting(suggest(&rule.field, siblings)),
            );
        }
    }

    problems
}

// ============================================================================
// Helpers
// ============================================================================

/// candidates within a small edit distance of `name`, closest first
pub fn suggest(name: &str, candidates: &[String]) -> Vec<String> {
    let name_lower = name.to_lowercase();
    let mut scored: Vec<(usize, &String)> = candidates
        .iter()
        .map(|c| (levenshtein(&name_lower, &c.to_lowercase()), c))
        .filter(|(d, _)| *d <= SUGGESTION_DISTANCE)
        .collect();

    scored.sort_by(|a, b| a.0.cmp(&b.0).then_with(|| a.1.cmp(b.1)));
    scored.into_iter().map(|(_, c)| c.clone()).collect()
}

fn suggest_operator(op: &str, candidates: &[String]) -> Vec<String> {
    // the common mistakes are case ("in") and doubled equals ("==")
    let normalized = op.trim().to_uppercase();
    let normalized = match normalized.as_str() {
        "==" | "===" => "=".to_string(),
        "!==" | "<>" => "!=".to_string(),
        _ => normalized,
    };
    if candidates.contains(&normalized) {
        return vec![normalized];
    }
    suggest(op, candidates)
}

fn join_path(prefix: &str, key: &str) -> String {
    if prefix.is_empty() {
        key.to_string()
    } else if key.is_empty() {
        prefix.to_string()
    } else if key.starts_with('[') {
        format!("{}{}", prefix, key)
    } else {
        format!("{}.{}", prefix, key)
    }
}

fn json_kind(json: &JsonValue) -> &'static str {
    match json {
        JsonValue::Null => "null",
        JsonValue::Bool(_) => "bool",
        JsonValue::Number(_) => "number",
        JsonValue::String(_) => "string",
        JsonValue::Array(_) => "array",
        JsonValue::Object(_) => "object",
    }
}

fn quote_list(items: &[String]) -> String {
    items
        .iter()
        .map(|s| format!("'{}'", s))
        .collect::<Vec<_>>()
        .join(" or ")
}
