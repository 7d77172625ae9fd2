//! form documents
//!
//! a form is a list of containers, each holding fields. JSON5 is accepted so
//! hand-written forms can carry comments and trailing commas:
//!
//! ```json5
//! {
//!   containers: [
//!     {
//!       id: "shipping",
//!       fields: [
//!         { name: "method", value: "pickup" },
//!         {
//!           name: "address",
//!           conditional_logic: {
//!             relation: "AND",
//!             rules: [{ field: "method", compare: "=", value: "delivery" }],
//!           },
//!         },
//!       ],
//!     },
//!   ],
//! }
//! ```

mod memory;

pub use memory::MemoryHost;

use std::collections::HashSet;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use thiserror::Error;

use crate::engine::FieldSnapshot;
use crate::logic::{parse_conditional_logic, parse_value, verify_logic, ConditionalLogic, ParseError, Problem, Value};

#[derive(Debug, Error)]
pub enum FormError {
    #[error("failed to read form {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid form document: {0}")]
    Syntax(String),
    #[error("{0}")]
    Invalid(#[from] ParseError),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FormField {
    pub id: String,
    pub name: String,
    pub container: String,
    pub value: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub conditional_logic: Option<ConditionalLogic>,
}

impl FormField {
    pub fn to_snapshot(&self) -> FieldSnapshot {
        FieldSnapshot {
            id: self.id.clone(),
            name: self.name.clone(),
            parent: self.container.clone(),
            value: self.value.clone(),
            conditional_logic: self.conditional_logic.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FormContainer {
    pub id: String,
    pub fields: Vec<FormField>,
}

impl FormContainer {
    pub fn field_ids(&self) -> Vec<String> {
        self.fields.iter().map(|f| f.id.clone()).collect()
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct FormDocument {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    pub containers: Vec<FormContainer>,
}

/// a verification problem attributed to a field
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldProblem {
    pub field_id: String,
    #[serde(flatten)]
    pub problem: Problem,
}

impl fmt::Display for FieldProblem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field_id, self.problem)
    }
}

// raw document shape, before validation
#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct RawForm {
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    containers: Vec<RawContainer>,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct RawContainer {
    id: String,
    #[serde(default)]
    fields: Vec<RawField>,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct RawField {
    #[serde(default)]
    id: Option<String>,
    name: String,
    #[serde(default)]
    value: Option<JsonValue>,
    #[serde(default)]
    conditional_logic: Option<JsonValue>,
}

impl FormDocument {
    pub fn load(path: &Path) -> Result<Self, FormError> {
        let content = fs::read_to_string(path).map_err(|source| FormError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> Result<Self, FormError> {
        let raw: RawForm =
            json5::from_str(content).map_err(|e| FormError::Syntax(e.to_string()))?;

        let mut container_ids = HashSet::new();
        let mut field_ids = HashSet::new();
        let mut containers = Vec::with_capacity(raw.containers.len());

        for (ci, raw_container) in raw.containers.into_iter().enumerate() {
            let cpath = format!("containers[{}]", ci);

            if raw_container.id.is_empty() {
                return Err(ParseError::new("container id cannot be empty", format!("{}.id", cpath)).into());
            }
            if !container_ids.insert(raw_container.id.clone()) {
                return Err(ParseError::new(
                    format!("duplicate container id '{}'", raw_container.id),
                    format!("{}.id", cpath),
                )
                .into());
            }

            let mut names = HashSet::new();
            let mut fields = Vec::with_capacity(raw_container.fields.len());

            for (fi, raw_field) in raw_container.fields.into_iter().enumerate() {
                let fpath = format!("{}.fields[{}]", cpath, fi);
                let field = convert_field(raw_field, &raw_container.id, &fpath)?;

                if !names.insert(field.name.clone()) {
                    return Err(ParseError::new(
                        format!("duplicate field name '{}' in container '{}'", field.name, raw_container.id),
                        format!("{}.name", fpath),
                    )
                    .into());
                }
                if !field_ids.insert(field.id.clone()) {
                    return Err(ParseError::new(
                        format!("duplicate field id '{}'", field.id),
                        format!("{}.id", fpath),
                    )
                    .into());
                }

                fields.push(field);
            }

            containers.push(FormContainer {
                id: raw_container.id,
                fields,
            });
        }

        Ok(Self {
            title: raw.title,
            containers,
        })
    }

    /// every field, in document order
    pub fn fields(&self) -> impl Iterator<Item = &FormField> {
        self.containers.iter().flat_map(|c| c.fields.iter())
    }

    pub fn field(&self, id: &str) -> Option<&FormField> {
        self.fields().find(|f| f.id == id)
    }

    pub fn field_count(&self) -> usize {
        self.containers.iter().map(|c| c.fields.len()).sum()
    }

    /// statically check every field's conditional logic against its siblings
    pub fn verify(&self) -> Vec<FieldProblem> {
        let mut problems = Vec::new();

        for container in &self.containers {
            for field in &container.fields {
                let Some(logic) = &field.conditional_logic else {
                    continue;
                };
                let siblings: Vec<String> = container
                    .fields
                    .iter()
                    .filter(|f| f.id != field.id)
                    .map(|f| f.name.clone())
                    .collect();

                problems.extend(
                    verify_logic(logic, &field.name, &siblings)
                        .into_iter()
                        .map(|problem| FieldProblem {
                            field_id: field.id.clone(),
                            problem,
                        }),
                );
            }
        }

        problems
    }
}

fn convert_field(raw: RawField, container: &str, path: &str) -> Result<FormField, ParseError> {
    if raw.name.is_empty() {
        return Err(ParseError::new("field name cannot be empty", format!("{}.name", path)));
    }

    let id = match raw.id {
        Some(id) if id.is_empty() => {
            return Err(ParseError::new("field id cannot be empty", format!("{}.id", path)))
        }
        Some(id) => id,
        None => format!("{}.{}", container, raw.name),
    };

    let value = match &raw.value {
        Some(v) => parse_value(v, &format!("{}.value", path))?,
        None => Value::Null,
    };

    let conditional_logic = match &raw.conditional_logic {
        Some(json) => parse_conditional_logic(json)
            .map_err(|e| e.within(&format!("{}.conditional_logic", path)))?,
        None => None,
    };

    Ok(FormField {
        id,
        name: raw.name,
        container: container.to_string(),
        value,
        conditional_logic,
    })
}
