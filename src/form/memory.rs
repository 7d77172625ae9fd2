use std::collections::HashMap;
use std::sync::RwLock;

use super::FormDocument;
use crate::engine::{FieldHost, FieldSnapshot};
use crate::logic::Value;

#[derive(Default)]
struct Fields {
    by_id: HashMap<String, FieldSnapshot>,
    /// insertion order of ids
    order: Vec<String>,
}

/// in-memory field store, the host used by the CLI
#[derive(Default)]
pub struct MemoryHost {
    fields: RwLock<Fields>,
}

impl MemoryHost {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_document(form: &FormDocument) -> Self {
        let host = Self::new();
        for field in form.fields() {
            host.insert(field.to_snapshot());
        }
        host
    }

    /// add or replace a field
    pub fn insert(&self, field: FieldSnapshot) {
        if let Ok(mut fields) = self.fields.write() {
            if !fields.by_id.contains_key(&field.id) {
                fields.order.push(field.id.clone());
            }
            fields.by_id.insert(field.id.clone(), field);
        }
    }

    /// store a new value; returns false for an unknown field
    pub fn set_value(&self, id: &str, value: Value) -> bool {
        let Ok(mut fields) = self.fields.write() else {
            return false;
        };
        match fields.by_id.get_mut(id) {
            Some(field) => {
                field.value = value;
                true
            }
            None => false,
        }
    }

    /// resolve a field id or a `<scope>.<name>` reference to a field id
    pub fn resolve(&self, reference: &str) -> Option<String> {
        let fields = self.fields.read().ok()?;
        if fields.by_id.contains_key(reference) {
            return Some(reference.to_string());
        }

        fields
            .order
            .iter()
            .filter_map(|id| fields.by_id.get(id))
            .find(|f| {
                reference
                    .strip_prefix(f.parent.as_str())
                    .and_then(|rest| rest.strip_prefix('.'))
                    == Some(f.name.as_str())
            })
            .map(|f| f.id.clone())
    }

    /// field ids in insertion order
    pub fn field_ids(&self) -> Vec<String> {
        self.fields
            .read()
            .map(|f| f.order.clone())
            .unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.fields.read().map(|f| f.order.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl FieldHost for MemoryHost {
    fn read_field(&self, id: &str) -> Option<FieldSnapshot> {
        self.fields.read().ok()?.by_id.get(id).cloned()
    }

    fn read_siblings(&self, scope: &str, excluding: &str) -> HashMap<String, FieldSnapshot> {
        let Ok(fields) = self.fields.read() else {
            return HashMap::new();
        };
        fields
            .by_id
            .values()
            .filter(|f| f.parent == scope && f.id != excluding)
            .map(|f| (f.name.clone(), f.clone()))
            .collect()
    }
}
