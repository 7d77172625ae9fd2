//! container registry
//!
//! tracks which fields were set up as part of which container, so that
//! removing a container can tear all of them down together.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ContainerRegistration {
    pub id: String,
    pub created_at: DateTime<Utc>,
    pub field_ids: Vec<String>,
}

#[derive(Debug, Default)]
pub struct ContainerRegistry {
    containers: HashMap<String, ContainerRegistration>,
}

impl ContainerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// record a container; returns the registration it replaces, if any
    pub fn register(
        &mut self,
        id: impl Into<String>,
        field_ids: Vec<String>,
    ) -> Option<ContainerRegistration> {
        let id = id.into();
        let registration = ContainerRegistration {
            id: id.clone(),
            created_at: Utc::now(),
            field_ids,
        };
        self.containers.insert(id, registration)
    }

    pub fn remove(&mut self, id: &str) -> Option<ContainerRegistration> {
        self.containers.remove(id)
    }

    pub fn get(&self, id: &str) -> Option<&ContainerRegistration> {
        self.containers.get(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.containers.contains_key(id)
    }

    /// registrations, oldest first
    pub fn list(&self) -> Vec<&ContainerRegistration> {
        let mut list: Vec<_> = self.containers.values().collect();
        list.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        list
    }

    pub fn len(&self) -> usize {
        self.containers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.containers.is_empty()
    }
}
