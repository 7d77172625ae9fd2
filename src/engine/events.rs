//! field events and the per-scope event bus
//!
//! every parent scope gets its own set of subscribers. an update emitted into
//! a scope reaches only the listeners of that scope, optionally narrowed to
//! the sibling names a listener depends on.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::RwLock;

use serde::Serialize;
use tokio::sync::mpsc;

use crate::logic::Value;

// ============================================================================
// Event Types
// ============================================================================

/// the host changed a field's value
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldEvent {
    pub field_id: String,
    /// short name of the field within its scope
    pub name: String,
    /// `None` means the value is unset
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
}

impl FieldEvent {
    pub fn update(field_id: impl Into<String>, name: impl Into<String>, value: Option<Value>) -> Self {
        Self {
            field_id: field_id.into(),
            name: name.into(),
            value,
        }
    }

    /// the field the event is about
    pub fn field_id(&self) -> &str {
        &self.field_id
    }
}

impl std::fmt::Display for FieldEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "field.update {}", self.field_id)
    }
}

// ============================================================================
// Subscriber
// ============================================================================

struct Subscriber {
    /// sibling names this subscriber wants (None = whole scope)
    sources: Option<HashSet<String>>,
    sender: mpsc::UnboundedSender<FieldEvent>,
}

impl Subscriber {
    fn wants_event(&self, event: &FieldEvent) -> bool {
        match &self.sources {
            None => true,
            Some(names) => names.contains(&event.name),
        }
    }
}

// ============================================================================
// EventBus
// ============================================================================

/// routes field events to the subscribers of one scope
pub struct EventBus {
    next_id: AtomicU64,
    /// scope id -> subscriber id -> subscriber
    scopes: RwLock<HashMap<String, HashMap<u64, Subscriber>>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self {
            next_id: AtomicU64::new(1),
            scopes: RwLock::new(HashMap::new()),
        }
    }

    /// subscribe to a scope, optionally narrowed to a set of sibling names
    /// returns (subscription_id, receiver)
    pub fn subscribe(
        &self,
        scope: &str,
        sources: Option<HashSet<String>>,
    ) -> (u64, mpsc::UnboundedReceiver<FieldEvent>) {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let (sender, receiver) = mpsc::unbounded_channel();

        if let Ok(mut scopes) = self.scopes.write() {
            scopes
                .entry(scope.to_string())
                .or_default()
                .insert(id, Subscriber { sources, sender });
        }

        (id, receiver)
    }

    /// remove a subscription; the scope entry goes away with its last subscriber
    pub fn unsubscribe(&self, scope: &str, id: u64) -> bool {
        let Ok(mut scopes) = self.scopes.write() else {
            return false;
        };

        let removed = match scopes.get_mut(scope) {
            Some(subs) => subs.remove(&id).is_some(),
            None => false,
        };

        if scopes.get(scope).is_some_and(|subs| subs.is_empty()) {
            scopes.remove(scope);
        }

        removed
    }

    /// deliver an event to every interested subscriber of `scope`
    /// returns the number of subscribers it was delivered to
    pub fn emit(&self, scope: &str, event: FieldEvent) -> usize {
        let mut delivered = 0;
        let mut closed = Vec::new();

        if let Ok(scopes) = self.scopes.read() {
            if let Some(subs) = scopes.get(scope) {
                for (id, subscriber) in subs {
                    if !subscriber.wants_event(&event) {
                        continue;
                    }
                    if subscriber.sender.send(event.clone()).is_ok() {
                        delivered += 1;
                    } else {
                        closed.push(*id);
                    }
                }
            }
        }

        // drop subscribers whose receiver is gone
        for id in closed {
            self.unsubscribe(scope, id);
        }

        delivered
    }

    /// number of subscribers in one scope
    pub fn subscriber_count(&self, scope: &str) -> usize {
        self.scopes
            .read()
            .map(|s| s.get(scope).map(|subs| subs.len()).unwrap_or(0))
            .unwrap_or(0)
    }

    /// number of subscribers across all scopes
    pub fn total_subscribers(&self) -> usize {
        self.scopes
            .read()
            .map(|s| s.values().map(|subs| subs.len()).sum())
            .unwrap_or(0)
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// Tests
// ============================================================================
