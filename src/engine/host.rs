//! ports between the engine and its host
//!
//! the host owns fields and their values. the engine reads them through
//! [`FieldHost`] and reports derived visibility through [`Publisher`].

use std::collections::{BTreeMap, HashMap};
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::mpsc;

use crate::logic::{ConditionalLogic, RuleError, SiblingValues, Value};

/// a read-only view of one field at a point in time
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldSnapshot {
    /// unique identifier
    pub id: String,
    /// short name, unique within the parent scope
    pub name: String,
    /// parent scope (container or group) identifier
    pub parent: String,
    pub value: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub conditional_logic: Option<ConditionalLogic>,
}

impl FieldSnapshot {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        parent: impl Into<String>,
        value: Value,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            parent: parent.into(),
            value,
            conditional_logic: None,
        }
    }

    pub fn with_logic(mut self, logic: ConditionalLogic) -> Self {
        self.conditional_logic = Some(logic);
        self
    }
}

/// host-provided read access to fields
///
/// both calls must be cheap enough to run on every update and must reflect
/// the latest known values.
pub trait FieldHost: Send + Sync {
    fn read_field(&self, id: &str) -> Option<FieldSnapshot>;

    /// every field in `scope` except `excluding`, keyed by short name
    fn read_siblings(&self, scope: &str, excluding: &str) -> HashMap<String, FieldSnapshot>;
}

/// the siblings of one field, keyed by short name
#[derive(Debug, Clone, Default)]
pub struct SiblingSet {
    members: HashMap<String, FieldSnapshot>,
}

impl SiblingSet {
    pub fn read(host: &dyn FieldHost, scope: &str, owner_id: &str) -> Self {
        Self {
            members: host.read_siblings(scope, owner_id),
        }
    }

    /// check if the field with this id is a member
    pub fn contains_id(&self, id: &str) -> bool {
        self.members.values().any(|f| f.id == id)
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }
}

impl SiblingValues for SiblingSet {
    fn value_of(&self, name: &str) -> Option<&Value> {
        self.members.get(name).map(|f| &f.value)
    }
}

/// derived visibility of a field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct VisibilityState {
    pub is_visible: bool,
}

impl VisibilityState {
    pub fn visible() -> Self {
        Self { is_visible: true }
    }

    pub fn hidden() -> Self {
        Self { is_visible: false }
    }
}

impl From<bool> for VisibilityState {
    fn from(is_visible: bool) -> Self {
        Self { is_visible }
    }
}

/// a configuration error found while evaluating a field's logic
#[derive(Debug, Clone, Serialize)]
pub struct Diagnostic {
    pub field_id: String,
    pub ts: DateTime<Utc>,
    /// one message per failing rule
    pub errors: Vec<String>,
    /// the visibility published in place of a computed one, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fallback: Option<VisibilityState>,
}

impl Diagnostic {
    pub fn new(field_id: impl Into<String>, errors: &[RuleError]) -> Self {
        Self {
            field_id: field_id.into(),
            ts: Utc::now(),
            errors: errors.iter().map(|e| e.to_string()).collect(),
            fallback: None,
        }
    }

    pub fn with_fallback(mut self, state: VisibilityState) -> Self {
        self.fallback = Some(state);
        self
    }
}

/// where the engine sends its output
pub trait Publisher: Send + Sync {
    fn publish_visibility(&self, field_id: &str, state: VisibilityState);

    /// diagnostics channel for configuration errors; ignored by default
    fn report_diagnostic(&self, _diagnostic: &Diagnostic) {}
}

// ============================================================================
// Publications
// ============================================================================

/// one output of the engine, as delivered over a channel
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Publication {
    Visibility {
        field_id: String,
        ts: DateTime<Utc>,
        #[serde(flatten)]
        state: VisibilityState,
    },
    Diagnostic(Diagnostic),
}

impl Publication {
    pub fn field_id(&self) -> &str {
        match self {
            Publication::Visibility { field_id, .. } => field_id,
            Publication::Diagnostic(d) => &d.field_id,
        }
    }

    /// format as JSON-RPC notification
    pub fn to_jsonrpc_notification(&self) -> String {
        let method = match self {
            Publication::Visibility { .. } => "visibility",
            Publication::Diagnostic(_) => "diagnostic",
        };
        serde_json::json!({
            "jsonrpc": "2.0",
            "method": method,
            "params": self,
        })
        .to_string()
    }
}

/// forwards publications into an unbounded channel
pub struct ChannelPublisher {
    sender: mpsc::UnboundedSender<Publication>,
}

impl ChannelPublisher {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<Publication>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self { sender }, receiver)
    }
}

impl Publisher for ChannelPublisher {
    fn publish_visibility(&self, field_id: &str, state: VisibilityState) {
        // ignore send errors (receiver dropped)
        let _ = self.sender.send(Publication::Visibility {
            field_id: field_id.to_string(),
            ts: Utc::now(),
            state,
        });
    }

    fn report_diagnostic(&self, diagnostic: &Diagnostic) {
        let _ = self.sender.send(Publication::Diagnostic(diagnostic.clone()));
    }
}

/// keeps the latest state per field plus every diagnostic
#[derive(Default)]
pub struct RecordingPublisher {
    states: Mutex<BTreeMap<String, VisibilityState>>,
    diagnostics: Mutex<Vec<Diagnostic>>,
    count: Mutex<usize>,
}

impl RecordingPublisher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state_of(&self, field_id: &str) -> Option<VisibilityState> {
        self.states.lock().ok()?.get(field_id).copied()
    }

    pub fn states(&self) -> BTreeMap<String, VisibilityState> {
        self.states.lock().map(|s| s.clone()).unwrap_or_default()
    }

    pub fn diagnostics(&self) -> Vec<Diagnostic> {
        self.diagnostics
            .lock()
            .map(|d| d.clone())
            .unwrap_or_default()
    }

    /// total number of visibility publications received
    pub fn publication_count(&self) -> usize {
        self.count.lock().map(|c| *c).unwrap_or(0)
    }
}

impl Publisher for RecordingPublisher {
    fn publish_visibility(&self, field_id: &str, state: VisibilityState) {
        if let Ok(mut states) = self.states.lock() {
            states.insert(field_id.to_string(), state);
        }
        if let Ok(mut count) = self.count.lock() {
            *count += 1;
        }
    }

    fn report_diagnostic(&self, diagnostic: &Diagnostic) {
        if let Ok(mut diagnostics) = self.diagnostics.lock() {
            diagnostics.push(diagnostic.clone());
        }
    }
}
