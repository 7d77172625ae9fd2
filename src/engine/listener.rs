//! per-field listener
//!
//! one listener exists for every field that carries conditional logic. it is
//! started once by the scheduler, then driven by [`FieldEvent`]s, and owns the
//! field's evaluation state:
//!
//! ```text
//! Uninitialized --setup--> Subscribed --update--> Subscribed
//!                               |
//!                             cancel
//!                               v
//!                           TornDown
//! ```

use std::collections::BTreeSet;
use std::fmt;
use std::sync::{Arc, Mutex};

use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::events::FieldEvent;
use super::host::{Diagnostic, FieldHost, FieldSnapshot, Publisher, SiblingSet, VisibilityState};
use crate::config::{EngineConfig, ErrorPolicy};
use crate::logic::{dependencies_of, depends_on, evaluate, evaluate_lenient, ConditionalLogic};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ListenerState {
    Uninitialized,
    Subscribed,
    TornDown,
}

impl fmt::Display for ListenerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ListenerState::Uninitialized => "uninitialized",
            ListenerState::Subscribed => "subscribed",
            ListenerState::TornDown => "torn_down",
        };
        write!(f, "{}", s)
    }
}

/// cancels a listener from outside the task that drives it
///
/// publication and cancellation take the same gate, so once [`cancel`] returns
/// the listener publishes nothing more. a [`Publisher`] must not tear down the
/// field it is publishing for, since the gate is held across the call.
///
/// [`cancel`]: ListenerCancel::cancel
#[derive(Clone)]
pub struct ListenerCancel {
    token: CancellationToken,
    gate: Arc<Mutex<()>>,
}

impl ListenerCancel {
    /// waits for an in-flight publication to finish
    pub fn cancel(&self) {
        let _guard = self.gate.lock();
        self.token.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }
}

pub struct FieldListener {
    field_id: String,
    scope: String,
    logic: ConditionalLogic,
    host: Arc<dyn FieldHost>,
    publisher: Arc<dyn Publisher>,
    error_policy: ErrorPolicy,
    fallback: VisibilityState,
    publish_unchanged: bool,
    state: ListenerState,
    /// siblings as of the last evaluation; dropped on cancel
    siblings: Option<SiblingSet>,
    last_published: Option<VisibilityState>,
    token: CancellationToken,
    gate: Arc<Mutex<()>>,
}

impl FieldListener {
    /// create a listener for a field, or `None` if the field has no conditional logic
    pub fn new(
        field: &FieldSnapshot,
        host: Arc<dyn FieldHost>,
        publisher: Arc<dyn Publisher>,
        config: &EngineConfig,
    ) -> Option<Self> {
        let logic = field.conditional_logic.clone()?;

        Some(Self {
            field_id: field.id.clone(),
            scope: field.parent.clone(),
            logic,
            host,
            publisher,
            error_policy: config.error_policy,
            fallback: VisibilityState::from(config.fallback_visibility),
            publish_unchanged: config.publish_unchanged,
            state: ListenerState::Uninitialized,
            siblings: None,
            last_published: None,
            token: CancellationToken::new(),
            gate: Arc::new(Mutex::new(())),
        })
    }

    pub fn field_id(&self) -> &str {
        &self.field_id
    }

    pub fn scope(&self) -> &str {
        &self.scope
    }

    pub fn state(&self) -> ListenerState {
        self.state
    }

    pub fn logic(&self) -> &ConditionalLogic {
        &self.logic
    }

    /// sibling short names the rules reference
    pub fn dependencies(&self) -> BTreeSet<String> {
        dependencies_of(&self.logic)
    }

    /// whether any rule reads the sibling with this short name
    pub fn depends_on(&self, name: &str) -> bool {
        depends_on(&self.logic, name)
    }

    pub fn sibling_count(&self) -> usize {
        self.siblings.as_ref().map(|s| s.len()).unwrap_or(0)
    }

    pub fn last_published(&self) -> Option<VisibilityState> {
        self.last_published
    }

    /// token cancelled when the listener is torn down
    pub fn cancellation_token(&self) -> CancellationToken {
        self.token.clone()
    }

    pub fn canceller(&self) -> ListenerCancel {
        ListenerCancel {
            token: self.token.clone(),
            gate: self.gate.clone(),
        }
    }

    /// run the initial evaluation and start accepting updates
    pub fn start(&mut self) -> Option<VisibilityState> {
        if self.state != ListenerState::Uninitialized {
            debug!(field = %self.field_id, state = %self.state, "ignoring repeated setup");
            return None;
        }

        let siblings = SiblingSet::read(self.host.as_ref(), &self.scope, &self.field_id);
        debug!(
            field = %self.field_id,
            scope = %self.scope,
            siblings = siblings.len(),
            logic = %self.logic,
            "field setup"
        );

        let state = self.evaluate(&siblings);
        self.siblings = Some(siblings);
        self.state = ListenerState::Subscribed;
        self.publish(state)
    }

    /// handle one event; returns the published state, if any
    pub fn on_event(&mut self, event: &FieldEvent) -> Option<VisibilityState> {
        let source = &event.field_id;
        if self.state != ListenerState::Subscribed || self.token.is_cancelled() {
            return None;
        }

        if event.value.is_none() {
            debug!(field = %self.field_id, source = %source, "ignoring update without value");
            return None;
        }

        // sibling membership is checked against a fresh read
        let siblings = SiblingSet::read(self.host.as_ref(), &self.scope, &self.field_id);
        if !siblings.contains_id(source) {
            debug!(field = %self.field_id, source = %source, "ignoring update from non-sibling");
            self.siblings = Some(siblings);
            return None;
        }

        let state = self.evaluate(&siblings);
        self.siblings = Some(siblings);
        self.publish(state)
    }

    /// stop the listener; it never publishes again
    pub fn cancel(&mut self) {
        if self.state == ListenerState::TornDown {
            return;
        }
        debug!(field = %self.field_id, "listener torn down");
        self.state = ListenerState::TornDown;
        self.siblings = None;
        self.token.cancel();
    }

    fn evaluate(&self, siblings: &SiblingSet) -> VisibilityState {
        match self.error_policy {
            ErrorPolicy::Fail => match evaluate(&self.logic, siblings) {
                Ok(verdict) => VisibilityState::from(verdict),
                Err(e) => {
                    warn!(
                        field = %self.field_id,
                        fallback = self.fallback.is_visible,
                        "conditional logic failed: {}", e
                    );
                    let diagnostic =
                        Diagnostic::new(&self.field_id, &e.errors).with_fallback(self.fallback);
                    self.publisher.report_diagnostic(&diagnostic);
                    self.fallback
                }
            },
            ErrorPolicy::RuleFalse => {
                let (verdict, errors) = evaluate_lenient(&self.logic, siblings);
                if !errors.is_empty() {
                    for e in &errors {
                        warn!(field = %self.field_id, "rule treated as false: {}", e);
                    }
                    self.publisher
                        .report_diagnostic(&Diagnostic::new(&self.field_id, &errors));
                }
                VisibilityState::from(verdict)
            }
        }
    }

    fn publish(&mut self, state: VisibilityState) -> Option<VisibilityState> {
        let gate = self.gate.clone();
        let _guard = gate.lock();
        if self.token.is_cancelled() {
            return None;
        }
        if !self.publish_unchanged && self.last_published == Some(state) {
            debug!(field = %self.field_id, "visibility unchanged, not publishing");
            return None;
        }

        debug!(field = %self.field_id, visible = state.is_visible, "publishing visibility");
        self.publisher.publish_visibility(&self.field_id, state);
        self.last_published = Some(state);
        Some(state)
    }
}

impl fmt::Debug for FieldListener {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FieldListener")
            .field("field_id", &self.field_id)
            .field("scope", &self.scope)
            .field("state", &self.state)
            .field("last_published", &self.last_published)
            .finish()
    }
}
