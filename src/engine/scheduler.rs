//! reactive scheduler
//!
//! [`Engine`] runs one tokio task per field listener. each task owns its
//! listener and drains a private channel from the per-scope [`EventBus`], so
//! evaluations for one field are serialized in delivery order while separate
//! fields proceed independently.
//!
//! [`InlineScheduler`] drives the same listeners synchronously on the caller's
//! thread, for one-shot evaluation.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Arc, Mutex};

use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use super::events::{EventBus, FieldEvent};
use super::host::{FieldHost, FieldSnapshot, Publisher, VisibilityState};
use super::listener::{FieldListener, ListenerCancel};
use super::registry::{ContainerRegistration, ContainerRegistry};
use crate::config::{EngineConfig, Subscription};
use crate::logic::Value;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum EngineError {
    #[error("unknown field: {0}")]
    UnknownField(String),
    #[error("no tokio runtime available to run field listeners")]
    NoRuntime,
    #[error("engine state lock poisoned")]
    Poisoned,
}

/// result of setting up one field
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SetupOutcome {
    /// the field has no conditional logic; nothing was scheduled
    Inert,
    /// a listener is running; `initial` is the state published at setup
    Subscribed { initial: Option<VisibilityState> },
}

impl SetupOutcome {
    pub fn is_inert(&self) -> bool {
        matches!(self, SetupOutcome::Inert)
    }
}

/// outcome of setting up every field of a container, in field order
pub type ContainerSetup = Vec<(String, Result<SetupOutcome, EngineError>)>;

fn listener_for(
    host: &Arc<dyn FieldHost>,
    publisher: &Arc<dyn Publisher>,
    config: &EngineConfig,
    field_id: &str,
) -> Result<(FieldSnapshot, Option<FieldListener>), EngineError> {
    let field = host
        .read_field(field_id)
        .ok_or_else(|| EngineError::UnknownField(field_id.to_string()))?;
    let listener = FieldListener::new(&field, host.clone(), publisher.clone(), config);
    if listener.is_none() {
        debug!(field = %field_id, "field has no conditional logic, skipping");
    }
    Ok((field, listener))
}

// ============================================================================
// Engine
// ============================================================================

struct ListenerHandle {
    scope: String,
    subscription: u64,
    cancel: ListenerCancel,
    task: JoinHandle<()>,
}

impl ListenerHandle {
    /// cancel the listener and remove its subscription from the bus
    fn stop(&self, bus: &EventBus) {
        self.cancel.cancel();
        bus.unsubscribe(&self.scope, self.subscription);
    }
}

/// the asynchronous engine
///
/// the host must store a new value before calling [`Engine::field_updated`];
/// listeners always re-read sibling values from the host.
pub struct Engine {
    host: Arc<dyn FieldHost>,
    publisher: Arc<dyn Publisher>,
    config: EngineConfig,
    bus: Arc<EventBus>,
    listeners: Mutex<HashMap<String, ListenerHandle>>,
    containers: Mutex<ContainerRegistry>,
}

impl Engine {
    pub fn new(
        host: Arc<dyn FieldHost>,
        publisher: Arc<dyn Publisher>,
        config: EngineConfig,
    ) -> Self {
        Self {
            host,
            publisher,
            config,
            bus: Arc::new(EventBus::new()),
            listeners: Mutex::new(HashMap::new()),
            containers: Mutex::new(ContainerRegistry::new()),
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn bus(&self) -> &Arc<EventBus> {
        &self.bus
    }

    /// activate a field: evaluate it once and keep it updated
    ///
    /// the subscription is in place before the initial evaluation, so no
    /// update emitted after this call starts is lost. setting up a field that
    /// already has a listener replaces that listener.
    pub fn setup_field(&self, field_id: &str) -> Result<SetupOutcome, EngineError> {
        let runtime = tokio::runtime::Handle::try_current().map_err(|_| EngineError::NoRuntime)?;

        self.teardown_field(field_id);

        let (field, listener) = listener_for(&self.host, &self.publisher, &self.config, field_id)?;
        let Some(mut listener) = listener else {
            return Ok(SetupOutcome::Inert);
        };

        // narrowed by sibling name, so siblings added to the scope later still count
        let sources = match self.config.subscription {
            Subscription::Scope => None,
            Subscription::Dependencies => {
                Some(listener.dependencies().into_iter().collect::<HashSet<_>>())
            }
        };
        let (subscription, receiver) = self.bus.subscribe(&field.parent, sources);

        let initial = listener.start();
        let cancel = listener.canceller();
        let task = runtime.spawn(run_listener(listener, receiver));

        let handle = ListenerHandle {
            scope: field.parent.clone(),
            subscription,
            cancel,
            task,
        };
        let replaced = match self.listeners.lock() {
            Ok(mut listeners) => listeners.insert(field.id.clone(), handle),
            Err(_) => {
                handle.stop(&self.bus);
                return Err(EngineError::Poisoned);
            }
        };
        // a concurrent setup of the same field got in first
        if let Some(old) = replaced {
            debug!(field = %field.id, "replacing listener from concurrent setup");
            old.stop(&self.bus);
        }

        debug!(field = %field.id, scope = %field.parent, subscription, "listener scheduled");
        Ok(SetupOutcome::Subscribed { initial })
    }

    /// notify listeners that a field's value changed
    /// returns the number of listeners the update was delivered to
    pub fn field_updated(&self, field_id: &str, value: Option<Value>) -> Result<usize, EngineError> {
        let field = self
            .host
            .read_field(field_id)
            .ok_or_else(|| EngineError::UnknownField(field_id.to_string()))?;

        let delivered = self
            .bus
            .emit(&field.parent, FieldEvent::update(field_id, &field.name, value));
        debug!(field = %field_id, scope = %field.parent, delivered, "update emitted");
        Ok(delivered)
    }

    /// cancel a field's listener; returns false if it had none
    pub fn teardown_field(&self, field_id: &str) -> bool {
        let handle = match self.listeners.lock() {
            Ok(mut listeners) => listeners.remove(field_id),
            Err(_) => {
                error!(field = %field_id, "listener table poisoned, cannot tear down");
                return false;
            }
        };

        match handle {
            Some(handle) => {
                handle.stop(&self.bus);
                debug!(field = %field_id, "listener cancelled");
                true
            }
            None => false,
        }
    }

    /// set up every field of a container
    ///
    /// a container id that is already registered is torn down first.
    pub fn register_container(
        &self,
        container_id: &str,
        field_ids: Vec<String>,
    ) -> Result<ContainerSetup, EngineError> {
        if self.is_registered(container_id) {
            self.teardown_container(container_id);
        }

        let outcomes: ContainerSetup = field_ids
            .iter()
            .map(|id| (id.clone(), self.setup_field(id)))
            .collect();

        self.containers
            .lock()
            .map_err(|_| EngineError::Poisoned)?
            .register(container_id, field_ids);

        info!(
            container = %container_id,
            fields = outcomes.len(),
            listeners = outcomes
                .iter()
                .filter(|(_, r)| matches!(r, Ok(SetupOutcome::Subscribed { .. })))
                .count(),
            "container registered"
        );
        Ok(outcomes)
    }

    /// cancel every listener of a container
    /// returns the number of listeners cancelled
    pub fn teardown_container(&self, container_id: &str) -> usize {
        let registration = match self.containers.lock() {
            Ok(mut containers) => containers.remove(container_id),
            Err(_) => None,
        };

        let Some(registration) = registration else {
            return 0;
        };

        let cancelled = registration
            .field_ids
            .iter()
            .filter(|id| self.teardown_field(id))
            .count();

        info!(container = %container_id, cancelled, "container torn down");
        cancelled
    }

    pub fn is_registered(&self, container_id: &str) -> bool {
        self.containers
            .lock()
            .map(|c| c.contains(container_id))
            .unwrap_or(false)
    }

    pub fn containers(&self) -> Vec<ContainerRegistration> {
        self.containers
            .lock()
            .map(|c| c.list().into_iter().cloned().collect())
            .unwrap_or_default()
    }

    /// ids of fields with a running listener, sorted
    pub fn active_listeners(&self) -> Vec<String> {
        let mut ids: Vec<String> = self
            .listeners
            .lock()
            .map(|l| l.keys().cloned().collect())
            .unwrap_or_default();
        ids.sort();
        ids
    }

    pub fn is_active(&self, field_id: &str) -> bool {
        self.listeners
            .lock()
            .map(|l| l.contains_key(field_id))
            .unwrap_or(false)
    }

    /// stop accepting updates, let listeners handle what is already queued,
    /// then wait for their tasks to finish
    pub async fn drain(&self) {
        let handles: Vec<ListenerHandle> = match self.listeners.lock() {
            Ok(mut listeners) => listeners.drain().map(|(_, h)| h).collect(),
            Err(_) => Vec::new(),
        };

        // dropping the subscription closes the channel once it is empty
        for handle in &handles {
            self.bus.unsubscribe(&handle.scope, handle.subscription);
        }
        for handle in handles {
            let _ = handle.task.await;
        }

        if let Ok(mut containers) = self.containers.lock() {
            *containers = ContainerRegistry::new();
        }
        info!("engine drained");
    }

    /// cancel every listener and wait for their tasks to finish
    pub async fn shutdown(&self) {
        let handles: Vec<ListenerHandle> = match self.listeners.lock() {
            Ok(mut listeners) => listeners.drain().map(|(_, h)| h).collect(),
            Err(_) => Vec::new(),
        };

        for handle in &handles {
            handle.stop(&self.bus);
        }
        for handle in handles {
            let _ = handle.task.await;
        }

        if let Ok(mut containers) = self.containers.lock() {
            *containers = ContainerRegistry::new();
        }
        info!("engine shut down");
    }
}

impl Drop for Engine {
    fn drop(&mut self) {
        if let Ok(listeners) = self.listeners.lock() {
            for handle in listeners.values() {
                handle.cancel.cancel();
            }
        }
    }
}

async fn run_listener(mut listener: FieldListener, mut receiver: mpsc::UnboundedReceiver<FieldEvent>) {
    let token = listener.cancellation_token();
    loop {
        tokio::select! {
            biased;
            _ = token.cancelled() => break,
            event = receiver.recv() => match event {
                Some(event) => {
                    listener.on_event(&event);
                }
                None => break,
            },
        }
    }
    listener.cancel();
}

// ============================================================================
// Inline scheduler
// ============================================================================

/// synchronous scheduler: every event is handled before the call returns
pub struct InlineScheduler {
    host: Arc<dyn FieldHost>,
    publisher: Arc<dyn Publisher>,
    config: EngineConfig,
    /// field id -> listener, ordered for deterministic dispatch
    listeners: BTreeMap<String, FieldListener>,
    containers: ContainerRegistry,
}

impl InlineScheduler {
    pub fn new(
        host: Arc<dyn FieldHost>,
        publisher: Arc<dyn Publisher>,
        config: EngineConfig,
    ) -> Self {
        Self {
            host,
            publisher,
            config,
            listeners: BTreeMap::new(),
            containers: ContainerRegistry::new(),
        }
    }

    pub fn setup_field(&mut self, field_id: &str) -> Result<SetupOutcome, EngineError> {
        self.teardown_field(field_id);

        let (field, listener) = listener_for(&self.host, &self.publisher, &self.config, field_id)?;
        let Some(mut listener) = listener else {
            return Ok(SetupOutcome::Inert);
        };

        let initial = listener.start();
        self.listeners.insert(field.id, listener);
        Ok(SetupOutcome::Subscribed { initial })
    }

    /// deliver an update to the listeners of the field's scope
    /// returns the number of publications it caused
    pub fn field_updated(&mut self, field_id: &str, value: Option<Value>) -> Result<usize, EngineError> {
        let field = self
            .host
            .read_field(field_id)
            .ok_or_else(|| EngineError::UnknownField(field_id.to_string()))?;
        let event = FieldEvent::update(field_id, &field.name, value);
        let narrowed = self.config.subscription == Subscription::Dependencies;

        let mut published = 0;
        for listener in self.listeners.values_mut() {
            if listener.scope() != field.parent {
                continue;
            }
            if narrowed && !listener.depends_on(&field.name) {
                continue;
            }
            if listener.on_event(&event).is_some() {
                published += 1;
            }
        }
        Ok(published)
    }

    pub fn teardown_field(&mut self, field_id: &str) -> bool {
        match self.listeners.remove(field_id) {
            Some(mut listener) => {
                listener.cancel();
                true
            }
            None => false,
        }
    }

    pub fn register_container(&mut self, container_id: &str, field_ids: Vec<String>) -> ContainerSetup {
        if self.containers.contains(container_id) {
            self.teardown_container(container_id);
        }

        let outcomes = field_ids
            .iter()
            .map(|id| (id.clone(), self.setup_field(id)))
            .collect();
        self.containers.register(container_id, field_ids);
        outcomes
    }

    pub fn teardown_container(&mut self, container_id: &str) -> usize {
        match self.containers.remove(container_id) {
            Some(registration) => registration
                .field_ids
                .iter()
                .filter(|id| self.teardown_field(id))
                .count(),
            None => 0,
        }
    }

    pub fn active_listeners(&self) -> Vec<String> {
        self.listeners.keys().cloned().collect()
    }

    pub fn listener(&self, field_id: &str) -> Option<&FieldListener> {
        self.listeners.get(field_id)
    }
}
