//! reactive visibility engine
//!
//! wires the evaluator in [`crate::logic`] to a host through two ports:
//! [`FieldHost`] for reading fields and [`Publisher`] for visibility output.

mod events;
mod host;
mod listener;
mod registry;
mod scheduler;

pub use events::{EventBus, FieldEvent};
pub use host::{
    ChannelPublisher, Diagnostic, FieldHost, FieldSnapshot, Publication, Publisher,
    RecordingPublisher, SiblingSet, VisibilityState,
};
pub use listener::{FieldListener, ListenerCancel, ListenerState};
pub use registry::{ContainerRegistration, ContainerRegistry};
pub use scheduler::{ContainerSetup, Engine, EngineError, InlineScheduler, SetupOutcome};
