use serde::{Deserialize, Serialize};

/// what happens when a field's conditional logic cannot be evaluated
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorPolicy {
    /// any rule error fails the evaluation; the field gets the fallback visibility
    Fail,
    /// a failing rule contributes `false` and the remaining rules still count
    RuleFalse,
}

impl Default for ErrorPolicy {
    fn default() -> Self {
        if cfg!(debug_assertions) {
            ErrorPolicy::Fail
        } else {
            ErrorPolicy::RuleFalse
        }
    }
}

/// which sibling updates wake a field's listener
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Subscription {
    /// every update in the field's scope
    #[default]
    Scope,
    /// only updates of siblings the rules reference
    Dependencies,
}

pub const DEFAULT_FALLBACK_VISIBILITY: bool = true;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(default)]
    pub error_policy: ErrorPolicy,
    /// visibility published when evaluation fails under [`ErrorPolicy::Fail`]
    #[serde(default = "default_fallback_visibility")]
    pub fallback_visibility: bool,
    #[serde(default)]
    pub subscription: Subscription,
    /// publish even when the state equals the last published one
    #[serde(default = "default_publish_unchanged")]
    pub publish_unchanged: bool,
}

fn default_fallback_visibility() -> bool {
    DEFAULT_FALLBACK_VISIBILITY
}

fn default_publish_unchanged() -> bool {
    true
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            error_policy: ErrorPolicy::default(),
            fallback_visibility: DEFAULT_FALLBACK_VISIBILITY,
            subscription: Subscription::default(),
            publish_unchanged: true,
        }
    }
}
