//! Hook event shape (spec.md §2 "Hook Bus", GLOSSARY "Hook event").

use serde_json::Value;

/// A typed `(category, action, payload)` tuple dispatched to any handler
/// subscribed to either the category or the exact `category:action` key,
/// e.g. `tx:before_simulate`, `cron:job_started`.
#[derive(Debug, Clone)]
pub struct HookEvent {
    pub category: String,
    pub action: String,
    pub payload: Value,
}

impl HookEvent {
    pub fn new(category: impl Into<String>, action: impl Into<String>, payload: Value) -> Self {
        Self { category: category.into(), action: action.into(), payload }
    }

    /// The exact subscription key, e.g. `"tx:before_simulate"`.
    pub fn key(&self) -> String {
        format!("{}:{}", self.category, self.action)
    }
}
