//! Process-local hook bus (spec.md §2 "Hook Bus", §4.7, §4.9, §4.5,
//! GLOSSARY "Hook event").
//!
//! A typed `(category, action, payload)` tuple is dispatched to every
//! handler subscribed to either the bare `category` or the exact
//! `category:action` key — e.g. a subscriber on `"tx"` sees every
//! transaction-pipeline event, while one on `"tx:confirmed"` sees only
//! confirmations. Handler failures are isolated per-handler (spec.md §7:
//! "one failing subscriber never prevents others from running").

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chainclaw_types::hook::HookEvent;
use tokio::sync::RwLock;

/// Implemented by anything that wants to observe hook events. Default
/// no-op so handlers only implement what they need — mirrors the
/// teacher's `HookHandler` default-method shape.
#[async_trait]
pub trait HookHandler: Send + Sync {
    fn name(&self) -> &str;

    async fn handle(&self, event: &HookEvent);
}

/// Process-local pub/sub for lifecycle events (spec.md §2). A process-wide
/// singleton created at boot (spec.md §9 "Global state"); tests use
/// [`HookBus::new`] directly rather than a shared global.
#[derive(Default)]
pub struct HookBus {
    // subscription key -> handlers; key is either "category" or
    // "category:action".
    handlers: RwLock<HashMap<String, Vec<Arc<dyn HookHandler>>>>,
}

impl HookBus {
    pub fn new() -> Self {
        Self { handlers: RwLock::new(HashMap::new()) }
    }

    /// Subscribe a handler to a category (e.g. `"tx"`) or an exact key
    /// (e.g. `"cron:job_started"`).
    pub async fn subscribe(&self, key: impl Into<String>, handler: Arc<dyn HookHandler>) {
        let key = key.into();
        self.handlers.write().await.entry(key).or_default().push(handler);
    }

    /// Dispatch an event to every handler subscribed to its category or its
    /// exact key. A handler panic/failure is caught so one bad subscriber
    /// never blocks the others (spec.md §7).
    pub async fn emit(&self, event: HookEvent) {
        let exact_key = event.key();
        let handlers = self.handlers.read().await;
        let mut seen = std::collections::HashSet::new();
        let mut to_run: Vec<Arc<dyn HookHandler>> = Vec::new();
        for key in [event.category.clone(), exact_key] {
            if let Some(subs) = handlers.get(&key) {
                for handler in subs {
                    let ptr = Arc::as_ptr(handler) as *const () as usize;
                    if seen.insert(ptr) {
                        to_run.push(handler.clone());
                    }
                }
            }
        }
        drop(handlers);
        for handler in to_run {
            let name = handler.name().to_string();
            let event = event.clone();
            let result = tokio::spawn(async move { handler.handle(&event).await }).await;
            if let Err(join_err) = result {
                tracing::warn!(handler = %name, error = %join_err, "hook handler panicked");
            }
        }
    }

    /// Remove every subscriber. Tests and the boot path's `reset`
    /// entry-point (spec.md §9 "Global state") use this between runs.
    pub async fn clear(&self) {
        self.handlers.write().await.clear();
    }

    pub async fn subscriber_count(&self) -> usize {
        self.handlers.read().await.values().map(|v| v.len()).sum()
    }
}
