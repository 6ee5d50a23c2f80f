//! Skill Registry (spec.md §3 "Skill names form a set"; §4.1
//! "`register(skill)` fails if the name is already present").
//!
//! Grounded on `tandem-skills`'s registration-rejects-duplicate-name
//! pattern, generalised from markdown-file skill discovery to typed Rust
//! handlers implementing [`chainclaw_types::skill::Skill`].

use std::collections::HashMap;
use std::sync::Arc;

use chainclaw_types::skill::Skill;
use tokio::sync::RwLock;

#[derive(Clone, Default)]
pub struct SkillRegistry {
    skills: Arc<RwLock<HashMap<&'static str, Arc<dyn Skill>>>>,
}

impl SkillRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fails if a skill with this name is already registered.
    pub async fn register(&self, skill: Arc<dyn Skill>) -> Result<(), String> {
        let mut skills = self.skills.write().await;
        if skills.contains_key(skill.name()) {
            return Err(format!("a skill named '{}' is already registered", skill.name()));
        }
        skills.insert(skill.name(), skill);
        Ok(())
    }

    pub async fn get(&self, name: &str) -> Option<Arc<dyn Skill>> {
        self.skills.read().await.get(name).cloned()
    }

    pub async fn list(&self) -> Vec<Arc<dyn Skill>> {
        self.skills.read().await.values().cloned().collect()
    }
}
