//! User-scoped preferences and conversation memory types (spec.md §3).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Per-user settings (spec.md §3 "Preferences"). Unknown users get
/// [`Preferences::default`]; an upsert only overwrites provided fields —
/// see [`PreferencesPatch`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Preferences {
    pub default_chain_id: u64,
    /// Percent, e.g. `0.5` for 0.5%.
    pub slippage_tolerance_pct: f64,
    /// USD value above which a confirmation is required before broadcast.
    pub confirmation_required_usd: f64,
    pub max_transactions_per_day: u32,
}

impl Default for Preferences {
    fn default() -> Self {
        Self {
            default_chain_id: 1,
            slippage_tolerance_pct: 0.5,
            confirmation_required_usd: 500.0,
            max_transactions_per_day: 20,
        }
    }
}

/// A partial update to [`Preferences`]; `None` fields are left untouched.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PreferencesPatch {
    pub default_chain_id: Option<u64>,
    pub slippage_tolerance_pct: Option<f64>,
    pub confirmation_required_usd: Option<f64>,
    pub max_transactions_per_day: Option<u32>,
}

impl Preferences {
    /// Apply a patch, returning a new record with only the provided fields
    /// overwritten (spec.md §8 round-trip law:
    /// `set(U, p)` then `get(U)` == `{defaults, ...p}`).
    pub fn merged(mut self, patch: &PreferencesPatch) -> Self {
        if let Some(v) = patch.default_chain_id {
            self.default_chain_id = v;
        }
        if let Some(v) = patch.slippage_tolerance_pct {
            self.slippage_tolerance_pct = v;
        }
        if let Some(v) = patch.confirmation_required_usd {
            self.confirmation_required_usd = v;
        }
        if let Some(v) = patch.max_transactions_per_day {
            self.max_transactions_per_day = v;
        }
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConversationRole {
    User,
    Assistant,
    System,
}

/// One append-only conversation row (spec.md §3 "Conversation entry").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationEntry {
    pub id: i64,
    pub user_id: String,
    pub role: ConversationRole,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

/// Hard per-user cap on retained conversation rows (spec.md §3, §5).
pub const CONVERSATION_HISTORY_CAP: usize = 50;

/// Hard per-user cap on retained semantic memory chunks (spec.md §3, §5).
pub const VECTOR_MEMORY_CAP: usize = 500;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn preferences_patch_only_overwrites_provided_fields() {
        let base = Preferences::default();
        let patch = PreferencesPatch {
            slippage_tolerance_pct: Some(1.5),
            ..Default::default()
        };
        let merged = base.clone().merged(&patch);
        assert_eq!(merged.slippage_tolerance_pct, 1.5);
        assert_eq!(merged.default_chain_id, base.default_chain_id);
        assert_eq!(merged.confirmation_required_usd, base.confirmation_required_usd);
        assert_eq!(merged.max_transactions_per_day, base.max_transactions_per_day);
    }
}
