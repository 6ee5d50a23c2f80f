//! Transaction record types (spec.md §3 "Transaction record", §4.7).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TxStatus {
    Pending,
    Simulated,
    Broadcast,
    Confirmed,
    Failed,
}

impl TxStatus {
    /// `confirmed` and `failed` are terminal (spec.md §3 invariants).
    pub fn is_terminal(self) -> bool {
        matches!(self, TxStatus::Confirmed | TxStatus::Failed)
    }

    /// Whether `self -> next` is a legal monotonic transition
    /// (spec.md §8: "status sequence observed is a prefix of
    /// pending -> simulated -> broadcast -> confirmed|failed").
    pub fn can_advance_to(self, next: TxStatus) -> bool {
        use TxStatus::*;
        if self.is_terminal() {
            return false;
        }
        matches!(
            (self, next),
            (Pending, Simulated)
                | (Pending, Failed)
                | (Simulated, Broadcast)
                | (Simulated, Failed)
                | (Broadcast, Confirmed)
                | (Broadcast, Failed)
        )
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TxRecord {
    pub id: String,
    pub user_id: String,
    pub chain_id: u64,
    pub from: String,
    pub to: String,
    pub value: String,
    pub hash: Option<String>,
    pub status: TxStatus,
    /// USD value at creation time, used by the guardrail's per-tx/per-day
    /// dollar limits (spec.md §4.7 stage 3).
    pub value_usd: f64,
    pub skill_name: String,
    pub intent_description: String,
    pub simulation_result: Option<Value>,
    pub guardrail_checks: Option<Value>,
    pub gas_used: Option<String>,
    pub gas_price: Option<String>,
    pub block_number: Option<u64>,
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
