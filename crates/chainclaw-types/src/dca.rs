//! DCA job types (spec.md §3 "DCA job", §4.6).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DcaFrequency {
    Daily,
    Weekly,
    Monthly,
}

impl DcaFrequency {
    pub fn duration(self) -> chrono::Duration {
        match self {
            DcaFrequency::Daily => chrono::Duration::days(1),
            DcaFrequency::Weekly => chrono::Duration::days(7),
            DcaFrequency::Monthly => chrono::Duration::days(30),
        }
    }

    /// Whether this cadence has elapsed since `last_run_at` as of `now`.
    /// A job that has never run is always due.
    pub fn is_due(self, last_run_at: Option<DateTime<Utc>>, now: DateTime<Utc>) -> bool {
        match last_run_at {
            None => true,
            Some(last) => now - last >= self.duration(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DcaStatus {
    Active,
    Paused,
    Cancelled,
}

/// Consecutive DCA execution failures before the job auto-pauses
/// (spec.md §4.6).
pub const DCA_AUTO_PAUSE_FAILURES: u32 = 5;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DcaJob {
    pub id: i64,
    pub user_id: String,
    pub from_token: String,
    pub to_token: String,
    pub amount: String,
    pub chain_id: u64,
    pub frequency: DcaFrequency,
    pub wallet_address: Option<String>,
    pub status: DcaStatus,
    pub last_run_at: Option<DateTime<Utc>>,
    pub consecutive_failures: u32,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn never_run_job_is_due() {
        assert!(DcaFrequency::Daily.is_due(None, Utc::now()));
    }

    #[test]
    fn daily_job_not_due_within_a_day() {
        let now = Utc::now();
        assert!(!DcaFrequency::Daily.is_due(Some(now - chrono::Duration::hours(1)), now));
        assert!(DcaFrequency::Daily.is_due(Some(now - chrono::Duration::hours(25)), now));
    }
}
