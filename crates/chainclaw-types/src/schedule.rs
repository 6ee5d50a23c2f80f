//! Cron job types (spec.md §3 "Cron job", §4.5).

use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A job's schedule — tagged variant per spec.md §3.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Schedule {
    At { at: DateTime<Utc> },
    Every { every_ms: u64, anchor_ms: Option<u64> },
    Cron { expr: String, tz: Option<String> },
}

/// Runtime bookkeeping for a cron job (spec.md §3 "state").
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct JobState {
    pub next_run_at_ms: Option<i64>,
    pub last_run_at_ms: Option<i64>,
    pub last_status: Option<JobStatus>,
    pub last_error: Option<String>,
    pub last_duration_ms: Option<i64>,
    pub consecutive_errors: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Ok,
    Error,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CronJob {
    pub id: String,
    pub name: String,
    pub skill_name: String,
    pub skill_params: serde_json::Value,
    pub user_id: String,
    pub chain_id: Option<u64>,
    pub schedule: Schedule,
    pub enabled: bool,
    pub state: JobState,
    pub created_at: DateTime<Utc>,
}

impl CronJob {
    /// Terminal per spec.md §4.5: disabled with no next run scheduled.
    pub fn is_terminal(&self) -> bool {
        !self.enabled && self.state.next_run_at_ms.is_none()
    }
}

/// Computes the next fire time for `schedule` strictly after `now`, or
/// `None` if the schedule is exhausted (an `At` job whose instant has
/// already passed, or an unparseable `Cron` expression).
///
/// Shared by the store (to seed a freshly created job's first run) and the
/// scheduler (to compute the next run after one fires), so both sides agree
/// on what "next" means for a given schedule (spec.md §4.5).
pub fn compute_next_run(schedule: &Schedule, now: DateTime<Utc>) -> Option<i64> {
    match schedule {
        Schedule::At { at } => (*at > now).then(|| at.timestamp_millis()),
        Schedule::Every { every_ms, anchor_ms } => {
            let now_ms = now.timestamp_millis();
            let anchor = anchor_ms.map(|a| a as i64).unwrap_or(now_ms);
            let every = (*every_ms).max(1) as i64;
            if now_ms < anchor {
                return Some(anchor);
            }
            let diff = now_ms - anchor;
            let steps = diff / every + 1;
            Some(anchor + steps * every)
        }
        Schedule::Cron { expr, tz } => next_cron_fire(expr, tz.as_deref(), now).map(|dt| dt.timestamp_millis()),
    }
}

fn next_cron_fire(expr: &str, tz: Option<&str>, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
    let schedule = cron::Schedule::from_str(expr).ok()?;
    let tz: chrono_tz::Tz = tz.and_then(|t| t.parse().ok()).unwrap_or(chrono_tz::UTC);
    let now_tz = now.with_timezone(&tz);

    let mut next = schedule.after(&now_tz).next();
    if let Some(candidate) = next {
        if candidate <= now_tz {
            // Defensive retry per spec.md §4.5: a schedule that doesn't
            // strictly advance is nudged forward by one second and
            // re-evaluated once rather than spinning.
            next = schedule.after(&(now_tz + chrono::Duration::seconds(1))).next();
        }
    }
    next.map(|dt| dt.with_timezone(&Utc))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn at_schedule_fires_once_then_exhausts() {
        let at = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
        let before = at - chrono::Duration::seconds(1);
        let after = at + chrono::Duration::seconds(1);
        assert_eq!(compute_next_run(&Schedule::At { at }, before), Some(at.timestamp_millis()));
        assert_eq!(compute_next_run(&Schedule::At { at }, after), None);
    }

    #[test]
    fn every_schedule_advances_from_anchor() {
        let schedule = Schedule::Every { every_ms: 60_000, anchor_ms: Some(0) };
        let now = Utc.timestamp_millis_opt(125_000).unwrap();
        // anchor=0, every=60s: steps at 0,60s,120s,180s... next strictly after 125s is 180s.
        assert_eq!(compute_next_run(&schedule, now), Some(180_000));
    }

    #[test]
    fn every_schedule_landing_exactly_on_step_advances_one_interval() {
        let schedule = Schedule::Every { every_ms: 60_000, anchor_ms: Some(0) };
        let now = Utc.timestamp_millis_opt(120_000).unwrap();
        assert_eq!(compute_next_run(&schedule, now), Some(180_000));
    }

    #[test]
    fn cron_schedule_computes_next_minute_boundary() {
        let schedule = Schedule::Cron { expr: "0 * * * * *".to_string(), tz: None };
        let now = Utc.with_ymd_and_hms(2026, 1, 1, 12, 30, 15).unwrap();
        let next = compute_next_run(&schedule, now).expect("cron expression should parse");
        let next_dt = Utc.timestamp_millis_opt(next).unwrap();
        assert_eq!(next_dt, Utc.with_ymd_and_hms(2026, 1, 1, 12, 31, 0).unwrap());
    }
}
