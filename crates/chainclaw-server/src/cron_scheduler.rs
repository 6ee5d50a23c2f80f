//! Cron Scheduler (spec.md §4.5): computes each job's next fire time,
//! drains due jobs on a single re-entrancy-guarded timer, and runs the
//! job's skill headlessly.
//!
//! Schedule computation (`chainclaw_types::schedule::compute_next_run`) is
//! shared with the store, which seeds a freshly created job's first run the
//! same way this scheduler computes its next one (spec.md §4.5) — the
//! `Cron` variant's expression evaluation uses the `cron`/`chrono-tz`
//! crates, the same pairing `other_examples/manifests/ThirdKeyAI-Symbiont`
//! carries for timezone-aware cron scheduling — no repo in the core pack
//! implements crontab evaluation itself. The due-job drain loop and the
//! error-backoff table are grounded on `chainclaw-retry::BackoffPolicy`'s
//! clamped-step shape, generalized from per-call retry delay to per-job
//! reschedule delay.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration as StdDuration;

use chainclaw_hooks::HookBus;
use chainclaw_memory::Store;
use chainclaw_skills::SkillRegistry;
use chainclaw_types::hook::HookEvent;
use chainclaw_types::schedule::{compute_next_run, CronJob, JobStatus};
use chrono::Utc;
use futures::FutureExt;
use serde_json::json;

use crate::headless::HeadlessChannel;

/// Clamped backoff steps applied on top of the normal next-run computation
/// when a job's last run errored (spec.md §4.5): 30s, 1min, 5min, 15min,
/// 60min, saturating at the last step for further consecutive errors.
const BACKOFF_STEPS_MS: [i64; 5] = [30_000, 60_000, 300_000, 900_000, 3_600_000];

/// Upper bound on how long the scheduler ever sleeps before re-checking for
/// due jobs, regardless of how far away the earliest `next_run_at_ms` is
/// (spec.md §4.5 "single pending timer ... clamped to a maximum wait").
const MAX_WAIT: StdDuration = StdDuration::from_secs(60);

fn backoff_ms(consecutive_errors: u32) -> i64 {
    let idx = (consecutive_errors.saturating_sub(1) as usize).min(BACKOFF_STEPS_MS.len() - 1);
    BACKOFF_STEPS_MS[idx]
}

/// Applies the error-backoff table on top of a normally computed next run,
/// per spec.md §4.5: `next = max(normalNext, now + backoffMs)`.
fn apply_backoff(normal_next: Option<i64>, now_ms: i64, consecutive_errors: u32) -> Option<i64> {
    let floor = now_ms + backoff_ms(consecutive_errors);
    Some(normal_next.map(|n| n.max(floor)).unwrap_or(floor))
}

pub struct CronScheduler {
    store: Arc<Store>,
    skills: SkillRegistry,
    hooks: Arc<HookBus>,
    ticking: AtomicBool,
}

impl CronScheduler {
    pub fn new(store: Arc<Store>, skills: SkillRegistry, hooks: Arc<HookBus>) -> Self {
        Self { store, skills, hooks, ticking: AtomicBool::new(false) }
    }

    /// Runs the scheduler loop until cancelled. Intended to be driven by a
    /// `tokio::select!` against a shutdown signal at the call site.
    pub async fn run(self: Arc<Self>) {
        loop {
            let wait = self.next_wait().await;
            tokio::time::sleep(wait).await;

            if self.ticking.swap(true, Ordering::SeqCst) {
                // A tick from a previous iteration is still running; rearm
                // without overlapping a second handler (spec.md §4.5).
                continue;
            }
            self.tick().await;
            self.ticking.store(false, Ordering::SeqCst);
        }
    }

    async fn next_wait(&self) -> StdDuration {
        let now_ms = Utc::now().timestamp_millis();
        let earliest = match self.store.list_due_cron_jobs(i64::MAX).await {
            Ok(jobs) => jobs.iter().filter_map(|j| j.state.next_run_at_ms).min(),
            Err(_) => None,
        };
        match earliest {
            Some(at_ms) if at_ms > now_ms => {
                StdDuration::from_millis((at_ms - now_ms) as u64).min(MAX_WAIT)
            }
            Some(_) => StdDuration::from_millis(0),
            None => MAX_WAIT,
        }
    }

    async fn tick(&self) {
        let now = Utc::now();
        let due = match self.store.list_due_cron_jobs(now.timestamp_millis()).await {
            Ok(jobs) => jobs,
            Err(err) => {
                tracing::warn!(error = %err, "cron scheduler: failed to list due jobs");
                return;
            }
        };

        for job in due {
            self.run_job(job).await;
        }
    }

    async fn run_job(&self, job: CronJob) {
        let started_at = Utc::now();
        self.hooks
            .emit(HookEvent::new(
                "cron",
                "job_started",
                json!({"jobId": job.id, "name": job.name, "skillName": job.skill_name}),
            ))
            .await;

        let outcome = self.execute(&job).await;
        let finished_at = Utc::now();
        let duration_ms = (finished_at - started_at).num_milliseconds().max(0);

        let (status, error) = match &outcome {
            Ok(_) => (JobStatus::Ok, None),
            Err(message) => (JobStatus::Error, Some(message.as_str())),
        };

        let normal_next = compute_next_run(&job.schedule, finished_at);
        let next_run_at_ms = match status {
            JobStatus::Ok => normal_next,
            JobStatus::Error => apply_backoff(normal_next, finished_at.timestamp_millis(), job.state.consecutive_errors + 1),
        };

        if let Err(err) = self
            .store
            .record_cron_run(&job.id, started_at.timestamp_millis(), duration_ms, status, error, next_run_at_ms)
            .await
        {
            tracing::warn!(job_id = %job.id, error = %err, "cron scheduler: failed to record run");
        }

        if next_run_at_ms.is_none() && status == JobStatus::Ok {
            if let Err(err) = self.store.set_cron_enabled(&job.id, false).await {
                tracing::warn!(job_id = %job.id, error = %err, "cron scheduler: failed to disable exhausted job");
            }
        }

        self.hooks
            .emit(HookEvent::new(
                "cron",
                "job_finished",
                json!({
                    "jobId": job.id,
                    "name": job.name,
                    "status": matches!(status, JobStatus::Ok),
                    "durationMs": duration_ms,
                    "error": error,
                }),
            ))
            .await;
    }

    async fn execute(&self, job: &CronJob) -> Result<String, String> {
        let skill = self.skills.get(&job.skill_name).await.ok_or_else(|| format!("unknown skill '{}'", job.skill_name))?;

        let preferences = self.store.get_preferences(&job.user_id).await.unwrap_or_default();
        let ctx = chainclaw_types::skill::SkillContext {
            user_id: job.user_id.clone(),
            wallet_address: None,
            chain_ids: job.chain_id.into_iter().collect(),
            preferences,
            channel: Arc::new(HeadlessChannel::new(job.user_id.clone())),
        };

        let outcome = std::panic::AssertUnwindSafe(skill.execute(job.skill_params.clone(), &ctx))
            .catch_unwind()
            .await;
        match outcome {
            Ok(result) if result.success => Ok(result.message),
            Ok(result) => Err(result.message),
            Err(_) => Err("skill panicked".to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_saturates_at_final_step() {
        assert_eq!(backoff_ms(1), 30_000);
        assert_eq!(backoff_ms(5), 3_600_000);
        assert_eq!(backoff_ms(50), 3_600_000);
    }

    #[test]
    fn backoff_floors_next_run_on_error() {
        let now_ms = 1_000_000;
        let normal_next = Some(now_ms + 1_000); // earlier than the backoff floor
        let next = apply_backoff(normal_next, now_ms, 1).unwrap();
        assert_eq!(next, now_ms + 30_000);
    }

    struct NoopSkill;
    #[async_trait::async_trait]
    impl chainclaw_types::skill::Skill for NoopSkill {
        fn name(&self) -> &'static str {
            "noop"
        }
        fn description(&self) -> &'static str {
            "does nothing, always succeeds"
        }
        fn parameter_schema(&self) -> serde_json::Value {
            json!({})
        }
        async fn execute(
            &self,
            _params: serde_json::Value,
            _ctx: &chainclaw_types::skill::SkillContext,
        ) -> chainclaw_types::skill::SkillResult {
            chainclaw_types::skill::SkillResult::ok("done")
        }
    }

    /// spec.md §8 scenario 5: a one-shot `at` job fires exactly once once
    /// its instant is reached, then disables itself with no next run.
    #[tokio::test]
    async fn one_shot_job_fires_once_then_disables() {
        let store = Arc::new(Store::open_in_memory().await.unwrap());
        let skills = SkillRegistry::new();
        skills.register(Arc::new(NoopSkill)).await.unwrap();
        let scheduler = Arc::new(CronScheduler::new(store.clone(), skills, Arc::new(HookBus::new())));

        let at = Utc::now() + chrono::Duration::milliseconds(50);
        let job = store
            .create_cron_job("one shot", "noop", json!({}), "u1", None, chainclaw_types::schedule::Schedule::At { at })
            .await
            .unwrap();
        assert!(job.enabled);
        assert!(job.state.next_run_at_ms.is_some());

        tokio::time::sleep(StdDuration::from_millis(100)).await;
        scheduler.tick().await;

        let fetched = store.get_cron_job(&job.id).await.unwrap();
        assert!(!fetched.enabled);
        assert!(fetched.state.next_run_at_ms.is_none());
        assert_eq!(fetched.state.last_status, Some(JobStatus::Ok));

        // A second tick finds nothing due: the job already fired once.
        scheduler.tick().await;
        let fetched_again = store.get_cron_job(&job.id).await.unwrap();
        assert_eq!(fetched_again.state.last_run_at_ms, fetched.state.last_run_at_ms);
    }
}
