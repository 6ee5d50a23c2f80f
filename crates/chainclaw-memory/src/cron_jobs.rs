//! Cron job storage (spec.md §3 "Cron job", §4.5).

use chainclaw_types::schedule::{compute_next_run, CronJob, JobState, JobStatus, Schedule};
use chrono::Utc;
use rusqlite::params;
use uuid::Uuid;

use crate::error::{StoreError, StoreResult};
use crate::store::Store;

impl Store {
    /// Seeds the job's first `next_run_at_ms` via [`compute_next_run`] at
    /// creation time (spec.md §4.5 step 3), rather than leaving it `NULL`
    /// until some later pass computes it — `list_due_cron_jobs` only ever
    /// considers jobs with a non-null next run, so a freshly created job
    /// that never gets one would never fire. A one-shot `at` schedule
    /// already in the past yields no next run and the job is created
    /// disabled.
    pub async fn create_cron_job(
        &self,
        name: &str,
        skill_name: &str,
        skill_params: serde_json::Value,
        user_id: &str,
        chain_id: Option<u64>,
        schedule: Schedule,
    ) -> StoreResult<CronJob> {
        let created_at = Utc::now();
        let next_run_at_ms = compute_next_run(&schedule, created_at);
        let enabled = next_run_at_ms.is_some();
        let job = CronJob {
            id: Uuid::new_v4().to_string(),
            name: name.to_string(),
            skill_name: skill_name.to_string(),
            skill_params,
            user_id: user_id.to_string(),
            chain_id,
            schedule,
            enabled,
            state: JobState { next_run_at_ms, ..JobState::default() },
            created_at,
        };
        let conn = self.conn().await;
        conn.execute(
            "INSERT INTO cron_jobs (id, name, skill_name, skill_params, user_id, chain_id, schedule,
                enabled, next_run_at_ms, last_run_at_ms, last_status, last_error, last_duration_ms,
                consecutive_errors, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, NULL, NULL, NULL, NULL, 0, ?10)",
            params![
                job.id, job.name, job.skill_name,
                serde_json::to_string(&job.skill_params).map_err(|e| StoreError::Validation(e.to_string()))?,
                job.user_id, job.chain_id.map(|c| c as i64),
                serde_json::to_string(&job.schedule).map_err(|e| StoreError::Validation(e.to_string()))?,
                job.enabled, job.state.next_run_at_ms,
                job.created_at.to_rfc3339(),
            ],
        )?;
        Ok(job)
    }

    pub async fn get_cron_job(&self, id: &str) -> StoreResult<CronJob> {
        let conn = self.conn().await;
        conn.query_row(
            "SELECT id, name, skill_name, skill_params, user_id, chain_id, schedule, enabled,
                next_run_at_ms, last_run_at_ms, last_status, last_error, last_duration_ms,
                consecutive_errors, created_at
             FROM cron_jobs WHERE id = ?1",
            params![id],
            row_to_job,
        )
        .map_err(|e| match e {
            rusqlite::Error::QueryReturnedNoRows => StoreError::NotFound,
            other => StoreError::Database(other),
        })
    }

    pub async fn list_user_cron_jobs(&self, user_id: &str) -> StoreResult<Vec<CronJob>> {
        let conn = self.conn().await;
        let mut stmt = conn.prepare(
            "SELECT id, name, skill_name, skill_params, user_id, chain_id, schedule, enabled,
                next_run_at_ms, last_run_at_ms, last_status, last_error, last_duration_ms,
                consecutive_errors, created_at
             FROM cron_jobs WHERE user_id = ?1 ORDER BY created_at ASC",
        )?;
        let rows = stmt.query_map(params![user_id], row_to_job)?.collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// Enabled jobs due to run at or before `now_ms` (spec.md §4.5 scheduler
    /// tick).
    pub async fn list_due_cron_jobs(&self, now_ms: i64) -> StoreResult<Vec<CronJob>> {
        let conn = self.conn().await;
        let mut stmt = conn.prepare(
            "SELECT id, name, skill_name, skill_params, user_id, chain_id, schedule, enabled,
                next_run_at_ms, last_run_at_ms, last_status, last_error, last_duration_ms,
                consecutive_errors, created_at
             FROM cron_jobs WHERE enabled = 1 AND next_run_at_ms IS NOT NULL AND next_run_at_ms <= ?1",
        )?;
        let rows = stmt.query_map(params![now_ms], row_to_job)?.collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    pub async fn set_cron_next_run(&self, id: &str, next_run_at_ms: Option<i64>) -> StoreResult<()> {
        let conn = self.conn().await;
        conn.execute("UPDATE cron_jobs SET next_run_at_ms = ?1 WHERE id = ?2", params![next_run_at_ms, id])?;
        Ok(())
    }

    pub async fn record_cron_run(
        &self,
        id: &str,
        ran_at_ms: i64,
        duration_ms: i64,
        status: JobStatus,
        error: Option<&str>,
        next_run_at_ms: Option<i64>,
    ) -> StoreResult<()> {
        let conn = self.conn().await;
        let consecutive_errors_expr = match status {
            JobStatus::Ok => "0",
            JobStatus::Error => "consecutive_errors + 1",
        };
        conn.execute(
            &format!(
                "UPDATE cron_jobs SET last_run_at_ms = ?1, last_duration_ms = ?2, last_status = ?3,
                    last_error = ?4, next_run_at_ms = ?5, consecutive_errors = {consecutive_errors_expr}
                 WHERE id = ?6"
            ),
            params![ran_at_ms, duration_ms, status_str(status), error, next_run_at_ms, id],
        )?;
        Ok(())
    }

    pub async fn set_cron_enabled(&self, id: &str, enabled: bool) -> StoreResult<()> {
        let conn = self.conn().await;
        conn.execute("UPDATE cron_jobs SET enabled = ?1 WHERE id = ?2", params![enabled, id])?;
        Ok(())
    }
}

fn status_str(s: JobStatus) -> &'static str {
    match s {
        JobStatus::Ok => "ok",
        JobStatus::Error => "error",
    }
}

fn parse_status(s: &str) -> JobStatus {
    match s {
        "error" => JobStatus::Error,
        _ => JobStatus::Ok,
    }
}

fn row_to_job(row: &rusqlite::Row<'_>) -> rusqlite::Result<CronJob> {
    let skill_params_raw: String = row.get(3)?;
    let schedule_raw: String = row.get(6)?;
    let created_at: String = row.get(14)?;
    let last_status: Option<String> = row.get(10)?;

    let to_conv_err = |col: usize, e: serde_json::Error| {
        rusqlite::Error::FromSqlConversionFailure(col, rusqlite::types::Type::Text, Box::new(e))
    };
    let skill_params = serde_json::from_str(&skill_params_raw).map_err(|e| to_conv_err(3, e))?;
    let schedule: Schedule = serde_json::from_str(&schedule_raw).map_err(|e| to_conv_err(6, e))?;

    Ok(CronJob {
        id: row.get(0)?,
        name: row.get(1)?,
        skill_name: row.get(2)?,
        skill_params,
        user_id: row.get(4)?,
        chain_id: row.get::<_, Option<i64>>(5)?.map(|c| c as u64),
        schedule,
        enabled: row.get(7)?,
        state: JobState {
            next_run_at_ms: row.get(8)?,
            last_run_at_ms: row.get(9)?,
            last_status: last_status.map(|s| parse_status(&s)),
            last_error: row.get(11)?,
            last_duration_ms: row.get(12)?,
            consecutive_errors: row.get::<_, i64>(13)? as u32,
        },
        created_at: chrono::DateTime::parse_from_rfc3339(&created_at)
            .map(|dt| dt.with_timezone(&Utc))
            .unwrap_or_else(|_| Utc::now()),
    })
}
