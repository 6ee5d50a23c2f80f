//! DCA job storage (spec.md §3 "DCA job", §4.6).

use chainclaw_types::dca::{DcaFrequency, DcaJob, DcaStatus, DCA_AUTO_PAUSE_FAILURES};
use chrono::{DateTime, Utc};
use rusqlite::params;

use crate::error::StoreResult;
use crate::store::Store;

impl Store {
    #[allow(clippy::too_many_arguments)]
    pub async fn create_dca_job(
        &self,
        user_id: &str,
        from_token: &str,
        to_token: &str,
        amount: &str,
        chain_id: u64,
        frequency: DcaFrequency,
        wallet_address: Option<&str>,
    ) -> StoreResult<DcaJob> {
        let conn = self.conn().await;
        let now = Utc::now();
        conn.execute(
            "INSERT INTO dca_jobs (user_id, from_token, to_token, amount, chain_id, frequency,
                wallet_address, status, last_run_at, consecutive_failures, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, NULL, 0, ?9)",
            params![
                user_id, from_token, to_token, amount, chain_id as i64,
                frequency_str(frequency), wallet_address, status_str(DcaStatus::Active),
                now.to_rfc3339(),
            ],
        )?;
        let id = conn.last_insert_rowid();
        Ok(DcaJob {
            id,
            user_id: user_id.to_string(),
            from_token: from_token.to_string(),
            to_token: to_token.to_string(),
            amount: amount.to_string(),
            chain_id,
            frequency,
            wallet_address: wallet_address.map(str::to_string),
            status: DcaStatus::Active,
            last_run_at: None,
            consecutive_failures: 0,
            created_at: now,
        })
    }

    pub async fn list_user_dca_jobs(&self, user_id: &str) -> StoreResult<Vec<DcaJob>> {
        let conn = self.conn().await;
        let mut stmt = conn.prepare(
            "SELECT id, user_id, from_token, to_token, amount, chain_id, frequency,
                wallet_address, status, last_run_at, consecutive_failures, created_at
             FROM dca_jobs WHERE user_id = ?1 ORDER BY id ASC",
        )?;
        let rows = stmt.query_map(params![user_id], row_to_job)?.collect::<Result<_, _>>()?;
        Ok(rows)
    }

    /// Active jobs whose cadence has elapsed (spec.md §4.6 scheduler sweep).
    pub async fn list_due_dca_jobs(&self, now: DateTime<Utc>) -> StoreResult<Vec<DcaJob>> {
        let conn = self.conn().await;
        let mut stmt = conn.prepare(
            "SELECT id, user_id, from_token, to_token, amount, chain_id, frequency,
                wallet_address, status, last_run_at, consecutive_failures, created_at
             FROM dca_jobs WHERE status = 'active'",
        )?;
        let rows: Vec<DcaJob> = stmt.query_map([], row_to_job)?.collect::<Result<_, _>>()?;
        Ok(rows.into_iter().filter(|j| j.frequency.is_due(j.last_run_at, now)).collect())
    }

    /// Records a successful run: resets the failure streak and stamps
    /// `last_run_at` (spec.md §4.6).
    pub async fn record_dca_success(&self, id: i64, ran_at: DateTime<Utc>) -> StoreResult<()> {
        let conn = self.conn().await;
        conn.execute(
            "UPDATE dca_jobs SET last_run_at = ?1, consecutive_failures = 0 WHERE id = ?2",
            params![ran_at.to_rfc3339(), id],
        )?;
        Ok(())
    }

    /// Records a failed run; auto-pauses the job after
    /// [`DCA_AUTO_PAUSE_FAILURES`] consecutive failures (spec.md §4.6).
    pub async fn record_dca_failure(&self, id: i64, ran_at: DateTime<Utc>) -> StoreResult<DcaStatus> {
        let conn = self.conn().await;
        conn.execute(
            "UPDATE dca_jobs SET last_run_at = ?1, consecutive_failures = consecutive_failures + 1
             WHERE id = ?2",
            params![ran_at.to_rfc3339(), id],
        )?;
        let failures: i64 = conn.query_row(
            "SELECT consecutive_failures FROM dca_jobs WHERE id = ?1",
            params![id],
            |row| row.get(0),
        )?;
        if failures as u32 >= DCA_AUTO_PAUSE_FAILURES {
            conn.execute(
                "UPDATE dca_jobs SET status = ?1 WHERE id = ?2",
                params![status_str(DcaStatus::Paused), id],
            )?;
            Ok(DcaStatus::Paused)
        } else {
            Ok(DcaStatus::Active)
        }
    }

    pub async fn set_dca_status(&self, id: i64, status: DcaStatus) -> StoreResult<()> {
        let conn = self.conn().await;
        conn.execute("UPDATE dca_jobs SET status = ?1 WHERE id = ?2", params![status_str(status), id])?;
        Ok(())
    }
}

fn frequency_str(f: DcaFrequency) -> &'static str {
    match f {
        DcaFrequency::Daily => "daily",
        DcaFrequency::Weekly => "weekly",
        DcaFrequency::Monthly => "monthly",
    }
}

fn parse_frequency(s: &str) -> DcaFrequency {
    match s {
        "weekly" => DcaFrequency::Weekly,
        "monthly" => DcaFrequency::Monthly,
        _ => DcaFrequency::Daily,
    }
}

fn status_str(s: DcaStatus) -> &'static str {
    match s {
        DcaStatus::Active => "active",
        DcaStatus::Paused => "paused",
        DcaStatus::Cancelled => "cancelled",
    }
}

fn parse_status(s: &str) -> DcaStatus {
    match s {
        "paused" => DcaStatus::Paused,
        "cancelled" => DcaStatus::Cancelled,
        _ => DcaStatus::Active,
    }
}

fn row_to_job(row: &rusqlite::Row<'_>) -> rusqlite::Result<DcaJob> {
    let last_run_at: Option<String> = row.get(9)?;
    let created_at: String = row.get(11)?;
    Ok(DcaJob {
        id: row.get(0)?,
        user_id: row.get(1)?,
        from_token: row.get(2)?,
        to_token: row.get(3)?,
        amount: row.get(4)?,
        chain_id: row.get::<_, i64>(5)? as u64,
        frequency: parse_frequency(&row.get::<_, String>(6)?),
        wallet_address: row.get(7)?,
        status: parse_status(&row.get::<_, String>(8)?),
        last_run_at: last_run_at.and_then(|s| {
            DateTime::parse_from_rfc3339(&s).ok().map(|dt| dt.with_timezone(&Utc))
        }),
        consecutive_failures: row.get::<_, i64>(10)? as u32,
        created_at: DateTime::parse_from_rfc3339(&created_at)
            .map(|dt| dt.with_timezone(&Utc))
            .unwrap_or_else(|_| Utc::now()),
    })
}
