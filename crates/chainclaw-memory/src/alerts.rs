//! Price alert storage (spec.md §3 "Alert", §4.6).

use chainclaw_types::alert::{Alert, AlertStatus, AlertType};
use chrono::{DateTime, Utc};
use rusqlite::params;

use crate::error::StoreResult;
use crate::store::Store;

impl Store {
    pub async fn create_alert(
        &self,
        user_id: &str,
        alert_type: AlertType,
        token: &str,
        threshold: f64,
    ) -> StoreResult<Alert> {
        let conn = self.conn().await;
        let now = Utc::now();
        conn.execute(
            "INSERT INTO alerts (user_id, alert_type, token, threshold, status, created_at, triggered_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, NULL)",
            params![user_id, type_str(alert_type), token, threshold, status_str(AlertStatus::Active), now.to_rfc3339()],
        )?;
        let id = conn.last_insert_rowid();
        Ok(Alert {
            id,
            user_id: user_id.to_string(),
            alert_type,
            token: token.to_string(),
            threshold,
            status: AlertStatus::Active,
            created_at: now,
            triggered_at: None,
        })
    }

    pub async fn list_user_alerts(&self, user_id: &str) -> StoreResult<Vec<Alert>> {
        let conn = self.conn().await;
        let mut stmt = conn.prepare(
            "SELECT id, user_id, alert_type, token, threshold, status, created_at, triggered_at
             FROM alerts WHERE user_id = ?1 ORDER BY id ASC",
        )?;
        let rows = stmt.query_map(params![user_id], row_to_alert)?.collect::<Result<_, _>>()?;
        Ok(rows)
    }

    /// Active alerts, across all users, for the given token (spec.md §4.6
    /// scheduler sweep — one price lookup per token, fanned out to every
    /// waiting alert).
    pub async fn list_active_alerts_for_token(&self, token: &str) -> StoreResult<Vec<Alert>> {
        let conn = self.conn().await;
        let mut stmt = conn.prepare(
            "SELECT id, user_id, alert_type, token, threshold, status, created_at, triggered_at
             FROM alerts WHERE token = ?1 AND status = 'active'",
        )?;
        let rows = stmt.query_map(params![token], row_to_alert)?.collect::<Result<_, _>>()?;
        Ok(rows)
    }

    pub async fn distinct_active_alert_tokens(&self) -> StoreResult<Vec<String>> {
        let conn = self.conn().await;
        let mut stmt = conn.prepare("SELECT DISTINCT token FROM alerts WHERE status = 'active'")?;
        let rows = stmt.query_map([], |row| row.get(0))?.collect::<Result<_, _>>()?;
        Ok(rows)
    }

    /// One-shot fire: moves the alert to Triggered (spec.md §4.6 — alerts do
    /// not re-arm).
    pub async fn trigger_alert(&self, id: i64, triggered_at: DateTime<Utc>) -> StoreResult<()> {
        let conn = self.conn().await;
        conn.execute(
            "UPDATE alerts SET status = ?1, triggered_at = ?2 WHERE id = ?3",
            params![status_str(AlertStatus::Triggered), triggered_at.to_rfc3339(), id],
        )?;
        Ok(())
    }
}

fn type_str(t: AlertType) -> &'static str {
    match t {
        AlertType::PriceAbove => "price_above",
        AlertType::PriceBelow => "price_below",
    }
}

fn parse_type(s: &str) -> AlertType {
    match s {
        "price_below" => AlertType::PriceBelow,
        _ => AlertType::PriceAbove,
    }
}

fn status_str(s: AlertStatus) -> &'static str {
    match s {
        AlertStatus::Active => "active",
        AlertStatus::Triggered => "triggered",
    }
}

fn parse_status(s: &str) -> AlertStatus {
    match s {
        "triggered" => AlertStatus::Triggered,
        _ => AlertStatus::Active,
    }
}

fn row_to_alert(row: &rusqlite::Row<'_>) -> rusqlite::Result<Alert> {
    let created_at: String = row.get(6)?;
    let triggered_at: Option<String> = row.get(7)?;
    Ok(Alert {
        id: row.get(0)?,
        user_id: row.get(1)?,
        alert_type: parse_type(&row.get::<_, String>(2)?),
        token: row.get(3)?,
        threshold: row.get(4)?,
        status: parse_status(&row.get::<_, String>(5)?),
        created_at: DateTime::parse_from_rfc3339(&created_at)
            .map(|dt| dt.with_timezone(&Utc))
            .unwrap_or_else(|_| Utc::now()),
        triggered_at: triggered_at.and_then(|s| {
            DateTime::parse_from_rfc3339(&s).ok().map(|dt| dt.with_timezone(&Utc))
        }),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn create_alert_starts_active() {
        let store = Store::open_in_memory().await.unwrap();
        let alert = store.create_alert("u1", AlertType::PriceAbove, "ETH", 2000.0).await.unwrap();
        assert_eq!(alert.status, AlertStatus::Active);
    }

    #[tokio::test]
    async fn triggered_alert_no_longer_listed_as_active() {
        let store = Store::open_in_memory().await.unwrap();
        let alert = store.create_alert("u1", AlertType::PriceAbove, "ETH", 2000.0).await.unwrap();
        store.trigger_alert(alert.id, Utc::now()).await.unwrap();
        assert!(store.list_active_alerts_for_token("ETH").await.unwrap().is_empty());
        let listed = store.list_user_alerts("u1").await.unwrap();
        assert_eq!(listed[0].status, AlertStatus::Triggered);
    }

    #[tokio::test]
    async fn distinct_tokens_deduplicates_across_users() {
        let store = Store::open_in_memory().await.unwrap();
        store.create_alert("u1", AlertType::PriceAbove, "ETH", 2000.0).await.unwrap();
        store.create_alert("u2", AlertType::PriceBelow, "ETH", 1000.0).await.unwrap();
        let tokens = store.distinct_active_alert_tokens().await.unwrap();
        assert_eq!(tokens, vec!["ETH".to_string()]);
    }
}
