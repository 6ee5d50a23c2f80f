//! Marketplace subscription lifecycle (SPEC_FULL.md §B "Marketplace" —
//! generalising spec.md §4.9's start/pause/resume/stop to subscribe/
//! unsubscribe over `marketplace_subscriptions`).

use chainclaw_types::agent::{AgentMode, MarketplaceSubscription, SubscriptionStatus};
use chrono::{DateTime, Utc};
use rusqlite::params;
use uuid::Uuid;

use crate::error::{StoreError, StoreResult};
use crate::store::Store;

impl Store {
    pub async fn subscribe(
        &self,
        user_id: &str,
        agent_name: &str,
        agent_version: &str,
        mode: AgentMode,
    ) -> StoreResult<MarketplaceSubscription> {
        let sub = MarketplaceSubscription {
            id: Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            agent_name: agent_name.to_string(),
            agent_version: agent_version.to_string(),
            mode,
            status: SubscriptionStatus::Active,
            created_at: Utc::now(),
            unsubscribed_at: None,
        };
        let conn = self.conn().await;
        conn.execute(
            "INSERT INTO marketplace_subscriptions (id, user_id, agent_name, agent_version, mode,
                status, created_at, unsubscribed_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, NULL)",
            params![
                sub.id, sub.user_id, sub.agent_name, sub.agent_version, mode_str(mode),
                status_str(SubscriptionStatus::Active), sub.created_at.to_rfc3339(),
            ],
        )?;
        Ok(sub)
    }

    pub async fn list_subscriptions(&self, user_id: &str) -> StoreResult<Vec<MarketplaceSubscription>> {
        let conn = self.conn().await;
        let mut stmt = conn.prepare(
            "SELECT id, user_id, agent_name, agent_version, mode, status, created_at, unsubscribed_at
             FROM marketplace_subscriptions WHERE user_id = ?1 ORDER BY created_at ASC",
        )?;
        let rows = stmt.query_map(params![user_id], row_to_sub)?.collect::<Result<_, _>>()?;
        Ok(rows)
    }

    pub async fn unsubscribe(&self, id: &str) -> StoreResult<()> {
        let conn = self.conn().await;
        let updated = conn.execute(
            "UPDATE marketplace_subscriptions SET status = ?1, unsubscribed_at = ?2 WHERE id = ?3",
            params![status_str(SubscriptionStatus::Unsubscribed), Utc::now().to_rfc3339(), id],
        )?;
        if updated == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }
}

fn mode_str(m: AgentMode) -> &'static str {
    match m {
        AgentMode::DryRun => "dry_run",
        AgentMode::Live => "live",
    }
}

fn parse_mode(s: &str) -> AgentMode {
    match s {
        "live" => AgentMode::Live,
        _ => AgentMode::DryRun,
    }
}

fn status_str(s: SubscriptionStatus) -> &'static str {
    match s {
        SubscriptionStatus::Active => "active",
        SubscriptionStatus::Unsubscribed => "unsubscribed",
    }
}

fn parse_status(s: &str) -> SubscriptionStatus {
    match s {
        "unsubscribed" => SubscriptionStatus::Unsubscribed,
        _ => SubscriptionStatus::Active,
    }
}

fn row_to_sub(row: &rusqlite::Row<'_>) -> rusqlite::Result<MarketplaceSubscription> {
    let created_at: String = row.get(6)?;
    let unsubscribed_at: Option<String> = row.get(7)?;
    Ok(MarketplaceSubscription {
        id: row.get(0)?,
        user_id: row.get(1)?,
        agent_name: row.get(2)?,
        agent_version: row.get(3)?,
        mode: parse_mode(&row.get::<_, String>(4)?),
        status: parse_status(&row.get::<_, String>(5)?),
        created_at: DateTime::parse_from_rfc3339(&created_at)
            .map(|dt| dt.with_timezone(&Utc))
            .unwrap_or_else(|_| Utc::now()),
        unsubscribed_at: unsubscribed_at.and_then(|s| {
            DateTime::parse_from_rfc3339(&s).ok().map(|dt| dt.with_timezone(&Utc))
        }),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn subscribe_then_list() {
        let store = Store::open_in_memory().await.unwrap();
        store.subscribe("u1", "trend-follower", "1.0.0", AgentMode::DryRun).await.unwrap();
        let subs = store.list_subscriptions("u1").await.unwrap();
        assert_eq!(subs.len(), 1);
        assert_eq!(subs[0].status, SubscriptionStatus::Active);
    }

    #[tokio::test]
    async fn unsubscribe_marks_terminal() {
        let store = Store::open_in_memory().await.unwrap();
        let sub = store.subscribe("u1", "trend-follower", "1.0.0", AgentMode::Live).await.unwrap();
        store.unsubscribe(&sub.id).await.unwrap();
        let subs = store.list_subscriptions("u1").await.unwrap();
        assert_eq!(subs[0].status, SubscriptionStatus::Unsubscribed);
        assert!(subs[0].unsubscribed_at.is_some());
    }

    #[tokio::test]
    async fn unsubscribe_unknown_id_errors() {
        let store = Store::open_in_memory().await.unwrap();
        assert!(store.unsubscribe("nope").await.is_err());
    }
}
