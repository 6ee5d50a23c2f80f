//! Outbound delivery queue (SPEC_FULL.md §B "Delivery queue") — holds
//! `sendReply`/notifier payloads that could not be delivered immediately
//! because the channel adapter was offline. `chainclaw-server`'s router
//! drains this opportunistically per user; entries older than 7 days are
//! reaped by [`crate::retention`].

use chrono::{DateTime, Utc};
use rusqlite::{params, OptionalExtension};

use crate::error::StoreResult;
use crate::store::Store;

#[derive(Debug, Clone)]
pub struct QueuedDelivery {
    pub id: i64,
    pub user_id: String,
    pub channel_id: Option<String>,
    pub platform: Option<String>,
    pub text: String,
    pub created_at: DateTime<Utc>,
    pub delivered_at: Option<DateTime<Utc>>,
}

impl Store {
    pub async fn enqueue_delivery(
        &self,
        user_id: &str,
        channel_id: Option<&str>,
        platform: Option<&str>,
        text: &str,
    ) -> StoreResult<i64> {
        let conn = self.conn().await;
        conn.execute(
            "INSERT INTO delivery_queue (user_id, channel_id, platform, text, created_at, delivered_at)
             VALUES (?1, ?2, ?3, ?4, ?5, NULL)",
            params![user_id, channel_id, platform, text, Utc::now().to_rfc3339()],
        )?;
        Ok(conn.last_insert_rowid())
    }

    /// Not-yet-delivered entries for one user, oldest first.
    pub async fn pending_deliveries(&self, user_id: &str) -> StoreResult<Vec<QueuedDelivery>> {
        let conn = self.conn().await;
        let mut stmt = conn.prepare(
            "SELECT id, user_id, channel_id, platform, text, created_at, delivered_at
             FROM delivery_queue WHERE user_id = ?1 AND delivered_at IS NULL ORDER BY id ASC",
        )?;
        let rows = stmt.query_map(params![user_id], row_to_delivery)?.collect::<Result<_, _>>()?;
        Ok(rows)
    }

    pub async fn mark_delivered(&self, id: i64) -> StoreResult<()> {
        let conn = self.conn().await;
        conn.execute(
            "UPDATE delivery_queue SET delivered_at = ?1 WHERE id = ?2",
            params![Utc::now().to_rfc3339(), id],
        )?;
        Ok(())
    }

    pub async fn delivery_count(&self, user_id: &str) -> StoreResult<usize> {
        let conn = self.conn().await;
        let count: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM delivery_queue WHERE user_id = ?1 AND delivered_at IS NULL",
                params![user_id],
                |row| row.get(0),
            )
            .optional()?
            .unwrap_or(0);
        Ok(count as usize)
    }
}

fn row_to_delivery(row: &rusqlite::Row<'_>) -> rusqlite::Result<QueuedDelivery> {
    let created_at: String = row.get(5)?;
    let delivered_at: Option<String> = row.get(6)?;
    Ok(QueuedDelivery {
        id: row.get(0)?,
        user_id: row.get(1)?,
        channel_id: row.get(2)?,
        platform: row.get(3)?,
        text: row.get(4)?,
        created_at: DateTime::parse_from_rfc3339(&created_at)
            .map(|dt| dt.with_timezone(&Utc))
            .unwrap_or_else(|_| Utc::now()),
        delivered_at: delivered_at.and_then(|s| {
            DateTime::parse_from_rfc3339(&s).ok().map(|dt| dt.with_timezone(&Utc))
        }),
    })
}
