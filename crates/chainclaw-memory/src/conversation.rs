//! Conversation history (spec.md §3 "Conversation entry", §5, §8).
//!
//! Append-only; hard-capped at [`CONVERSATION_HISTORY_CAP`] rows per user,
//! oldest rows pruned after every insert that exceeds the cap. Retrieval is
//! always oldest-first.

use chainclaw_types::user::{ConversationEntry, ConversationRole, CONVERSATION_HISTORY_CAP};
use chrono::{DateTime, Utc};
use rusqlite::{params, OptionalExtension};

use crate::error::StoreResult;
use crate::store::Store;

impl Store {
    pub async fn add_message(
        &self,
        user_id: &str,
        role: ConversationRole,
        content: &str,
    ) -> StoreResult<ConversationEntry> {
        let conn = self.conn().await;
        let now = Utc::now();
        conn.execute(
            "INSERT INTO conversations (user_id, role, content, created_at) VALUES (?1, ?2, ?3, ?4)",
            params![user_id, role_str(role), content, now.to_rfc3339()],
        )?;
        let id = conn.last_insert_rowid();

        // Prune anything beyond the cap (spec.md §3, §5): keep the most
        // recent CONVERSATION_HISTORY_CAP rows for this user.
        conn.execute(
            "DELETE FROM conversations WHERE user_id = ?1 AND id NOT IN (
                SELECT id FROM conversations WHERE user_id = ?1
                ORDER BY id DESC LIMIT ?2
            )",
            params![user_id, CONVERSATION_HISTORY_CAP as i64],
        )?;

        Ok(ConversationEntry { id, user_id: user_id.to_string(), role, content: content.to_string(), created_at: now })
    }

    /// Oldest-first, bounded to the last `limit` entries (spec.md §3, §4.3
    /// step 2: "fetch the last N messages").
    pub async fn get_history(&self, user_id: &str, limit: usize) -> StoreResult<Vec<ConversationEntry>> {
        let conn = self.conn().await;
        let mut stmt = conn.prepare(
            "SELECT id, user_id, role, content, created_at FROM conversations
             WHERE user_id = ?1 ORDER BY id DESC LIMIT ?2",
        )?;
        let mut rows: Vec<ConversationEntry> = stmt
            .query_map(params![user_id, limit as i64], row_to_entry)?
            .collect::<Result<_, _>>()?;
        rows.reverse();
        Ok(rows)
    }

    pub async fn clear_history(&self, user_id: &str) -> StoreResult<()> {
        let conn = self.conn().await;
        conn.execute("DELETE FROM conversations WHERE user_id = ?1", params![user_id])?;
        Ok(())
    }

    pub async fn history_len(&self, user_id: &str) -> StoreResult<usize> {
        let conn = self.conn().await;
        let count: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM conversations WHERE user_id = ?1",
                params![user_id],
                |row| row.get(0),
            )
            .optional()?
            .unwrap_or(0);
        Ok(count as usize)
    }
}

fn role_str(role: ConversationRole) -> &'static str {
    match role {
        ConversationRole::User => "user",
        ConversationRole::Assistant => "assistant",
        ConversationRole::System => "system",
    }
}

fn parse_role(s: &str) -> ConversationRole {
    match s {
        "assistant" => ConversationRole::Assistant,
        "system" => ConversationRole::System,
        _ => ConversationRole::User,
    }
}

fn row_to_entry(row: &rusqlite::Row<'_>) -> rusqlite::Result<ConversationEntry> {
    let created_at: String = row.get(4)?;
    Ok(ConversationEntry {
        id: row.get(0)?,
        user_id: row.get(1)?,
        role: parse_role(&row.get::<_, String>(2)?),
        content: row.get(3)?,
        created_at: DateTime::parse_from_rfc3339(&created_at)
            .map(|dt| dt.with_timezone(&Utc))
            .unwrap_or_else(|_| Utc::now()),
    })
}
