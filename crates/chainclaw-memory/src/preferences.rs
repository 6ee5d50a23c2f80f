//! Per-user preferences (spec.md §3 "Preferences", §8 round-trip law).

use chainclaw_types::user::{Preferences, PreferencesPatch};
use rusqlite::{params, OptionalExtension};

use crate::error::StoreResult;
use crate::store::Store;

impl Store {
    /// Returns [`Preferences::default`] for unknown users (spec.md §3).
    pub async fn get_preferences(&self, user_id: &str) -> StoreResult<Preferences> {
        let conn = self.conn().await;
        let row = conn
            .query_row(
                "SELECT default_chain_id, slippage_tolerance_pct, confirmation_required_usd,
                        max_transactions_per_day
                 FROM user_preferences WHERE user_id = ?1",
                params![user_id],
                |row| {
                    Ok(Preferences {
                        default_chain_id: row.get::<_, i64>(0)? as u64,
                        slippage_tolerance_pct: row.get(1)?,
                        confirmation_required_usd: row.get(2)?,
                        max_transactions_per_day: row.get::<_, i64>(3)? as u32,
                    })
                },
            )
            .optional()?;
        Ok(row.unwrap_or_default())
    }

    /// Upsert only overwrites the fields present in `patch` (spec.md §3, §8).
    pub async fn set_preferences(&self, user_id: &str, patch: &PreferencesPatch) -> StoreResult<Preferences> {
        let current = self.get_preferences(user_id).await?;
        let merged = current.merged(patch);
        let conn = self.conn().await;
        conn.execute(
            "INSERT INTO user_preferences
                (user_id, default_chain_id, slippage_tolerance_pct, confirmation_required_usd, max_transactions_per_day)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT(user_id) DO UPDATE SET
                default_chain_id = excluded.default_chain_id,
                slippage_tolerance_pct = excluded.slippage_tolerance_pct,
                confirmation_required_usd = excluded.confirmation_required_usd,
                max_transactions_per_day = excluded.max_transactions_per_day",
            params![
                user_id,
                merged.default_chain_id as i64,
                merged.slippage_tolerance_pct,
                merged.confirmation_required_usd,
                merged.max_transactions_per_day as i64,
            ],
        )?;
        Ok(merged)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn unknown_user_gets_defaults() {
        let store = Store::open_in_memory().await.unwrap();
        assert_eq!(store.get_preferences("nobody").await.unwrap(), Preferences::default());
    }

    #[tokio::test]
    async fn set_then_get_round_trips_partial_patch() {
        let store = Store::open_in_memory().await.unwrap();
        let patch = PreferencesPatch { slippage_tolerance_pct: Some(2.0), ..Default::default() };
        store.set_preferences("u1", &patch).await.unwrap();
        let fetched = store.get_preferences("u1").await.unwrap();
        assert_eq!(fetched.slippage_tolerance_pct, 2.0);
        assert_eq!(fetched.default_chain_id, Preferences::default().default_chain_id);

        let patch2 = PreferencesPatch { default_chain_id: Some(10), ..Default::default() };
        store.set_preferences("u1", &patch2).await.unwrap();
        let fetched2 = store.get_preferences("u1").await.unwrap();
        assert_eq!(fetched2.default_chain_id, 10);
        assert_eq!(fetched2.slippage_tolerance_pct, 2.0);
    }
}
