//! Token-safety report cache (spec.md §3 "Risk report cache", §4.8).
//!
//! Keyed by `(address, chainId)`; entries are retained for 7 days (spec.md
//! §5) and reaped by the DB size monitor in [`crate::retention`], not by a
//! freshness check here — a cache hit is always honored.

use chainclaw_providers::TokenSafetyReport;
use chrono::Utc;
use rusqlite::{params, OptionalExtension};

use crate::error::{StoreError, StoreResult};
use crate::store::Store;

impl Store {
    pub async fn cache_risk_report(
        &self,
        address: &str,
        chain_id: u64,
        report: &TokenSafetyReport,
    ) -> StoreResult<()> {
        let conn = self.conn().await;
        conn.execute(
            "INSERT INTO risk_cache (address, chain_id, report, cached_at) VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(address, chain_id) DO UPDATE SET report = excluded.report, cached_at = excluded.cached_at",
            params![
                address.to_lowercase(),
                chain_id as i64,
                serde_json::to_string(report).map_err(|e| StoreError::Validation(e.to_string()))?,
                Utc::now().to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    /// `None` on cache miss (spec.md §4.8); entries are never evicted here
    /// for staleness, only by age via the retention job.
    pub async fn get_cached_risk_report(
        &self,
        address: &str,
        chain_id: u64,
    ) -> StoreResult<Option<TokenSafetyReport>> {
        let conn = self.conn().await;
        let row: Option<String> = conn
            .query_row(
                "SELECT report FROM risk_cache WHERE address = ?1 AND chain_id = ?2",
                params![address.to_lowercase(), chain_id as i64],
                |row| row.get(0),
            )
            .optional()?;
        let Some(report_raw) = row else { return Ok(None) };
        let report = serde_json::from_str(&report_raw).map_err(|e| StoreError::Validation(e.to_string()))?;
        Ok(Some(report))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn cache_hit_returns_report() {
        let store = Store::open_in_memory().await.unwrap();
        let report = TokenSafetyReport { honeypot: true, ..Default::default() };
        store.cache_risk_report("0xABC", 1, &report).await.unwrap();
        let cached = store.get_cached_risk_report("0xabc", 1).await.unwrap();
        assert!(cached.unwrap().honeypot);
    }

    #[tokio::test]
    async fn cache_miss_for_unknown_address() {
        let store = Store::open_in_memory().await.unwrap();
        assert!(store.get_cached_risk_report("0xnope", 1).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn upsert_overwrites_existing_entry() {
        let store = Store::open_in_memory().await.unwrap();
        let first = TokenSafetyReport { honeypot: true, ..Default::default() };
        store.cache_risk_report("0xabc", 1, &first).await.unwrap();
        let second = TokenSafetyReport { honeypot: false, buy_tax_pct: 1.5, ..Default::default() };
        store.cache_risk_report("0xabc", 1, &second).await.unwrap();
        let cached = store.get_cached_risk_report("0xabc", 1).await.unwrap().unwrap();
        assert!(!cached.honeypot);
        assert_eq!(cached.buy_tax_pct, 1.5);
    }
}
