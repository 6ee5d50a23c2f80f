//! Daily historical price cache (spec.md §6 `historical_prices`), backing
//! the Backtest Engine's price series and the Data Pipeline's outcome
//! labelling (SPEC_FULL.md §B).

use chainclaw_providers::HistoricalPricePoint;
use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::{params, OptionalExtension};

use crate::error::StoreResult;
use crate::store::Store;

impl Store {
    pub async fn cache_historical_price(&self, token: &str, day: NaiveDate, price_usd: f64) -> StoreResult<()> {
        let conn = self.conn().await;
        conn.execute(
            "INSERT INTO historical_prices (token, day, price_usd, fetched_at) VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(token, day) DO UPDATE SET price_usd = excluded.price_usd, fetched_at = excluded.fetched_at",
            params![token, day.to_string(), price_usd, Utc::now().to_rfc3339()],
        )?;
        Ok(())
    }

    pub async fn get_historical_price(&self, token: &str, day: NaiveDate) -> StoreResult<Option<f64>> {
        let conn = self.conn().await;
        let price = conn
            .query_row(
                "SELECT price_usd FROM historical_prices WHERE token = ?1 AND day = ?2",
                params![token, day.to_string()],
                |row| row.get(0),
            )
            .optional()?;
        Ok(price)
    }

    /// Ordered ascending by day — the series a backtest replays
    /// (spec.md §4.10).
    pub async fn historical_price_series(
        &self,
        token: &str,
        from: NaiveDate,
        to: NaiveDate,
    ) -> StoreResult<Vec<HistoricalPricePoint>> {
        let conn = self.conn().await;
        let mut stmt = conn.prepare(
            "SELECT day, price_usd FROM historical_prices WHERE token = ?1 AND day >= ?2 AND day <= ?3
             ORDER BY day ASC",
        )?;
        let rows = stmt
            .query_map(params![token, from.to_string(), to.to_string()], |row| {
                let day: String = row.get(0)?;
                Ok(HistoricalPricePoint {
                    day: day.parse().unwrap_or(from),
                    price_usd: row.get(1)?,
                })
            })?
            .collect::<Result<_, _>>()?;
        Ok(rows)
    }

    pub async fn historical_prices_older_than(&self, cutoff: DateTime<Utc>) -> StoreResult<usize> {
        let conn = self.conn().await;
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM historical_prices WHERE fetched_at < ?1",
            params![cutoff.to_rfc3339()],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn date(days_from_epoch: i64) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 1, 1).unwrap() + Duration::days(days_from_epoch)
    }

    #[tokio::test]
    async fn cache_then_fetch_single_day() {
        let store = Store::open_in_memory().await.unwrap();
        store.cache_historical_price("ETH", date(0), 2000.0).await.unwrap();
        assert_eq!(store.get_historical_price("ETH", date(0)).await.unwrap(), Some(2000.0));
        assert_eq!(store.get_historical_price("ETH", date(1)).await.unwrap(), None);
    }

    #[tokio::test]
    async fn series_is_ordered_ascending() {
        let store = Store::open_in_memory().await.unwrap();
        store.cache_historical_price("ETH", date(2), 2100.0).await.unwrap();
        store.cache_historical_price("ETH", date(0), 2000.0).await.unwrap();
        store.cache_historical_price("ETH", date(1), 2050.0).await.unwrap();
        let series = store.historical_price_series("ETH", date(0), date(2)).await.unwrap();
        assert_eq!(series.len(), 3);
        assert_eq!(series[0].price_usd, 2000.0);
        assert_eq!(series[2].price_usd, 2100.0);
    }

    #[tokio::test]
    async fn upsert_overwrites_same_day() {
        let store = Store::open_in_memory().await.unwrap();
        store.cache_historical_price("ETH", date(0), 2000.0).await.unwrap();
        store.cache_historical_price("ETH", date(0), 2050.0).await.unwrap();
        assert_eq!(store.get_historical_price("ETH", date(0)).await.unwrap(), Some(2050.0));
    }
}
