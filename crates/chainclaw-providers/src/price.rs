//! Price oracle boundary (spec.md §6): `getTokenPrice(symbol) -> usd?`,
//! stablecoins return `1.0` without a network call, others are cached 60s.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::sync::RwLock;

const STABLECOINS: &[&str] = &["USDC", "USDT", "DAI", "BUSD", "TUSD", "USDP", "FRAX"];
const CACHE_TTL: Duration = Duration::from_secs(60);

/// The underlying network fetch, implemented by a concrete pricing
/// collaborator (out of scope per spec.md §1); [`PriceOracle`] wraps it
/// with the stablecoin short-circuit and the 60s cache.
#[async_trait]
pub trait PriceFeed: Send + Sync {
    async fn fetch_price(&self, symbol: &str) -> anyhow::Result<Option<f64>>;
}

struct CacheEntry {
    price: f64,
    fetched_at: Instant,
}

pub struct PriceOracle {
    feed: Arc<dyn PriceFeed>,
    cache: RwLock<HashMap<String, CacheEntry>>,
}

impl PriceOracle {
    pub fn new(feed: Arc<dyn PriceFeed>) -> Self {
        Self { feed, cache: RwLock::new(HashMap::new()) }
    }

    fn is_stablecoin(symbol: &str) -> bool {
        STABLECOINS.iter().any(|s| s.eq_ignore_ascii_case(symbol))
    }

    pub async fn get_token_price(&self, symbol: &str) -> anyhow::Result<Option<f64>> {
        if Self::is_stablecoin(symbol) {
            return Ok(Some(1.0));
        }
        let key = symbol.to_ascii_uppercase();
        if let Some(entry) = self.cache.read().await.get(&key) {
            if entry.fetched_at.elapsed() < CACHE_TTL {
                return Ok(Some(entry.price));
            }
        }
        let fetched = self.feed.fetch_price(&key).await?;
        if let Some(price) = fetched {
            self.cache
                .write()
                .await
                .insert(key, CacheEntry { price, fetched_at: Instant::now() });
        }
        Ok(fetched)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    struct CountingFeed {
        calls: AtomicU32,
        price: f64,
    }

    #[async_trait]
    impl PriceFeed for CountingFeed {
        async fn fetch_price(&self, _symbol: &str) -> anyhow::Result<Option<f64>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(Some(self.price))
        }
    }

    #[tokio::test]
    async fn stablecoins_never_hit_the_network() {
        let feed = Arc::new(CountingFeed { calls: AtomicU32::new(0), price: 1.0 });
        let oracle = PriceOracle::new(feed.clone());
        assert_eq!(oracle.get_token_price("USDC").await.unwrap(), Some(1.0));
        assert_eq!(oracle.get_token_price("usdt").await.unwrap(), Some(1.0));
        assert_eq!(feed.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn non_stablecoin_price_is_cached() {
        let feed = Arc::new(CountingFeed { calls: AtomicU32::new(0), price: 3000.0 });
        let oracle = PriceOracle::new(feed.clone());
        assert_eq!(oracle.get_token_price("ETH").await.unwrap(), Some(3000.0));
        assert_eq!(oracle.get_token_price("ETH").await.unwrap(), Some(3000.0));
        assert_eq!(feed.calls.load(Ordering::SeqCst), 1);
    }
}
