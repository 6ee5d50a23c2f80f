//! Alert Engine (spec.md §4.6): a short-interval ticker that fires one-shot
//! price alerts and delivers a notification through the injected
//! [`Notifier`].
//!
//! Grounded on `chainclaw-server::cron_scheduler`'s tick-loop shape,
//! specialised to the per-token fan-out spec.md §4.6 calls for ("one price
//! lookup per token, fanned out to every waiting alert") via
//! `chainclaw-memory::alerts::distinct_active_alert_tokens`.

use std::sync::Arc;
use std::time::Duration as StdDuration;

use chainclaw_memory::Store;
use chainclaw_providers::PriceOracle;
use chainclaw_types::alert::{Alert, AlertType};
use chrono::Utc;

use crate::headless::Notifier;

/// Interval between alert sweeps (spec.md §4.6: "each tick (short interval,
/// e.g. 30 s)").
pub const TICK_INTERVAL: StdDuration = StdDuration::from_secs(30);

pub struct AlertEngine {
    store: Arc<Store>,
    prices: Arc<PriceOracle>,
    notifier: Arc<dyn Notifier>,
}

impl AlertEngine {
    pub fn new(store: Arc<Store>, prices: Arc<PriceOracle>, notifier: Arc<dyn Notifier>) -> Self {
        Self { store, prices, notifier }
    }

    pub async fn run(self: Arc<Self>) {
        let mut interval = tokio::time::interval(TICK_INTERVAL);
        loop {
            interval.tick().await;
            self.tick().await;
        }
    }

    async fn tick(&self) {
        let tokens = match self.store.distinct_active_alert_tokens().await {
            Ok(tokens) => tokens,
            Err(err) => {
                tracing::warn!(error = %err, "alert engine: failed to list active alert tokens");
                return;
            }
        };

        for token in tokens {
            let price = match self.prices.get_token_price(&token).await {
                Ok(Some(price)) => price,
                // Price lookup failures (and unknown tokens) are skipped
                // silently with no state change (spec.md §4.6).
                Ok(None) => continue,
                Err(err) => {
                    tracing::debug!(token = %token, error = %err, "alert engine: price lookup failed, skipping");
                    continue;
                }
            };

            let alerts = match self.store.list_active_alerts_for_token(&token).await {
                Ok(alerts) => alerts,
                Err(err) => {
                    tracing::warn!(token = %token, error = %err, "alert engine: failed to list alerts for token");
                    continue;
                }
            };

            for alert in alerts {
                if Self::should_fire(&alert, price) {
                    self.fire(alert, price).await;
                }
            }
        }
    }

    fn should_fire(alert: &Alert, price: f64) -> bool {
        match alert.alert_type {
            AlertType::PriceAbove => price >= alert.threshold,
            AlertType::PriceBelow => price <= alert.threshold,
        }
    }

    async fn fire(&self, alert: Alert, price: f64) {
        let now = Utc::now();
        if let Err(err) = self.store.trigger_alert(alert.id, now).await {
            tracing::warn!(alert_id = alert.id, error = %err, "alert engine: failed to mark alert triggered");
            return;
        }
        let direction = match alert.alert_type {
            AlertType::PriceAbove => "rose above",
            AlertType::PriceBelow => "fell below",
        };
        let message =
            format!("Alert Triggered: {} {direction} {} (now {price:.4})", alert.token, alert.threshold);
        if let Err(err) = self.notifier.notify(&alert.user_id, &message).await {
            tracing::warn!(alert_id = alert.id, error = %err, "alert engine: notification delivery failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chainclaw_providers::PriceFeed;
    use chainclaw_types::alert::AlertStatus;
    use std::sync::Mutex;

    struct FixedFeed(f64);
    #[async_trait]
    impl PriceFeed for FixedFeed {
        async fn fetch_price(&self, _symbol: &str) -> anyhow::Result<Option<f64>> {
            Ok(Some(self.0))
        }
    }

    struct RecordingNotifier {
        sent: Mutex<Vec<(String, String)>>,
    }
    #[async_trait]
    impl Notifier for RecordingNotifier {
        async fn notify(&self, user_id: &str, message: &str) -> anyhow::Result<()> {
            self.sent.lock().unwrap().push((user_id.to_string(), message.to_string()));
            Ok(())
        }
    }

    #[tokio::test]
    async fn price_above_threshold_fires_and_notifies() {
        let store = Arc::new(Store::open_in_memory().await.unwrap());
        store.create_alert("u1", AlertType::PriceAbove, "ETH", 2000.0).await.unwrap();
        let prices = Arc::new(PriceOracle::new(Arc::new(FixedFeed(2500.0))));
        let notifier = Arc::new(RecordingNotifier { sent: Mutex::new(Vec::new()) });
        let engine = AlertEngine::new(store.clone(), prices, notifier.clone());
        engine.tick().await;

        let alerts = store.list_user_alerts("u1").await.unwrap();
        assert_eq!(alerts[0].status, AlertStatus::Triggered);
        assert_eq!(notifier.sent.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn triggered_alert_never_refires() {
        let store = Arc::new(Store::open_in_memory().await.unwrap());
        store.create_alert("u1", AlertType::PriceAbove, "ETH", 2000.0).await.unwrap();
        let prices = Arc::new(PriceOracle::new(Arc::new(FixedFeed(2500.0))));
        let notifier = Arc::new(RecordingNotifier { sent: Mutex::new(Vec::new()) });
        let engine = AlertEngine::new(store.clone(), prices, notifier.clone());
        engine.tick().await;
        engine.tick().await;
        assert_eq!(notifier.sent.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn price_below_threshold_does_not_fire_above_alert() {
        let store = Arc::new(Store::open_in_memory().await.unwrap());
        store.create_alert("u1", AlertType::PriceAbove, "ETH", 2000.0).await.unwrap();
        let prices = Arc::new(PriceOracle::new(Arc::new(FixedFeed(1000.0))));
        let notifier = Arc::new(RecordingNotifier { sent: Mutex::new(Vec::new()) });
        let engine = AlertEngine::new(store.clone(), prices, notifier.clone());
        engine.tick().await;
        let alerts = store.list_user_alerts("u1").await.unwrap();
        assert_eq!(alerts[0].status, AlertStatus::Active);
    }
}
