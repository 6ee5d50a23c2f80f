//! Price-alert types (spec.md §3 "Alert", §4.6).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertType {
    PriceAbove,
    PriceBelow,
}

impl AlertType {
    /// Fires on exact equality in both directions (spec.md §8 boundary
    /// behaviours).
    pub fn should_fire(self, price: f64, threshold: f64) -> bool {
        match self {
            AlertType::PriceAbove => price >= threshold,
            AlertType::PriceBelow => price <= threshold,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertStatus {
    Active,
    Triggered,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Alert {
    pub id: i64,
    pub user_id: String,
    pub alert_type: AlertType,
    pub token: String,
    pub threshold: f64,
    pub status: AlertStatus,
    pub created_at: DateTime<Utc>,
    pub triggered_at: Option<DateTime<Utc>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn price_above_fires_on_exact_equality() {
        assert!(AlertType::PriceAbove.should_fire(2000.0, 2000.0));
    }

    #[test]
    fn price_below_fires_on_exact_equality() {
        assert!(AlertType::PriceBelow.should_fire(2000.0, 2000.0));
    }

    #[test]
    fn price_above_does_not_fire_below_threshold() {
        assert!(!AlertType::PriceAbove.should_fire(1999.0, 2000.0));
    }
}
