//! Marketplace facade (SPEC_FULL.md §B "Marketplace"): a thin subscribe/
//! list/unsubscribe wrapper over `marketplace_subscriptions`, and the glue
//! that turns an `active` subscription into a running [`AgentRunner`]
//! instance (spec.md §4.9's start/pause/resume/stop, generalised to
//! subscribe/unsubscribe).

use std::sync::Arc;

use chainclaw_memory::Store;
use chainclaw_types::agent::{AgentMode, MarketplaceSubscription};

use crate::registry::StrategyRegistry;
use crate::runner::AgentRunner;

#[derive(Clone)]
pub struct Marketplace {
    store: Arc<Store>,
    registry: StrategyRegistry,
    runner: AgentRunner,
}

impl Marketplace {
    pub fn new(store: Arc<Store>, registry: StrategyRegistry, runner: AgentRunner) -> Self {
        Self { store, registry, runner }
    }

    pub async fn subscribe(
        &self,
        user_id: &str,
        agent_name: &str,
        agent_version: &str,
        mode: AgentMode,
        config_options: serde_json::Value,
    ) -> anyhow::Result<MarketplaceSubscription> {
        let Some(strategy) = self.registry.get(agent_name, agent_version).await else {
            anyhow::bail!("unknown agent {agent_name} {agent_version}");
        };
        let sub = self.store.subscribe(user_id, agent_name, agent_version, mode).await?;
        self.runner.start_agent(strategy.definition, user_id, mode, config_options).await?;
        Ok(sub)
    }

    pub async fn list(&self, user_id: &str) -> anyhow::Result<Vec<MarketplaceSubscription>> {
        Ok(self.store.list_subscriptions(user_id).await?)
    }

    /// Unsubscribes the row and stops the corresponding running instance, if
    /// the runner has one with the same agent name for this user (the
    /// runner's instance id is opaque to the marketplace row, so this stops
    /// by matching `agent_name`/`user_id` rather than by a shared key).
    pub async fn unsubscribe(&self, subscription_id: &str, user_id: &str, agent_name: &str) -> anyhow::Result<()> {
        self.store.unsubscribe(subscription_id).await?;
        for instance in self.runner.list_running().await {
            if instance.user_id == user_id && instance.agent_name == agent_name {
                self.runner.stop_agent(&instance.id).await;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::{dip_buyer_definition, dip_buyer_evaluate};
    use chainclaw_hooks::HookBus;
    use chainclaw_pipeline::RiskEngine;
    use chainclaw_providers::{
        ChainRpc, ContractVerificationApi, FeeEstimate, PriceFeed, PriceOracle, Receipt, RoundTripSimulation,
        Signer, SimulationResult, TokenSafetyApi, TokenSafetyReport,
    };
    use async_trait::async_trait;

    struct NoopFeed;
    #[async_trait]
    impl PriceFeed for NoopFeed {
        async fn fetch_price(&self, _symbol: &str) -> anyhow::Result<Option<f64>> {
            Ok(Some(1.0))
        }
    }
    struct NoopSigner;
    #[async_trait]
    impl Signer for NoopSigner {
        async fn sign(&self, _chain_id: u64, _to: &str, _value: &str, _calldata: &str) -> anyhow::Result<Option<String>> {
            Ok(None)
        }
    }
    struct NoopSimulator;
    #[async_trait]
    impl chainclaw_providers::Simulator for NoopSimulator {
        async fn simulate(&self, _c: u64, _f: &str, _t: &str, _cd: &str, _v: &str) -> anyhow::Result<SimulationResult> {
            Ok(SimulationResult { success: true, balance_changes: vec![], gas_estimate: "0".into(), revert_reason: None })
        }
        async fn simulate_round_trip(&self, _c: u64, _f: &str, _t: &str, _a: &str) -> anyhow::Result<RoundTripSimulation> {
            Ok(RoundTripSimulation { sellable: true, round_trip_loss_pct: 0.0 })
        }
    }
    struct NoopChain;
    #[async_trait]
    impl ChainRpc for NoopChain {
        async fn fee_estimate(&self, _c: u64) -> anyhow::Result<FeeEstimate> {
            Ok(FeeEstimate { base_fee: None, supports_eip1559: false, legacy_gas_price: Some("1".into()) })
        }
        async fn broadcast(&self, _c: u64, _s: &str) -> anyhow::Result<String> {
            Ok("0xhash".into())
        }
        async fn receipt(&self, _c: u64, _h: &str) -> anyhow::Result<Option<Receipt>> {
            Ok(None)
        }
    }
    struct AlwaysSafe;
    #[async_trait]
    impl TokenSafetyApi for AlwaysSafe {
        async fn report(&self, _c: u64, _a: &str) -> anyhow::Result<TokenSafetyReport> {
            Ok(TokenSafetyReport::default())
        }
    }
    struct NoSource;
    #[async_trait]
    impl ContractVerificationApi for NoSource {
        async fn source_code(&self, _c: u64, _a: &str) -> anyhow::Result<Option<String>> {
            Ok(None)
        }
    }

    async fn test_marketplace() -> Marketplace {
        let store = Arc::new(Store::open_in_memory().await.unwrap());
        let hooks = Arc::new(HookBus::new());
        let registry = StrategyRegistry::new();
        registry.register(dip_buyer_definition(), dip_buyer_evaluate()).await;
        let prices = Arc::new(PriceOracle::new(Arc::new(NoopFeed)));
        let risk = Arc::new(RiskEngine::new(Arc::new(AlwaysSafe), Arc::new(NoSource), store.clone()));
        let pipeline = Arc::new(chainclaw_pipeline::TransactionPipeline::new(
            risk,
            Arc::new(NoopSimulator),
            Arc::new(NoopChain),
            Arc::new(NoopSigner),
            store.clone(),
            hooks.clone(),
        ));
        let runner = AgentRunner::new(store.clone(), hooks, registry.clone(), prices, pipeline);
        Marketplace::new(store, registry, runner)
    }

    #[tokio::test]
    async fn subscribe_starts_a_running_instance() {
        let marketplace = test_marketplace().await;
        marketplace
            .subscribe("u1", "dip-buyer", "1.0.0", AgentMode::DryRun, serde_json::json!({}))
            .await
            .unwrap();
        assert_eq!(marketplace.list("u1").await.unwrap().len(), 1);
        assert_eq!(marketplace.runner.list_running().await.len(), 1);
    }

    #[tokio::test]
    async fn unknown_agent_is_rejected_before_touching_the_store() {
        let marketplace = test_marketplace().await;
        let result = marketplace
            .subscribe("u1", "nonexistent", "1.0.0", AgentMode::DryRun, serde_json::json!({}))
            .await;
        assert!(result.is_err());
        assert_eq!(marketplace.list("u1").await.unwrap().len(), 0);
    }

    #[tokio::test]
    async fn unsubscribe_stops_the_matching_running_instance() {
        let marketplace = test_marketplace().await;
        let sub = marketplace
            .subscribe("u1", "dip-buyer", "1.0.0", AgentMode::DryRun, serde_json::json!({}))
            .await
            .unwrap();
        marketplace.unsubscribe(&sub.id, "u1", "dip-buyer").await.unwrap();
        assert_eq!(marketplace.runner.list_running().await.len(), 0);
    }
}
