//! Agent Runner: autonomous-mode lifecycle and per-instance evaluation loop
//! (spec.md §4.9).
//!
//! Agent instances are not persisted rows (spec.md §6's table list has no
//! `agent_instances`); they are process-local values, rebuilt each boot from
//! `marketplace_subscriptions` that are still `active` (spec.md §9 "Global
//! state"). Lifecycle state and the running task live only here.

use std::collections::HashMap;
use std::sync::Arc;

use chainclaw_hooks::HookBus;
use chainclaw_memory::Store;
use chainclaw_pipeline::{TransactionPipeline, TxRequest};
use chainclaw_providers::PriceOracle;
use chainclaw_types::agent::{
    AgentDefinition, AgentInstance, AgentMode, AgentStatus, AgentTrade, TradeStatus,
};
use chainclaw_types::channel::ChannelContext;
use chainclaw_types::hook::HookEvent;
use chainclaw_types::skill::SkillContext;
use chainclaw_types::user::Preferences;
use chrono::Utc;
use serde_json::json;
use tokio::sync::{watch, RwLock};
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::context::EvaluationContext;
use crate::registry::StrategyRegistry;

/// A no-op confirmation channel for autonomous trades: the Agent Runner
/// never blocks on a human answering a prompt (spec.md §4.9 step 4 routes
/// straight through the pipeline, it does not solicit confirmation).
struct AutonomousChannel {
    user_id: String,
}

#[async_trait::async_trait]
impl ChannelContext for AutonomousChannel {
    fn user_id(&self) -> &str {
        &self.user_id
    }
    fn channel_id(&self) -> &str {
        "agent-runner"
    }
    fn platform(&self) -> &str {
        "agent"
    }
    async fn send_reply(&self, _text: &str) -> anyhow::Result<()> {
        Ok(())
    }
    async fn request_confirmation(&self, _prompt: &str) -> Option<bool> {
        Some(true)
    }
}

struct RunningAgent {
    instance: AgentInstance,
    status_tx: watch::Sender<AgentStatus>,
    handle: JoinHandle<()>,
}

#[derive(Clone)]
pub struct AgentRunner {
    store: Arc<Store>,
    hooks: Arc<HookBus>,
    registry: StrategyRegistry,
    prices: Arc<PriceOracle>,
    pipeline: Arc<TransactionPipeline>,
    running: Arc<RwLock<HashMap<String, RunningAgent>>>,
}

impl AgentRunner {
    pub fn new(
        store: Arc<Store>,
        hooks: Arc<HookBus>,
        registry: StrategyRegistry,
        prices: Arc<PriceOracle>,
        pipeline: Arc<TransactionPipeline>,
    ) -> Self {
        Self { store, hooks, registry, prices, pipeline, running: Arc::new(RwLock::new(HashMap::new())) }
    }

    /// `startAgent(def, userId, mode) -> id` (spec.md §4.9 "Lifecycle").
    pub async fn start_agent(
        &self,
        def: AgentDefinition,
        user_id: &str,
        mode: AgentMode,
        config_options: serde_json::Value,
    ) -> anyhow::Result<String> {
        let Some(strategy) = self.registry.get(&def.name, &def.version).await else {
            anyhow::bail!("no strategy registered for {} {}", def.name, def.version);
        };
        let id = Uuid::new_v4().to_string();
        let instance = AgentInstance {
            id: id.clone(),
            agent_name: def.name.clone(),
            version: def.version.clone(),
            user_id: user_id.to_string(),
            mode,
            config_options,
            status: AgentStatus::Running,
            started_at: Utc::now(),
            stopped_at: None,
        };
        let (status_tx, status_rx) = watch::channel(AgentStatus::Running);
        let handle = tokio::spawn(self.clone().tick_loop(
            instance.clone(),
            strategy.definition.clone(),
            strategy.evaluate.clone(),
            status_rx,
        ));
        self.running.write().await.insert(id.clone(), RunningAgent { instance, status_tx, handle });
        Ok(id)
    }

    /// Idempotent: pausing an already-paused or unknown instance is a no-op
    /// (spec.md §4.9 "Lifecycle").
    pub async fn pause_agent(&self, id: &str) {
        if let Some(agent) = self.running.read().await.get(id) {
            let _ = agent.status_tx.send(AgentStatus::Paused);
        }
    }

    pub async fn resume_agent(&self, id: &str) {
        if let Some(agent) = self.running.read().await.get(id) {
            let _ = agent.status_tx.send(AgentStatus::Running);
        }
    }

    pub async fn stop_agent(&self, id: &str) {
        let removed = self.running.write().await.remove(id);
        if let Some(agent) = removed {
            let _ = agent.status_tx.send(AgentStatus::Stopped);
            agent.handle.abort();
        }
    }

    /// Called during shutdown (spec.md §4.9 "Lifecycle": `stopAll()`).
    pub async fn stop_all(&self) {
        let ids: Vec<String> = self.running.read().await.keys().cloned().collect();
        for id in ids {
            self.stop_agent(&id).await;
        }
    }

    pub async fn list_running(&self) -> Vec<AgentInstance> {
        self.running.read().await.values().map(|a| a.instance.clone()).collect()
    }

    async fn tick_loop(
        self,
        instance: AgentInstance,
        def: AgentDefinition,
        evaluate: Arc<crate::context::EvaluateFn>,
        mut status_rx: watch::Receiver<AgentStatus>,
    ) {
        let interval = std::time::Duration::from_millis(def.strategy.evaluation_interval_ms.max(1_000));
        let mut ticker = tokio::time::interval(interval);
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if *status_rx.borrow() != AgentStatus::Running {
                        continue;
                    }
                    if let Err(err) = self.run_one_tick(&instance, &def, evaluate.as_ref()).await {
                        tracing::warn!(agent_id = %instance.id, error = %err, "agent tick failed");
                    }
                }
                _ = status_rx.changed() => {
                    if *status_rx.borrow() == AgentStatus::Stopped {
                        return;
                    }
                }
            }
        }
    }

    async fn run_one_tick(
        &self,
        instance: &AgentInstance,
        def: &AgentDefinition,
        evaluate: &crate::context::EvaluateFn,
    ) -> anyhow::Result<()> {
        // Step 1: build the evaluation context.
        let mut prices = HashMap::new();
        for token in &def.strategy.watchlist {
            if let Some(price) = self.prices.get_token_price(token).await? {
                prices.insert(token.clone(), price);
            }
        }
        let recent_trades = self.store.list_agent_trades(&instance.id).await?;
        let ctx = EvaluationContext {
            now: Utc::now(),
            prices,
            portfolio: Vec::new(),
            recent_trades,
            knowledge: serde_json::from_value(instance.config_options.clone()).unwrap_or_default(),
        };

        // Step 2: evaluate.
        let decisions = evaluate(&ctx);

        // Step 3: persist the reasoning trace.
        let reasoning = decisions
            .iter()
            .map(|d| format!("{}: {}", d.action, d.reasoning))
            .collect::<Vec<_>>()
            .join("; ");
        self.store
            .record_reasoning_trace(
                &instance.id,
                &serde_json::to_value(&ctx.prices).unwrap_or(json!({})),
                &serde_json::to_value(&decisions).unwrap_or(json!([])),
                &reasoning,
            )
            .await?;

        // Step 4: per-decision risk checks, then dry-run or live execution.
        for decision in decisions {
            if def.risk_params.blocked_tokens.iter().any(|t| t == &decision.token) {
                continue;
            }
            if decision.amount_usd > def.risk_params.max_position_usd {
                continue;
            }
            let today_trades = self.store.list_agent_trades(&instance.id).await?;
            let today = Utc::now().date_naive();
            let trades_today = today_trades.iter().filter(|t| t.created_at.date_naive() == today).count() as u32;
            if trades_today >= def.risk_params.max_daily_trades {
                continue;
            }
            let exposure_today: f64 = today_trades
                .iter()
                .filter(|t| t.created_at.date_naive() == today)
                .map(|t| t.amount_usd)
                .sum();
            if exposure_today + decision.amount_usd > def.risk_params.max_daily_exposure_usd {
                continue;
            }

            let execution_price = ctx.price_of(&decision.token).unwrap_or(0.0);
            match instance.mode {
                AgentMode::DryRun => {
                    let trade = AgentTrade {
                        id: Uuid::new_v4().to_string(),
                        agent_id: instance.id.clone(),
                        user_id: instance.user_id.clone(),
                        mode: AgentMode::DryRun,
                        token: decision.token.clone(),
                        action: decision.action.clone(),
                        amount_usd: decision.amount_usd,
                        execution_price,
                        status: TradeStatus::Filled,
                        tx_id: None,
                        created_at: Utc::now(),
                    };
                    self.store.record_agent_trade(&trade).await?;
                    self.hooks
                        .emit(HookEvent::new(
                            "agent",
                            "dry_run_trade",
                            json!({"agent_id": instance.id, "token": trade.token, "action": trade.action}),
                        ))
                        .await;
                }
                AgentMode::Live => {
                    let ctx_skill = SkillContext {
                        user_id: instance.user_id.clone(),
                        wallet_address: None,
                        chain_ids: vec![1],
                        preferences: Preferences::default(),
                        channel: Arc::new(AutonomousChannel { user_id: instance.user_id.clone() }),
                    };
                    let tx_req = TxRequest {
                        chain_id: 1,
                        user_id: instance.user_id.clone(),
                        from: String::new(),
                        to: String::new(),
                        value: "0".to_string(),
                        value_usd: decision.amount_usd,
                        calldata: "0x".to_string(),
                        skill_name: "agent".to_string(),
                        intent_description: decision.reasoning.clone(),
                        is_buy: decision.action == "buy",
                        buy_token: Some(decision.token.clone()),
                        buy_amount: None,
                        strategy: None,
                    };
                    let status = match self.pipeline.execute(tx_req, &ctx_skill).await {
                        Ok(record) => (Some(record.id), TradeStatus::Filled),
                        Err(err) => {
                            tracing::warn!(agent_id = %instance.id, error = %err, "live agent trade failed");
                            (None, TradeStatus::Failed)
                        }
                    };
                    let trade = AgentTrade {
                        id: Uuid::new_v4().to_string(),
                        agent_id: instance.id.clone(),
                        user_id: instance.user_id.clone(),
                        mode: AgentMode::Live,
                        token: decision.token.clone(),
                        action: decision.action.clone(),
                        amount_usd: decision.amount_usd,
                        execution_price,
                        status: status.1,
                        tx_id: status.0,
                        created_at: Utc::now(),
                    };
                    self.store.record_agent_trade(&trade).await?;
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::{dip_buyer_definition, dip_buyer_evaluate};
    use chainclaw_providers::{ContractVerificationApi, PriceFeed, Signer, Simulator, TokenSafetyApi};
    use chainclaw_pipeline::RiskEngine;
    use async_trait::async_trait;

    struct FlatFeed;
    #[async_trait]
    impl PriceFeed for FlatFeed {
        async fn fetch_price(&self, _symbol: &str) -> anyhow::Result<Option<f64>> {
            Ok(Some(2000.0))
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
    impl Simulator for NoopSimulator {
        async fn simulate(
            &self,
            _chain_id: u64,
            _from: &str,
            _to: &str,
            _calldata: &str,
            _value: &str,
        ) -> anyhow::Result<chainclaw_providers::SimulationResult> {
            Ok(chainclaw_providers::SimulationResult {
                success: true,
                balance_changes: vec![],
                gas_estimate: "21000".into(),
                revert_reason: None,
            })
        }
        async fn simulate_round_trip(
            &self,
            _chain_id: u64,
            _from: &str,
            _token: &str,
            _amount: &str,
        ) -> anyhow::Result<chainclaw_providers::RoundTripSimulation> {
            Ok(chainclaw_providers::RoundTripSimulation { sellable: true, round_trip_loss_pct: 0.0 })
        }
    }

    struct NoopChain;
    #[async_trait]
    impl chainclaw_providers::ChainRpc for NoopChain {
        async fn fee_estimate(&self, _chain_id: u64) -> anyhow::Result<chainclaw_providers::FeeEstimate> {
            Ok(chainclaw_providers::FeeEstimate { base_fee: None, supports_eip1559: false, legacy_gas_price: Some("1".into()) })
        }
        async fn broadcast(&self, _chain_id: u64, _signed_tx: &str) -> anyhow::Result<String> {
            Ok("0xhash".into())
        }
        async fn receipt(&self, _chain_id: u64, _tx_hash: &str) -> anyhow::Result<Option<chainclaw_providers::Receipt>> {
            Ok(None)
        }
    }

    struct AlwaysSafe;
    #[async_trait]
    impl TokenSafetyApi for AlwaysSafe {
        async fn report(&self, _chain_id: u64, _address: &str) -> anyhow::Result<chainclaw_providers::TokenSafetyReport> {
            Ok(chainclaw_providers::TokenSafetyReport::default())
        }
    }
    struct NoSource;
    #[async_trait]
    impl ContractVerificationApi for NoSource {
        async fn source_code(&self, _chain_id: u64, _address: &str) -> anyhow::Result<Option<String>> {
            Ok(None)
        }
    }

    async fn test_runner() -> (AgentRunner, Arc<Store>) {
        let store = Arc::new(Store::open_in_memory().await.unwrap());
        let hooks = Arc::new(HookBus::new());
        let registry = StrategyRegistry::new();
        registry.register(dip_buyer_definition(), dip_buyer_evaluate()).await;
        let prices = Arc::new(PriceOracle::new(Arc::new(FlatFeed)));
        let risk = Arc::new(RiskEngine::new(Arc::new(AlwaysSafe), Arc::new(NoSource), store.clone()));
        let pipeline = Arc::new(TransactionPipeline::new(
            risk,
            Arc::new(NoopSimulator),
            Arc::new(NoopChain),
            Arc::new(NoopSigner),
            store.clone(),
            hooks.clone(),
        ));
        (AgentRunner::new(store.clone(), hooks, registry, prices, pipeline), store)
    }

    #[tokio::test]
    async fn start_pause_resume_stop_is_idempotent() {
        let (runner, _store) = test_runner().await;
        let def = dip_buyer_definition();
        let id = runner.start_agent(def, "u1", AgentMode::DryRun, json!({})).await.unwrap();
        assert_eq!(runner.list_running().await.len(), 1);
        runner.pause_agent(&id).await;
        runner.pause_agent(&id).await;
        runner.resume_agent(&id).await;
        runner.stop_agent(&id).await;
        runner.stop_agent(&id).await;
        assert_eq!(runner.list_running().await.len(), 0);
    }

    #[tokio::test]
    async fn stop_all_clears_every_instance() {
        let (runner, _store) = test_runner().await;
        runner.start_agent(dip_buyer_definition(), "u1", AgentMode::DryRun, json!({})).await.unwrap();
        runner.start_agent(dip_buyer_definition(), "u2", AgentMode::DryRun, json!({})).await.unwrap();
        assert_eq!(runner.list_running().await.len(), 2);
        runner.stop_all().await;
        assert_eq!(runner.list_running().await.len(), 0);
    }
}
