//! Transaction Pipeline (spec.md §4.7): the fixed seven-stage path every
//! on-chain action runs through, from risk gate to confirmation watch.
//!
//! Grounded on `tandem-tools`'s `ToolRegistry::execute` — validate, then run
//! a fixed sequence of steps, surfacing the first failure — restructured
//! from a dynamic tool dispatch into a fixed ordered pipeline.

use std::sync::Arc;
use std::time::Duration as StdDuration;

use serde_json::json;

use chainclaw_hooks::HookBus;
use chainclaw_memory::Store;
use chainclaw_providers::{ChainRpc, Signer, Simulator};
use chainclaw_types::hook::HookEvent;
use chainclaw_types::skill::SkillContext;
use chainclaw_types::tx::{TxRecord, TxStatus};

use crate::error::{PipelineError, PipelineResult};
use crate::gas::{self, GasFees, GasStrategy};
use crate::guardrails::{self, GuardrailConfig};
use crate::risk::RiskEngine;

/// Round-trip loss above this percentage is flagged as a warning in the
/// user-facing preview rather than blocking the transaction (spec.md §4.7
/// stage 2).
pub const ROUND_TRIP_LOSS_WARNING_PCT: f64 = 20.0;

/// 2-minute confirmation timeout (spec.md §4.7 stage 4).
const CONFIRMATION_TIMEOUT: StdDuration = StdDuration::from_secs(120);

#[derive(Debug, Clone)]
pub struct TxRequest {
    pub chain_id: u64,
    pub user_id: String,
    pub from: String,
    pub to: String,
    pub value: String,
    pub value_usd: f64,
    pub calldata: String,
    pub skill_name: String,
    pub intent_description: String,
    /// `true` for buy-type transactions, triggering the sell-after-buy
    /// round-trip honeypot check (spec.md §4.7 stage 2).
    pub is_buy: bool,
    pub buy_token: Option<String>,
    pub buy_amount: Option<String>,
    pub strategy: Option<GasStrategy>,
}

pub struct ConfirmationWatchConfig {
    pub poll_interval: StdDuration,
    pub deadline: StdDuration,
}

impl Default for ConfirmationWatchConfig {
    fn default() -> Self {
        Self { poll_interval: StdDuration::from_secs(5), deadline: StdDuration::from_secs(300) }
    }
}

pub struct TransactionPipeline {
    risk: Arc<RiskEngine>,
    simulator: Arc<dyn Simulator>,
    chain_rpc: Arc<dyn ChainRpc>,
    signer: Arc<dyn Signer>,
    store: Arc<Store>,
    hooks: Arc<HookBus>,
    guardrail_config: GuardrailConfig,
    watch_config: ConfirmationWatchConfig,
}

impl TransactionPipeline {
    pub fn new(
        risk: Arc<RiskEngine>,
        simulator: Arc<dyn Simulator>,
        chain_rpc: Arc<dyn ChainRpc>,
        signer: Arc<dyn Signer>,
        store: Arc<Store>,
        hooks: Arc<HookBus>,
    ) -> Self {
        Self {
            risk,
            simulator,
            chain_rpc,
            signer,
            store,
            hooks,
            guardrail_config: GuardrailConfig::default(),
            watch_config: ConfirmationWatchConfig::default(),
        }
    }

    pub fn with_guardrail_config(mut self, config: GuardrailConfig) -> Self {
        self.guardrail_config = config;
        self
    }

    pub fn with_watch_config(mut self, config: ConfirmationWatchConfig) -> Self {
        self.watch_config = config;
        self
    }

    /// Runs all seven stages (spec.md §4.7). Any failure short-circuits to a
    /// recorded `failed` transaction with a machine-readable reason.
    pub async fn execute(&self, req: TxRequest, ctx: &SkillContext) -> PipelineResult<TxRecord> {
        let record = self
            .store
            .create_tx(
                &req.user_id,
                req.chain_id,
                &req.from,
                &req.to,
                &req.value,
                req.value_usd,
                &req.skill_name,
                &req.intent_description,
            )
            .await?;

        if let Err(reason) = self.run_stages(&req, &record, ctx).await {
            let _ = self
                .store
                .advance_tx(&record.id, TxStatus::Failed, None, None, None, None, None, None, Some(reason.message()))
                .await;
            self.emit("tx", "failed", json!({"tx_id": record.id, "reason": reason.message()})).await;
            return Err(reason);
        }

        self.store.get_tx(&record.id).await.map_err(PipelineError::from)
    }

    async fn run_stages(
        &self,
        req: &TxRequest,
        record: &TxRecord,
        ctx: &SkillContext,
    ) -> PipelineResult<()> {
        // Stage 1: risk gate.
        let verdict = self
            .risk
            .should_block(&req.user_id, req.chain_id, &req.to)
            .await
            .map_err(PipelineError::Boundary)?;
        if verdict.blocked {
            return Err(PipelineError::RiskBlocked(verdict.reason.unwrap_or_else(|| "blocked".to_string())));
        }

        // Stage 2: simulation.
        self.emit("tx", "before_simulate", json!({"tx_id": record.id})).await;
        let sim = self
            .simulator
            .simulate(req.chain_id, &req.from, &req.to, &req.calldata, &req.value)
            .await
            .map_err(PipelineError::Boundary)?;
        if !sim.success {
            return Err(PipelineError::Simulation(
                sim.revert_reason.unwrap_or_else(|| "simulation reverted".to_string()),
            ));
        }
        let mut sim_json = serde_json::to_value(&sim).unwrap_or(json!({}));
        if req.is_buy {
            if let (Some(token), Some(amount)) = (&req.buy_token, &req.buy_amount) {
                let round_trip = self
                    .simulator
                    .simulate_round_trip(req.chain_id, &req.from, token, amount)
                    .await
                    .map_err(PipelineError::Boundary)?;
                if !round_trip.sellable {
                    return Err(PipelineError::RiskBlocked("token cannot be sold back (honeypot behaviour)".into()));
                }
                if round_trip.round_trip_loss_pct > ROUND_TRIP_LOSS_WARNING_PCT {
                    sim_json["round_trip_warning"] = json!(format!(
                        "round-trip loss of {:.1}% exceeds the {:.0}% warning threshold",
                        round_trip.round_trip_loss_pct, ROUND_TRIP_LOSS_WARNING_PCT
                    ));
                }
                sim_json["round_trip"] = serde_json::to_value(&round_trip).unwrap_or(json!({}));
            }
        }
        self.emit("tx", "after_simulate", json!({"tx_id": record.id, "simulation": sim_json})).await;
        self.store
            .advance_tx(&record.id, TxStatus::Simulated, None, Some(&sim_json), None, None, None, None, None)
            .await?;

        // Stage 3: guardrails. `record.id` is excluded from the per-day sum
        // since this pending row was already persisted at the top of
        // `execute`, before this stage runs.
        let outcome =
            guardrails::evaluate(&self.store, &req.user_id, req.value_usd, &self.guardrail_config, Some(&record.id))
                .await
                .map_err(PipelineError::Guardrail)?;
        let guardrail_json = json!({"requires_confirmation": outcome.requires_confirmation});
        self.store
            .advance_tx(&record.id, TxStatus::Simulated, None, None, Some(&guardrail_json), None, None, None, None)
            .await?;

        // Stage 4: confirmation.
        let needs_confirmation =
            outcome.requires_confirmation || req.value_usd > ctx.preferences.confirmation_required_usd;
        if needs_confirmation {
            let prompt = format!(
                "Confirm {} for ${:.2}? (yes/no)",
                req.intent_description, req.value_usd
            );
            let answer = tokio::time::timeout(CONFIRMATION_TIMEOUT, ctx.request_confirmation(&prompt)).await;
            match answer {
                Ok(Some(true)) => {}
                Ok(Some(false)) => return Err(PipelineError::ConfirmationDeclined),
                Ok(None) => {} // no confirmation capability wired; treat as not gated.
                Err(_) => return Err(PipelineError::ConfirmationTimeout),
            }
        }

        // Stage 5: gas policy.
        let fee_estimate = self.chain_rpc.fee_estimate(req.chain_id).await.map_err(PipelineError::Boundary)?;
        let strategy = req.strategy.unwrap_or_default();
        let fees = gas::compute_fees(&fee_estimate, strategy).map_err(PipelineError::Boundary)?;
        let gas_price_str = match &fees {
            GasFees::Eip1559 { max_fee_per_gas, .. } => max_fee_per_gas.to_string(),
            GasFees::Legacy { gas_price } => gas_price.to_string(),
        };

        // Stage 6: broadcast.
        self.emit("tx", "before_broadcast", json!({"tx_id": record.id})).await;
        let signed = self
            .signer
            .sign(req.chain_id, &req.to, &req.value, &req.calldata)
            .await
            .map_err(PipelineError::Boundary)?;
        let Some(signed_tx) = signed else {
            return Err(PipelineError::Guardrail("no signing credentials available".to_string()));
        };
        let hash = self.chain_rpc.broadcast(req.chain_id, &signed_tx).await.map_err(PipelineError::Boundary)?;
        self.store
            .advance_tx(
                &record.id,
                TxStatus::Broadcast,
                Some(&hash),
                None,
                None,
                None,
                Some(&gas_price_str),
                None,
                None,
            )
            .await?;
        self.emit("tx", "after_broadcast", json!({"tx_id": record.id, "hash": hash})).await;

        // Stage 7: confirmation watch.
        self.watch_confirmation(record, req.chain_id, &hash).await
    }

    async fn watch_confirmation(&self, record: &TxRecord, chain_id: u64, hash: &str) -> PipelineResult<()> {
        let deadline = tokio::time::Instant::now() + self.watch_config.deadline;
        loop {
            let receipt = self.chain_rpc.receipt(chain_id, hash).await.map_err(PipelineError::Boundary)?;
            if let Some(receipt) = receipt {
                if receipt.status {
                    self.store
                        .advance_tx(
                            &record.id,
                            TxStatus::Confirmed,
                            None,
                            None,
                            None,
                            Some(&receipt.gas_used),
                            None,
                            Some(receipt.block_number),
                            None,
                        )
                        .await?;
                    self.emit(
                        "tx",
                        "confirmed",
                        json!({"tx_id": record.id, "block_number": receipt.block_number}),
                    )
                    .await;
                    return Ok(());
                }
                return Err(PipelineError::Simulation("transaction reverted on-chain".to_string()));
            }
            if tokio::time::Instant::now() >= deadline {
                return Err(PipelineError::Simulation("confirmation watch deadline elapsed".to_string()));
            }
            tokio::time::sleep(self.watch_config.poll_interval).await;
        }
    }

    async fn emit(&self, category: &str, action: &str, payload: serde_json::Value) {
        self.hooks.emit(HookEvent::new(category, action, payload)).await;
    }
}

impl PipelineError {
    fn message(&self) -> String {
        self.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chainclaw_providers::{
        ContractVerificationApi, FeeEstimate, Receipt, RoundTripSimulation, SimulationResult, TokenSafetyApi,
        TokenSafetyReport,
    };
    use chainclaw_types::channel::ChannelContext;
    use chainclaw_types::user::Preferences;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct AlwaysSafe;
    #[async_trait]
    impl TokenSafetyApi for AlwaysSafe {
        async fn report(&self, _chain_id: u64, _address: &str) -> anyhow::Result<TokenSafetyReport> {
            Ok(TokenSafetyReport::default())
        }
    }
    struct NoSource;
    #[async_trait]
    impl ContractVerificationApi for NoSource {
        async fn source_code(&self, _chain_id: u64, _address: &str) -> anyhow::Result<Option<String>> {
            Ok(None)
        }
    }

    struct OkSimulator;
    #[async_trait]
    impl Simulator for OkSimulator {
        async fn simulate(
            &self,
            _chain_id: u64,
            _from: &str,
            _to: &str,
            _calldata: &str,
            _value: &str,
        ) -> anyhow::Result<SimulationResult> {
            Ok(SimulationResult { success: true, balance_changes: vec![], gas_estimate: "21000".into(), revert_reason: None })
        }
        async fn simulate_round_trip(
            &self,
            _chain_id: u64,
            _from: &str,
            _token: &str,
            _amount: &str,
        ) -> anyhow::Result<RoundTripSimulation> {
            Ok(RoundTripSimulation { sellable: true, round_trip_loss_pct: 1.0 })
        }
    }

    struct FakeChain;
    #[async_trait]
    impl ChainRpc for FakeChain {
        async fn fee_estimate(&self, _chain_id: u64) -> anyhow::Result<FeeEstimate> {
            Ok(FeeEstimate { base_fee: Some("1000000000".into()), supports_eip1559: true, legacy_gas_price: None })
        }
        async fn broadcast(&self, _chain_id: u64, _signed_tx: &str) -> anyhow::Result<String> {
            Ok("0xhash".to_string())
        }
        async fn receipt(&self, _chain_id: u64, _tx_hash: &str) -> anyhow::Result<Option<Receipt>> {
            Ok(Some(Receipt { status: true, gas_used: "21000".into(), block_number: 100 }))
        }
    }

    struct FakeSigner;
    #[async_trait]
    impl Signer for FakeSigner {
        async fn sign(&self, _chain_id: u64, _to: &str, _value: &str, _calldata: &str) -> anyhow::Result<Option<String>> {
            Ok(Some("0xsigned".to_string()))
        }
    }

    struct NoSigner;
    #[async_trait]
    impl Signer for NoSigner {
        async fn sign(&self, _chain_id: u64, _to: &str, _value: &str, _calldata: &str) -> anyhow::Result<Option<String>> {
            Ok(None)
        }
    }

    struct FakeChannel {
        confirm: Option<bool>,
        calls: AtomicUsize,
    }
    #[async_trait]
    impl ChannelContext for FakeChannel {
        fn user_id(&self) -> &str {
            "u1"
        }
        fn channel_id(&self) -> &str {
            "c1"
        }
        fn platform(&self) -> &str {
            "test"
        }
        async fn send_reply(&self, _text: &str) -> anyhow::Result<()> {
            Ok(())
        }
        async fn request_confirmation(&self, _prompt: &str) -> Option<bool> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.confirm
        }
    }

    fn ctx(confirm: Option<bool>) -> SkillContext {
        SkillContext {
            user_id: "u1".to_string(),
            wallet_address: Some("0xfrom".to_string()),
            chain_ids: vec![1],
            preferences: Preferences::default(),
            channel: Arc::new(FakeChannel { confirm, calls: AtomicUsize::new(0) }),
        }
    }

    async fn pipeline(signer: Arc<dyn Signer>, store: Arc<Store>) -> TransactionPipeline {
        let risk = Arc::new(RiskEngine::new(Arc::new(AlwaysSafe), Arc::new(NoSource), store.clone()));
        TransactionPipeline::new(risk, Arc::new(OkSimulator), Arc::new(FakeChain), signer, store, Arc::new(HookBus::new()))
    }

    fn req(value_usd: f64) -> TxRequest {
        TxRequest {
            chain_id: 1,
            user_id: "u1".to_string(),
            from: "0xfrom".to_string(),
            to: "0xto".to_string(),
            value: "1.0".to_string(),
            value_usd,
            calldata: "0x".to_string(),
            skill_name: "swap".to_string(),
            intent_description: "swap 1 ETH for USDC".to_string(),
            is_buy: false,
            buy_token: None,
            buy_amount: None,
            strategy: None,
        }
    }

    #[tokio::test]
    async fn happy_path_confirms_and_records_block_number() {
        let store = Arc::new(Store::open_in_memory().await.unwrap());
        let p = pipeline(Arc::new(FakeSigner), store).await;
        let record = p.execute(req(10.0), &ctx(None)).await.unwrap();
        assert_eq!(record.status, TxStatus::Confirmed);
        assert_eq!(record.block_number, Some(100));
    }

    #[tokio::test]
    async fn large_value_below_threshold_requests_confirmation_and_declines() {
        let store = Arc::new(Store::open_in_memory().await.unwrap());
        let p = pipeline(Arc::new(FakeSigner), store)
            .await
            .with_guardrail_config(GuardrailConfig { confirmation_fraction: 0.0, ..Default::default() });
        let result = p.execute(req(600.0), &ctx(Some(false))).await;
        assert!(matches!(result, Err(PipelineError::ConfirmationDeclined)));
    }

    #[tokio::test]
    async fn no_signer_fails_with_guardrail_style_error() {
        let store = Arc::new(Store::open_in_memory().await.unwrap());
        let p = pipeline(Arc::new(NoSigner), store).await;
        let result = p.execute(req(10.0), &ctx(None)).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn blocklisted_counterparty_fails_at_risk_gate() {
        let store = Arc::new(Store::open_in_memory().await.unwrap());
        store.add_to_risk_list("u1", 1, "0xto", chainclaw_memory::ListType::Block).await.unwrap();
        let p = pipeline(Arc::new(FakeSigner), store).await;
        let result = p.execute(req(10.0), &ctx(None)).await;
        assert!(matches!(result, Err(PipelineError::RiskBlocked(_))));
    }
}
