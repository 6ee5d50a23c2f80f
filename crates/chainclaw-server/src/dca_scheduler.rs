//! DCA Scheduler (spec.md §4.6): a fixed-interval ticker that sweeps active
//! DCA jobs whose cadence has elapsed, quotes a swap for each, and executes
//! it through the Transaction Pipeline.
//!
//! Grounded on `chainclaw-server::cron_scheduler`'s single-timer tick loop,
//! specialised from a generic skill invocation to the swap-quote-then-
//! broadcast shape `chainclaw-skills::skills::chain_action::execute_or_quote`
//! already implements for the `swap` skill — the DCA tick reuses that same
//! quote/pipeline pairing directly rather than going through the skill
//! registry, since a DCA run has no live channel to hand a skill a
//! confirmation callback.

use std::sync::Arc;
use std::time::Duration as StdDuration;

use chainclaw_hooks::HookBus;
use chainclaw_memory::Store;
use chainclaw_pipeline::TransactionPipeline;
use chainclaw_providers::{DexAggregator, Signer};
use chainclaw_types::dca::DcaJob;
use chainclaw_types::hook::HookEvent;
use chainclaw_types::skill::SkillContext;
use chrono::Utc;
use serde_json::json;

use crate::headless::HeadlessChannel;

/// Interval between DCA sweeps (spec.md §4.6: "each tick (fixed interval,
/// e.g. 60 s)").
pub const TICK_INTERVAL: StdDuration = StdDuration::from_secs(60);

pub struct DcaScheduler {
    store: Arc<Store>,
    dex: Arc<dyn DexAggregator>,
    signer: Arc<dyn Signer>,
    pipeline: Arc<TransactionPipeline>,
    hooks: Arc<HookBus>,
}

impl DcaScheduler {
    pub fn new(
        store: Arc<Store>,
        dex: Arc<dyn DexAggregator>,
        signer: Arc<dyn Signer>,
        pipeline: Arc<TransactionPipeline>,
        hooks: Arc<HookBus>,
    ) -> Self {
        Self { store, dex, signer, pipeline, hooks }
    }

    /// Runs the sweep loop until cancelled.
    pub async fn run(self: Arc<Self>) {
        let mut interval = tokio::time::interval(TICK_INTERVAL);
        loop {
            interval.tick().await;
            self.tick().await;
        }
    }

    async fn tick(&self) {
        let now = Utc::now();
        let due = match self.store.list_due_dca_jobs(now).await {
            Ok(jobs) => jobs,
            Err(err) => {
                tracing::warn!(error = %err, "dca scheduler: failed to list due jobs");
                return;
            }
        };
        for job in due {
            self.run_job(job).await;
        }
    }

    async fn run_job(&self, job: DcaJob) {
        let ran_at = Utc::now();
        let outcome = self.execute(&job).await;

        match outcome {
            Ok(tx_id) => {
                if let Err(err) = self.store.record_dca_success(job.id, ran_at).await {
                    tracing::warn!(job_id = job.id, error = %err, "dca scheduler: failed to record success");
                }
                self.hooks
                    .emit(HookEvent::new("dca", "job_succeeded", json!({"jobId": job.id, "txId": tx_id})))
                    .await;
            }
            Err(reason) => {
                let status = self.store.record_dca_failure(job.id, ran_at).await.unwrap_or(chainclaw_types::dca::DcaStatus::Active);
                tracing::warn!(job_id = job.id, error = %reason, "dca scheduler: run failed");
                self.hooks
                    .emit(HookEvent::new(
                        "dca",
                        "job_failed",
                        json!({"jobId": job.id, "reason": reason, "status": format!("{status:?}")}),
                    ))
                    .await;
            }
        }
    }

    /// Quotes and executes one DCA run (spec.md §4.6: "quote a swap, apply
    /// risk/guardrail gates, execute via the Transaction Pipeline").
    async fn execute(&self, job: &DcaJob) -> Result<String, String> {
        let Some(wallet_address) = job.wallet_address.clone() else {
            return Err("job has no wallet address configured".to_string());
        };

        let quote = self
            .dex
            .quote_swap(job.chain_id, &job.from_token, &job.to_token, &job.amount)
            .await
            .map_err(|err| format!("could not get a swap quote: {err}"))?;

        let preferences = self.store.get_preferences(&job.user_id).await.unwrap_or_default();
        let ctx = SkillContext {
            user_id: job.user_id.clone(),
            wallet_address: Some(wallet_address.clone()),
            chain_ids: vec![job.chain_id],
            preferences,
            channel: Arc::new(HeadlessChannel::new(job.user_id.clone())),
        };

        let req = chainclaw_pipeline::TxRequest {
            chain_id: job.chain_id,
            user_id: job.user_id.clone(),
            from: wallet_address,
            to: quote.to_address.clone(),
            value: "0".to_string(),
            value_usd: quote.value_usd,
            calldata: quote.calldata.clone(),
            skill_name: "dca".to_string(),
            intent_description: format!("DCA: swap {} {} for {}", job.amount, job.from_token, job.to_token),
            is_buy: true,
            buy_token: Some(job.to_token.clone()),
            buy_amount: Some(quote.amount_out.clone()),
            strategy: None,
        };

        if !self.signer.is_configured() {
            return Err("no signing credentials configured".to_string());
        }

        match self.pipeline.execute(req, &ctx).await {
            Ok(record) => Ok(record.id),
            Err(err) => Err(err.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chainclaw_providers::{ContractVerificationApi, Simulator, SwapQuote, TokenSafetyApi, TokenSafetyReport};
    use chainclaw_types::dca::{DcaFrequency, DcaStatus};

    struct StubDex;
    #[async_trait]
    impl DexAggregator for StubDex {
        async fn quote_swap(&self, _chain_id: u64, from_token: &str, to_token: &str, amount: &str) -> anyhow::Result<SwapQuote> {
            Ok(SwapQuote {
                from_token: from_token.to_string(),
                to_token: to_token.to_string(),
                amount_in: amount.to_string(),
                amount_out: "1".to_string(),
                price_impact_pct: 0.1,
                route: vec![],
                to_address: "0xrouter".to_string(),
                calldata: "0x".to_string(),
                value_usd: 10.0,
            })
        }
    }

    struct UnconfiguredSigner;
    #[async_trait]
    impl Signer for UnconfiguredSigner {
        async fn sign(&self, _chain_id: u64, _to: &str, _value: &str, _calldata: &str) -> anyhow::Result<Option<String>> {
            Ok(None)
        }
        fn is_configured(&self) -> bool {
            false
        }
    }

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

    struct UnreachableSimulator;
    #[async_trait]
    impl Simulator for UnreachableSimulator {
        async fn simulate(
            &self,
            _chain_id: u64,
            _from: &str,
            _to: &str,
            _calldata: &str,
            _value: &str,
        ) -> anyhow::Result<chainclaw_providers::SimulationResult> {
            panic!("simulation should not run when no wallet address is configured")
        }
        async fn simulate_round_trip(
            &self,
            _chain_id: u64,
            _from: &str,
            _token: &str,
            _amount: &str,
        ) -> anyhow::Result<chainclaw_providers::RoundTripSimulation> {
            panic!("simulation should not run when no wallet address is configured")
        }
    }

    struct UnreachableChain;
    #[async_trait]
    impl chainclaw_providers::ChainRpc for UnreachableChain {
        async fn fee_estimate(&self, _chain_id: u64) -> anyhow::Result<chainclaw_providers::FeeEstimate> {
            panic!("chain RPC should not run when no wallet address is configured")
        }
        async fn broadcast(&self, _chain_id: u64, _signed_tx: &str) -> anyhow::Result<String> {
            panic!("chain RPC should not run when no wallet address is configured")
        }
        async fn receipt(&self, _chain_id: u64, _tx_hash: &str) -> anyhow::Result<Option<chainclaw_providers::Receipt>> {
            panic!("chain RPC should not run when no wallet address is configured")
        }
    }

    #[tokio::test]
    async fn missing_wallet_address_fails_without_touching_pipeline() {
        let store = Arc::new(Store::open_in_memory().await.unwrap());
        let job = store.create_dca_job("u1", "USDC", "ETH", "100", 1, DcaFrequency::Daily, None).await.unwrap();
        let dex: Arc<dyn DexAggregator> = Arc::new(StubDex);
        let signer: Arc<dyn Signer> = Arc::new(UnconfiguredSigner);
        let risk = Arc::new(chainclaw_pipeline::RiskEngine::new(Arc::new(AlwaysSafe), Arc::new(NoSource), store.clone()));
        let pipeline = Arc::new(TransactionPipeline::new(
            risk,
            Arc::new(UnreachableSimulator),
            Arc::new(UnreachableChain),
            signer.clone(),
            store.clone(),
            Arc::new(HookBus::new()),
        ));
        let scheduler = DcaScheduler::new(store.clone(), dex, signer, pipeline, Arc::new(HookBus::new()));
        let result = scheduler.execute(&job).await;
        assert!(result.is_err());
        let status = store.list_user_dca_jobs("u1").await.unwrap();
        assert_eq!(status[0].status, DcaStatus::Active);
    }
}
