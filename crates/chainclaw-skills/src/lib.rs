//! Skill Registry and the 13 built-in skills (spec.md §4.1): `balance`,
//! `swap`, `bridge`, `lend`, `dca`, `alert`, `workflow`, `portfolio`,
//! `risk_check`, `history`, `backtest`, `agent`, `marketplace`.
//!
//! Grounded on `tandem-skills`'s registration-rejects-duplicate-name
//! pattern, generalised from markdown-file skill discovery to typed
//! handlers implementing [`chainclaw_types::skill::Skill`].

pub mod registry;
pub mod skills;

pub use registry::SkillRegistry;

use std::sync::Arc;

use chainclaw_memory::Store;
use chainclaw_pipeline::{RiskEngine, TransactionPipeline};
use chainclaw_providers::{BridgeAggregator, DexAggregator, LendingPoolApi, PriceOracle, Signer, WalletBalanceApi};
use chainclaw_strategy::{AgentRunner, Marketplace, StrategyRegistry};

/// Every boundary and subsystem the 13 built-in skills close over. Bundled
/// so boot wiring (`chainclaw-engine`) constructs the skill set in one call
/// once every leaf dependency exists.
pub struct SkillDeps {
    pub store: Arc<Store>,
    pub risk: Arc<RiskEngine>,
    pub wallet: Arc<dyn WalletBalanceApi>,
    pub prices: Arc<PriceOracle>,
    pub signer: Arc<dyn Signer>,
    pub pipeline: Arc<TransactionPipeline>,
    pub dex: Arc<dyn DexAggregator>,
    pub bridge: Arc<dyn BridgeAggregator>,
    pub lending: Arc<dyn LendingPoolApi>,
    pub strategy_registry: StrategyRegistry,
    pub agent_runner: AgentRunner,
    pub marketplace: Marketplace,
}

/// Registers every built-in skill once, in the order listed in spec.md §4.1.
/// Registration failures here indicate a programming error (duplicate
/// names), so they are surfaced with `expect` rather than threaded through
/// as a boot-time `Result`.
pub async fn register_builtin_skills(registry: &SkillRegistry, deps: SkillDeps) {
    registry
        .register(Arc::new(skills::BalanceSkill::new(deps.wallet.clone())))
        .await
        .expect("balance is registered exactly once");
    registry
        .register(Arc::new(skills::SwapSkill::new(deps.dex, deps.signer.clone(), deps.pipeline.clone())))
        .await
        .expect("swap is registered exactly once");
    registry
        .register(Arc::new(skills::BridgeSkill::new(deps.bridge, deps.signer.clone(), deps.pipeline.clone())))
        .await
        .expect("bridge is registered exactly once");
    registry
        .register(Arc::new(skills::LendSkill::new(deps.lending, deps.signer, deps.pipeline)))
        .await
        .expect("lend is registered exactly once");
    registry
        .register(Arc::new(skills::DcaSkill::new(deps.store.clone())))
        .await
        .expect("dca is registered exactly once");
    registry
        .register(Arc::new(skills::AlertSkill::new(deps.store.clone())))
        .await
        .expect("alert is registered exactly once");
    registry
        .register(Arc::new(skills::WorkflowSkill::new(registry.clone())))
        .await
        .expect("workflow is registered exactly once");
    registry
        .register(Arc::new(skills::PortfolioSkill::new(deps.wallet, deps.prices)))
        .await
        .expect("portfolio is registered exactly once");
    registry
        .register(Arc::new(skills::RiskCheckSkill::new(deps.risk)))
        .await
        .expect("risk_check is registered exactly once");
    registry
        .register(Arc::new(skills::HistorySkill::new(deps.store.clone())))
        .await
        .expect("history is registered exactly once");
    registry
        .register(Arc::new(skills::BacktestSkill::new(deps.store, deps.strategy_registry.clone())))
        .await
        .expect("backtest is registered exactly once");
    registry
        .register(Arc::new(skills::AgentSkill::new(deps.strategy_registry, deps.agent_runner)))
        .await
        .expect("agent is registered exactly once");
    registry
        .register(Arc::new(skills::MarketplaceSkill::new(deps.marketplace)))
        .await
        .expect("marketplace is registered exactly once");
}
