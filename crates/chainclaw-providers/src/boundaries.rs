//! Narrow typed traits for every outbound API the Risk Engine and
//! Transaction Pipeline touch (spec.md §6). Concrete implementations
//! (chain RPC, signer, token-safety/contract-verification/aggregator APIs)
//! are external collaborators out of this spec's scope (spec.md §1); only
//! the boundary shape lives here, plus small in-memory mocks used by
//! higher-layer tests.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Token-safety API result (spec.md §4.8): honeypot/owner-privilege/tax/
/// holder-concentration assessment for one contract on one chain.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TokenSafetyReport {
    pub honeypot: bool,
    pub buy_tax_pct: f64,
    pub sell_tax_pct: f64,
    pub owner_can_mint: bool,
    pub owner_can_pause: bool,
    pub holder_concentration_pct: f64,
    /// Vendor's own 0-100 risk score, if it publishes one.
    pub vendor_score: Option<f64>,
}

#[async_trait]
pub trait TokenSafetyApi: Send + Sync {
    async fn report(&self, chain_id: u64, address: &str) -> anyhow::Result<TokenSafetyReport>;
}

#[async_trait]
pub trait ContractVerificationApi: Send + Sync {
    /// `None` if the contract is unverified/proxy-unresolved.
    async fn source_code(&self, chain_id: u64, address: &str) -> anyhow::Result<Option<String>>;
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SwapQuote {
    pub from_token: String,
    pub to_token: String,
    pub amount_in: String,
    pub amount_out: String,
    pub price_impact_pct: f64,
    pub route: Vec<String>,
    pub to_address: String,
    pub calldata: String,
    pub value_usd: f64,
}

#[async_trait]
pub trait DexAggregator: Send + Sync {
    async fn quote_swap(
        &self,
        chain_id: u64,
        from_token: &str,
        to_token: &str,
        amount: &str,
    ) -> anyhow::Result<SwapQuote>;
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BridgeQuote {
    pub from_chain_id: u64,
    pub to_chain_id: u64,
    pub token: String,
    pub amount_in: String,
    pub amount_out: String,
    pub eta_secs: u64,
    pub to_address: String,
    pub calldata: String,
    pub value_usd: f64,
}

#[async_trait]
pub trait BridgeAggregator: Send + Sync {
    async fn quote_bridge(
        &self,
        from_chain_id: u64,
        to_chain_id: u64,
        token: &str,
        amount: &str,
    ) -> anyhow::Result<BridgeQuote>;
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LendQuote {
    pub pool: String,
    pub token: String,
    pub amount: String,
    pub apy_pct: f64,
    pub to_address: String,
    pub calldata: String,
    pub value_usd: f64,
}

#[async_trait]
pub trait LendingPoolApi: Send + Sync {
    async fn quote_lend(&self, chain_id: u64, token: &str, amount: &str) -> anyhow::Result<LendQuote>;
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoricalPricePoint {
    pub day: chrono::NaiveDate,
    pub price_usd: f64,
}

#[async_trait]
pub trait HistoricalPriceService: Send + Sync {
    async fn series(
        &self,
        token: &str,
        start: chrono::NaiveDate,
        end: chrono::NaiveDate,
    ) -> anyhow::Result<Vec<HistoricalPricePoint>>;
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct YieldListing {
    pub pool: String,
    pub token: String,
    pub apy_pct: f64,
    pub tvl_usd: f64,
}

#[async_trait]
pub trait YieldListService: Send + Sync {
    async fn list(&self, chain_id: u64) -> anyhow::Result<Vec<YieldListing>>;
}

/// Bundled pre-flight simulation result (spec.md §4.7 stage 2).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulationResult {
    pub success: bool,
    pub balance_changes: Vec<BalanceChange>,
    pub gas_estimate: String,
    pub revert_reason: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BalanceChange {
    pub token: String,
    pub delta: String,
}

/// The sell-after-buy three-tx bundle result used to detect honeypots
/// (spec.md §4.7 stage 2).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoundTripSimulation {
    pub sellable: bool,
    pub round_trip_loss_pct: f64,
}

#[async_trait]
pub trait Simulator: Send + Sync {
    async fn simulate(
        &self,
        chain_id: u64,
        from: &str,
        to: &str,
        calldata: &str,
        value: &str,
    ) -> anyhow::Result<SimulationResult>;

    async fn simulate_round_trip(
        &self,
        chain_id: u64,
        from: &str,
        token: &str,
        amount: &str,
    ) -> anyhow::Result<RoundTripSimulation>;
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeeEstimate {
    pub base_fee: Option<String>,
    pub supports_eip1559: bool,
    pub legacy_gas_price: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Receipt {
    pub status: bool,
    pub gas_used: String,
    pub block_number: u64,
}

/// Chain RPC boundary (spec.md §1 "concrete chain RPC ... client" is out of
/// scope; this is the thin interface the pipeline depends on).
#[async_trait]
pub trait ChainRpc: Send + Sync {
    async fn fee_estimate(&self, chain_id: u64) -> anyhow::Result<FeeEstimate>;
    async fn broadcast(&self, chain_id: u64, signed_tx: &str) -> anyhow::Result<String>;
    /// `None` while still pending.
    async fn receipt(&self, chain_id: u64, tx_hash: &str) -> anyhow::Result<Option<Receipt>>;
}

/// Key-management/signing boundary (spec.md §1: "the key-management/
/// signing sub-library" is out of scope). `None` signals no signing
/// credentials are available, in which case skills degrade to quote-only
/// mode (spec.md §4.1).
#[async_trait]
pub trait Signer: Send + Sync {
    async fn sign(&self, chain_id: u64, to: &str, value: &str, calldata: &str) -> anyhow::Result<Option<String>>;

    /// Whether signing credentials are present at all, checked before a
    /// skill decides between quote-only and broadcast mode (spec.md §4.1:
    /// "when no signing credentials are available, degrades to quote-only
    /// mode and still returns success"). Default `true` so in-memory test
    /// signers that always return `Some` from `sign` need no override.
    fn is_configured(&self) -> bool {
        true
    }
}

/// One token balance on one chain (spec.md §4.1 `balance` skill).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenBalance {
    pub token: String,
    pub amount: String,
    pub usd_value: Option<f64>,
}

/// Per-chain per-token balance boundary (spec.md §1: "the concrete chain RPC
/// ... client" is out of scope; this is the thin read-only interface the
/// `balance`/`portfolio` skills depend on).
#[async_trait]
pub trait WalletBalanceApi: Send + Sync {
    async fn balances(&self, chain_id: u64, wallet_address: &str) -> anyhow::Result<Vec<TokenBalance>>;
}
