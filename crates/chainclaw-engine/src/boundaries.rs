//! Fallback implementations of the external-collaborator boundaries
//! (spec.md §1: chain RPC, signer, token-safety/contract-verification/
//! aggregator/lending/pricing clients are out of scope for this repo).
//!
//! `chainclaw-engine` still has to hand every skill and pipeline stage a
//! concrete object, so each trait gets an "unconfigured" implementation
//! here: reads return an explicit error (or, where the trait's own contract
//! already has an absence value — `Signer::sign`'s `Option`, `PriceFeed`'s
//! `Option` — that value) rather than a network call. Swapping in a real
//! client is a matter of implementing the same trait and passing it to
//! [`crate::main`]'s boot wiring instead of these.

use async_trait::async_trait;
use chainclaw_providers::{
    BridgeAggregator, BridgeQuote, ChainRpc, ContractVerificationApi, DexAggregator, FeeEstimate, LendQuote,
    LendingPoolApi, PriceFeed, Receipt, RoundTripSimulation, Signer, Simulator, SimulationResult, SwapQuote,
    TokenBalance, TokenSafetyApi, TokenSafetyReport, WalletBalanceApi,
};

fn unconfigured(collaborator: &str) -> anyhow::Error {
    anyhow::anyhow!("{collaborator} is an external collaborator not wired into this build")
}

pub struct UnconfiguredTokenSafety;
#[async_trait]
impl TokenSafetyApi for UnconfiguredTokenSafety {
    async fn report(&self, _chain_id: u64, _address: &str) -> anyhow::Result<TokenSafetyReport> {
        Err(unconfigured("token-safety API"))
    }
}

pub struct UnconfiguredContractVerification;
#[async_trait]
impl ContractVerificationApi for UnconfiguredContractVerification {
    async fn source_code(&self, _chain_id: u64, _address: &str) -> anyhow::Result<Option<String>> {
        Err(unconfigured("contract-verification API"))
    }
}

pub struct UnconfiguredDexAggregator;
#[async_trait]
impl DexAggregator for UnconfiguredDexAggregator {
    async fn quote_swap(
        &self,
        _chain_id: u64,
        _from_token: &str,
        _to_token: &str,
        _amount: &str,
    ) -> anyhow::Result<SwapQuote> {
        Err(unconfigured("DEX aggregator"))
    }
}

pub struct UnconfiguredBridgeAggregator;
#[async_trait]
impl BridgeAggregator for UnconfiguredBridgeAggregator {
    async fn quote_bridge(
        &self,
        _from_chain_id: u64,
        _to_chain_id: u64,
        _token: &str,
        _amount: &str,
    ) -> anyhow::Result<BridgeQuote> {
        Err(unconfigured("bridge aggregator"))
    }
}

pub struct UnconfiguredLendingPool;
#[async_trait]
impl LendingPoolApi for UnconfiguredLendingPool {
    async fn quote_lend(&self, _chain_id: u64, _token: &str, _amount: &str) -> anyhow::Result<LendQuote> {
        Err(unconfigured("lending pool API"))
    }
}

pub struct UnconfiguredSimulator;
#[async_trait]
impl Simulator for UnconfiguredSimulator {
    async fn simulate(
        &self,
        _chain_id: u64,
        _from: &str,
        _to: &str,
        _calldata: &str,
        _value: &str,
    ) -> anyhow::Result<SimulationResult> {
        Err(unconfigured("transaction simulator"))
    }

    async fn simulate_round_trip(
        &self,
        _chain_id: u64,
        _from: &str,
        _token: &str,
        _amount: &str,
    ) -> anyhow::Result<RoundTripSimulation> {
        Err(unconfigured("transaction simulator"))
    }
}

pub struct UnconfiguredChainRpc;
#[async_trait]
impl ChainRpc for UnconfiguredChainRpc {
    async fn fee_estimate(&self, _chain_id: u64) -> anyhow::Result<FeeEstimate> {
        Err(unconfigured("chain RPC client"))
    }
    async fn broadcast(&self, _chain_id: u64, _signed_tx: &str) -> anyhow::Result<String> {
        Err(unconfigured("chain RPC client"))
    }
    async fn receipt(&self, _chain_id: u64, _tx_hash: &str) -> anyhow::Result<Option<Receipt>> {
        Err(unconfigured("chain RPC client"))
    }
}

/// No signing credentials (spec.md §4.1: skills degrade to quote-only mode
/// when `is_configured()` is `false`), rather than an error — an unsigned
/// wallet is an expected, routine state, not a misconfiguration.
pub struct UnconfiguredSigner;
#[async_trait]
impl Signer for UnconfiguredSigner {
    async fn sign(&self, _chain_id: u64, _to: &str, _value: &str, _calldata: &str) -> anyhow::Result<Option<String>> {
        Ok(None)
    }
    fn is_configured(&self) -> bool {
        false
    }
}

pub struct UnconfiguredWalletBalance;
#[async_trait]
impl WalletBalanceApi for UnconfiguredWalletBalance {
    async fn balances(&self, _chain_id: u64, _wallet_address: &str) -> anyhow::Result<Vec<TokenBalance>> {
        Err(unconfigured("wallet balance API"))
    }
}

/// `PriceFeed` fails soft into "unknown" (`Ok(None)`) rather than an error:
/// `PriceOracle::get_token_price` already treats `None` as a legitimate
/// "no price available" answer for callers to handle.
pub struct UnconfiguredPriceFeed;
#[async_trait]
impl PriceFeed for UnconfiguredPriceFeed {
    async fn fetch_price(&self, _symbol: &str) -> anyhow::Result<Option<f64>> {
        Ok(None)
    }
}
