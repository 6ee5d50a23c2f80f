//! Risk Engine (spec.md §4.8): external token-safety report + contract-
//! source pattern scan + per-user allow/block lists, combined into a single
//! `safe|medium|high|critical` score and a `shouldBlock` verdict.
//!
//! Grounded on `tandem-tools`'s sequential-check pattern
//! (`ToolRegistry::execute` validating, then dispatching), repointed from
//! tool dispatch to a fixed scoring pipeline.

use std::sync::Arc;

use regex::RegexSet;

use chainclaw_memory::{ListType, Store};
use chainclaw_providers::{ContractVerificationApi, TokenSafetyApi, TokenSafetyReport};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskCategory {
    Safe,
    Medium,
    High,
    Critical,
}

/// Named source patterns the scanner looks for (spec.md §4.8). Each pattern
/// contributes a point to the combined score when it matches.
const SOURCE_PATTERNS: &[(&str, &str)] = &[
    ("selfdestruct", r"selfdestruct\s*\("),
    ("arbitrary_delegatecall", r"\.delegatecall\s*\("),
    ("hidden_mint", r"function\s+_?mint\s*\([^)]*\)\s*(internal|private)?\s*\{[^}]*only"),
    ("modifiable_fees", r"function\s+set(Buy|Sell|Transfer)?Fee"),
    ("proxy_upgradeable", r"(UUPSUpgradeable|TransparentUpgradeableProxy|delegatecall\s*\(\s*implementation)"),
    ("owner_only_withdraw", r"function\s+withdraw\w*\s*\([^)]*\)\s*(external|public)?\s*onlyOwner"),
    ("inline_assembly", r"assembly\s*\{"),
];

#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
pub struct SourceScanResult {
    pub matched_patterns: Vec<String>,
}

/// Verdict returned by [`RiskEngine::should_block`] (spec.md §4.7 stage 1).
#[derive(Debug, Clone)]
pub struct BlockVerdict {
    pub blocked: bool,
    pub reason: Option<String>,
}

/// Default auto-block threshold on the combined 0-10 score (spec.md §4.8
/// names a "configured threshold" without pinning a number; `7` puts
/// `critical` category contracts over the line while leaving `high`
/// reachable by an explicit allowlist).
pub const DEFAULT_AUTO_BLOCK_THRESHOLD: u32 = 7;

pub struct RiskEngine {
    token_safety: Arc<dyn TokenSafetyApi>,
    contract_verification: Arc<dyn ContractVerificationApi>,
    store: Arc<Store>,
    auto_block_threshold: u32,
    pattern_set: RegexSet,
}

impl RiskEngine {
    pub fn new(
        token_safety: Arc<dyn TokenSafetyApi>,
        contract_verification: Arc<dyn ContractVerificationApi>,
        store: Arc<Store>,
    ) -> Self {
        let pattern_set = RegexSet::new(SOURCE_PATTERNS.iter().map(|(_, p)| *p))
            .expect("risk engine source patterns are valid regexes");
        Self {
            token_safety,
            contract_verification,
            store,
            auto_block_threshold: DEFAULT_AUTO_BLOCK_THRESHOLD,
            pattern_set,
        }
    }

    pub fn with_auto_block_threshold(mut self, threshold: u32) -> Self {
        self.auto_block_threshold = threshold;
        self
    }

    /// Scans verified source for the named risk patterns (spec.md §4.8).
    pub fn scan_source(&self, source: &str) -> SourceScanResult {
        let matches = self.pattern_set.matches(source);
        let matched_patterns = SOURCE_PATTERNS
            .iter()
            .enumerate()
            .filter(|(i, _)| matches.matched(*i))
            .map(|(_, (name, _))| name.to_string())
            .collect();
        SourceScanResult { matched_patterns }
    }

    /// Combined score, 0-10: one point per matched source pattern plus
    /// points for the token-safety report's flagged fields.
    pub fn score(&self, report: &TokenSafetyReport, scan: &SourceScanResult) -> u32 {
        let mut score = scan.matched_patterns.len() as u32;
        if report.honeypot {
            score += 10;
        }
        if report.owner_can_mint {
            score += 2;
        }
        if report.owner_can_pause {
            score += 1;
        }
        if report.buy_tax_pct > 10.0 || report.sell_tax_pct > 10.0 {
            score += 2;
        }
        if report.holder_concentration_pct > 50.0 {
            score += 2;
        }
        score
    }

    pub fn categorize(score: u32) -> RiskCategory {
        match score {
            0 => RiskCategory::Safe,
            1..=3 => RiskCategory::Medium,
            4..=6 => RiskCategory::High,
            _ => RiskCategory::Critical,
        }
    }

    /// Fetches/caches the token-safety report, runs the source scan if
    /// verified source is available, and combines both into a score.
    pub async fn assess(&self, chain_id: u64, address: &str) -> anyhow::Result<(TokenSafetyReport, u32)> {
        let report = match self.store.get_cached_risk_report(address, chain_id).await? {
            Some(cached) => cached,
            None => {
                let fresh = self.token_safety.report(chain_id, address).await?;
                self.store.cache_risk_report(address, chain_id, &fresh).await?;
                fresh
            }
        };
        let scan = match self.contract_verification.source_code(chain_id, address).await? {
            Some(source) => self.scan_source(&source),
            None => SourceScanResult::default(),
        };
        let score = self.score(&report, &scan);
        Ok((report, score))
    }

    /// `shouldBlock(userId, chainId, counterpartyAddress)` (spec.md §4.7
    /// stage 1, §4.8): hard block on user blocklist, bypass on user
    /// allowlist, auto-block above threshold; honeypot is an absolute hard
    /// block regardless of either list.
    pub async fn should_block(
        &self,
        user_id: &str,
        chain_id: u64,
        counterparty_address: &str,
    ) -> anyhow::Result<BlockVerdict> {
        let (report, score) = self.assess(chain_id, counterparty_address).await?;

        if report.honeypot {
            return Ok(BlockVerdict { blocked: true, reason: Some("token is a honeypot".to_string()) });
        }
        if self
            .store
            .is_on_risk_list(user_id, chain_id, counterparty_address, ListType::Block)
            .await?
        {
            return Ok(BlockVerdict { blocked: true, reason: Some("address is on your blocklist".to_string()) });
        }
        if self
            .store
            .is_on_risk_list(user_id, chain_id, counterparty_address, ListType::Allow)
            .await?
        {
            return Ok(BlockVerdict { blocked: false, reason: None });
        }
        if score >= self.auto_block_threshold {
            return Ok(BlockVerdict {
                blocked: true,
                reason: Some(format!(
                    "risk score {score} ({:?}) exceeds the auto-block threshold",
                    Self::categorize(score)
                )),
            });
        }
        Ok(BlockVerdict { blocked: false, reason: None })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    struct FixedSafety(TokenSafetyReport);
    #[async_trait]
    impl TokenSafetyApi for FixedSafety {
        async fn report(&self, _chain_id: u64, _address: &str) -> anyhow::Result<TokenSafetyReport> {
            Ok(self.0.clone())
        }
    }

    struct FixedSource(Option<String>);
    #[async_trait]
    impl ContractVerificationApi for FixedSource {
        async fn source_code(&self, _chain_id: u64, _address: &str) -> anyhow::Result<Option<String>> {
            Ok(self.0.clone())
        }
    }

    fn engine(safety: TokenSafetyReport, source: Option<String>, store: Arc<Store>) -> RiskEngine {
        RiskEngine::new(Arc::new(FixedSafety(safety)), Arc::new(FixedSource(source)), store)
    }

    #[tokio::test]
    async fn honeypot_is_hard_blocked_even_with_allowlist() {
        let store = Arc::new(Store::open_in_memory().await.unwrap());
        store.add_to_risk_list("u1", 1, "0xtoken", ListType::Allow).await.unwrap();
        let e = engine(TokenSafetyReport { honeypot: true, ..Default::default() }, None, store);
        let verdict = e.should_block("u1", 1, "0xtoken").await.unwrap();
        assert!(verdict.blocked);
    }

    #[tokio::test]
    async fn blocklist_blocks_regardless_of_score() {
        let store = Arc::new(Store::open_in_memory().await.unwrap());
        store.add_to_risk_list("u1", 1, "0xtoken", ListType::Block).await.unwrap();
        let e = engine(TokenSafetyReport::default(), None, store);
        let verdict = e.should_block("u1", 1, "0xtoken").await.unwrap();
        assert!(verdict.blocked);
    }

    #[tokio::test]
    async fn allowlist_bypasses_high_score() {
        let store = Arc::new(Store::open_in_memory().await.unwrap());
        store.add_to_risk_list("u1", 1, "0xtoken", ListType::Allow).await.unwrap();
        let source = "contract C { function kill() public { selfdestruct(payable(owner)); } }".to_string();
        let e = engine(
            TokenSafetyReport { owner_can_mint: true, owner_can_pause: true, ..Default::default() },
            Some(source),
            store,
        );
        let verdict = e.should_block("u1", 1, "0xtoken").await.unwrap();
        assert!(!verdict.blocked);
    }

    #[tokio::test]
    async fn safe_token_with_no_flags_is_not_blocked() {
        let store = Arc::new(Store::open_in_memory().await.unwrap());
        let e = engine(TokenSafetyReport::default(), None, store);
        let verdict = e.should_block("u1", 1, "0xtoken").await.unwrap();
        assert!(!verdict.blocked);
    }

    #[test]
    fn scanner_detects_named_patterns() {
        let store_unused = ();
        let _ = store_unused;
        let pattern_set = RegexSet::new(SOURCE_PATTERNS.iter().map(|(_, p)| *p)).unwrap();
        let source = "assembly { mstore(0, 0) }";
        let matches = pattern_set.matches(source);
        assert!(matches.matched(SOURCE_PATTERNS.iter().position(|(n, _)| *n == "inline_assembly").unwrap()));
    }

    #[test]
    fn score_categorisation_matches_spec_buckets() {
        assert_eq!(RiskEngine::categorize(0), RiskCategory::Safe);
        assert_eq!(RiskEngine::categorize(2), RiskCategory::Medium);
        assert_eq!(RiskEngine::categorize(5), RiskCategory::High);
        assert_eq!(RiskEngine::categorize(9), RiskCategory::Critical);
    }
}
