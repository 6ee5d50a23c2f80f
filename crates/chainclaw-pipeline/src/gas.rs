//! Gas policy (spec.md §4.7 stage 5): a pure, synchronous function so the
//! multiplier/tip math is directly unit-testable (`SPEC_FULL.md` §C).

use chainclaw_providers::FeeEstimate;

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GasStrategy {
    Slow,
    Standard,
    Fast,
}

impl Default for GasStrategy {
    fn default() -> Self {
        GasStrategy::Standard
    }
}

impl GasStrategy {
    /// Base-fee multiplier (spec.md §4.7 stage 5: 1.10x/1.25x/2.00x).
    fn base_fee_multiplier(self) -> f64 {
        match self {
            GasStrategy::Slow => 1.10,
            GasStrategy::Standard => 1.25,
            GasStrategy::Fast => 2.00,
        }
    }

    /// Fixed priority tip in gwei (spec.md §4.7 stage 5: 1/1.5/3 gwei),
    /// additive to the multiplied base fee, not itself multiplied
    /// (`SPEC_FULL.md` §C).
    fn priority_tip_gwei(self) -> f64 {
        match self {
            GasStrategy::Slow => 1.0,
            GasStrategy::Standard => 1.5,
            GasStrategy::Fast => 3.0,
        }
    }
}

const WEI_PER_GWEI: u128 = 1_000_000_000;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GasFees {
    Eip1559 { max_fee_per_gas: u128, max_priority_fee_per_gas: u128 },
    Legacy { gas_price: u128 },
}

/// Computes the fee fields to sign for `strategy`, given the chain's fee
/// estimate (spec.md §4.7 stage 5). Non-1559 chains degrade to a legacy
/// `gasPrice` scaled by the same strategy multiplier.
pub fn compute_fees(estimate: &FeeEstimate, strategy: GasStrategy) -> anyhow::Result<GasFees> {
    if estimate.supports_eip1559 {
        let base_fee = estimate
            .base_fee
            .as_deref()
            .ok_or_else(|| anyhow::anyhow!("EIP-1559 chain reported no base fee"))?
            .parse::<u128>()?;
        let tip = (strategy.priority_tip_gwei() * WEI_PER_GWEI as f64) as u128;
        let scaled_base = (base_fee as f64 * strategy.base_fee_multiplier()) as u128;
        Ok(GasFees::Eip1559 { max_fee_per_gas: scaled_base + tip, max_priority_fee_per_gas: tip })
    } else {
        let legacy = estimate
            .legacy_gas_price
            .as_deref()
            .ok_or_else(|| anyhow::anyhow!("non-1559 chain reported no legacy gas price"))?
            .parse::<u128>()?;
        let scaled = (legacy as f64 * strategy.base_fee_multiplier()) as u128;
        Ok(GasFees::Legacy { gas_price: scaled })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn eip1559(base_fee: &str) -> FeeEstimate {
        FeeEstimate { base_fee: Some(base_fee.to_string()), supports_eip1559: true, legacy_gas_price: None }
    }

    fn legacy(gas_price: &str) -> FeeEstimate {
        FeeEstimate { base_fee: None, supports_eip1559: false, legacy_gas_price: Some(gas_price.to_string()) }
    }

    #[test]
    fn standard_strategy_applies_1_25x_multiplier_plus_additive_tip() {
        let estimate = eip1559("100000000000"); // 100 gwei
        let fees = compute_fees(&estimate, GasStrategy::Standard).unwrap();
        let expected_base = (100_000_000_000f64 * 1.25) as u128;
        let expected_tip = (1.5 * WEI_PER_GWEI as f64) as u128;
        match fees {
            GasFees::Eip1559 { max_fee_per_gas, max_priority_fee_per_gas } => {
                assert_eq!(max_priority_fee_per_gas, expected_tip);
                assert_eq!(max_fee_per_gas, expected_base + expected_tip);
            }
            GasFees::Legacy { .. } => panic!("expected eip1559 fees"),
        }
    }

    #[test]
    fn fast_strategy_multiplies_base_fee_by_two() {
        let estimate = eip1559("50000000000");
        let fees = compute_fees(&estimate, GasStrategy::Fast).unwrap();
        match fees {
            GasFees::Eip1559 { max_fee_per_gas, max_priority_fee_per_gas } => {
                let expected_tip = (3.0 * WEI_PER_GWEI as f64) as u128;
                assert_eq!(max_priority_fee_per_gas, expected_tip);
                assert_eq!(max_fee_per_gas, 100_000_000_000 + expected_tip);
            }
            GasFees::Legacy { .. } => panic!("expected eip1559 fees"),
        }
    }

    #[test]
    fn non_1559_chain_degrades_to_legacy_gas_price() {
        let estimate = legacy("20000000000");
        let fees = compute_fees(&estimate, GasStrategy::Slow).unwrap();
        match fees {
            GasFees::Legacy { gas_price } => assert_eq!(gas_price, (20_000_000_000f64 * 1.10) as u128),
            GasFees::Eip1559 { .. } => panic!("expected legacy fees"),
        }
    }

    #[test]
    fn default_strategy_is_standard() {
        assert_eq!(GasStrategy::default(), GasStrategy::Standard);
    }
}
