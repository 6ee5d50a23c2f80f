//! Shared performance metrics computation (spec.md §4.10 step 4), used by
//! both the Backtest Engine and the live Performance Tracker so the two
//! report the same numbers the same way (SPEC_FULL.md §B "Performance
//! Tracker").

use chainclaw_types::agent::PerformanceMetrics;

/// One point on an equity curve: cumulative portfolio value after a trade
/// (or at the start/end of a period).
#[derive(Debug, Clone, Copy, serde::Serialize, serde::Deserialize)]
pub struct EquityPoint {
    pub timestamp: chrono::DateTime<chrono::Utc>,
    pub equity_usd: f64,
}

/// One realised trade return, as a fraction of the capital it risked.
#[derive(Debug, Clone, Copy)]
pub struct TradeReturn {
    pub return_pct: f64,
}

/// Computes the metrics named in spec.md §4.10 step 4 from an equity curve
/// and the per-trade returns that produced it.
pub fn compute_metrics(
    equity_curve: &[EquityPoint],
    trade_returns: &[TradeReturn],
    benchmark_return_pct: Option<f64>,
) -> PerformanceMetrics {
    let mut metrics = PerformanceMetrics::default();
    if equity_curve.len() < 2 {
        return metrics;
    }
    let start = equity_curve.first().unwrap().equity_usd;
    let end = equity_curve.last().unwrap().equity_usd;
    metrics.total_return_pct = if start > 0.0 { (end - start) / start * 100.0 } else { 0.0 };

    let mut peak = start;
    let mut max_drawdown = 0.0;
    for point in equity_curve {
        if point.equity_usd > peak {
            peak = point.equity_usd;
        }
        if peak > 0.0 {
            let drawdown = (peak - point.equity_usd) / peak * 100.0;
            if drawdown > max_drawdown {
                max_drawdown = drawdown;
            }
        }
    }
    metrics.max_drawdown_pct = max_drawdown;

    metrics.total_trades = trade_returns.len() as u32;
    metrics.profitable_trades = trade_returns.iter().filter(|t| t.return_pct > 0.0).count() as u32;
    metrics.win_rate_pct = if metrics.total_trades > 0 {
        metrics.profitable_trades as f64 / metrics.total_trades as f64 * 100.0
    } else {
        0.0
    };
    metrics.avg_trade_return_pct = if metrics.total_trades > 0 {
        trade_returns.iter().map(|t| t.return_pct).sum::<f64>() / metrics.total_trades as f64
    } else {
        0.0
    };

    metrics.sharpe_ratio = sharpe_ratio(trade_returns);

    metrics.benchmark_return_pct = benchmark_return_pct;
    metrics.alpha_pct = benchmark_return_pct.map(|bench| metrics.total_return_pct - bench);

    metrics
}

/// Annualisation-free Sharpe: mean return over its own standard deviation,
/// zero when there are fewer than two trades or the returns have no
/// dispersion (avoids a divide-by-zero NaN).
fn sharpe_ratio(trade_returns: &[TradeReturn]) -> f64 {
    if trade_returns.len() < 2 {
        return 0.0;
    }
    let returns: Vec<f64> = trade_returns.iter().map(|t| t.return_pct).collect();
    let mean = returns.iter().sum::<f64>() / returns.len() as f64;
    let variance = returns.iter().map(|r| (r - mean).powi(2)).sum::<f64>() / returns.len() as f64;
    let std_dev = variance.sqrt();
    if std_dev == 0.0 {
        0.0
    } else {
        mean / std_dev
    }
}
