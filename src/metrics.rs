//! Metrics Calculator (§4.5): derives performance statistics from a backtest result and
//! folds them into one fitness score, gated by the validity thresholds in
//! [`crate::config::ValidationConfig`].

use serde::{Deserialize, Serialize};

use crate::backtest::BacktestResult;
use crate::config::EvolutionConfig;

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct PerformanceMetrics {
    pub total_return: f64,
    pub win_rate: f64,
    pub sharpe_ratio: f64,
    pub max_drawdown: f64,
    pub profit_factor: f64,
    pub trade_count: u32,
    pub avg_win: f64,
    pub avg_loss: f64,
}

const TRADING_PERIODS_PER_YEAR: f64 = 252.0;

pub fn calculate_metrics(result: &BacktestResult) -> PerformanceMetrics {
    let trade_count = result.trades.len() as u32;

    let total_return = result
        .equity_curve
        .last()
        .copied()
        .zip(result.equity_curve.first().copied())
        .map(|(last, first)| (last - first) / first)
        .unwrap_or(0.0);

    let wins = result.trades.iter().filter(|t| t.return_pct > 0.0).count();
    let win_rate = if trade_count == 0 {
        0.0
    } else {
        wins as f64 / trade_count as f64
    };

    let gross_profit: f64 = result.trades.iter().filter(|t| t.return_pct > 0.0).map(|t| t.return_pct).sum();
    let gross_loss: f64 = result
        .trades
        .iter()
        .filter(|t| t.return_pct < 0.0)
        .map(|t| -t.return_pct)
        .sum();
    let profit_factor = if gross_loss > 0.0 {
        gross_profit / gross_loss
    } else if gross_profit > 0.0 {
        f64::INFINITY
    } else {
        0.0
    };

    let sharpe_ratio = sharpe_ratio(result);
    let max_drawdown = max_drawdown(&result.equity_curve);

    PerformanceMetrics {
        total_return,
        win_rate,
        sharpe_ratio,
        max_drawdown,
        profit_factor,
        trade_count,
        avg_win: result.avg_win,
        avg_loss: result.avg_loss,
    }
}

fn sharpe_ratio(result: &BacktestResult) -> f64 {
    let returns: Vec<f64> = result
        .equity_curve
        .windows(2)
        .map(|w| (w[1] - w[0]) / w[0])
        .collect();

    if returns.len() < 2 {
        return 0.0;
    }

    let mean = returns.iter().sum::<f64>() / returns.len() as f64;
    let variance = returns.iter().map(|r| (r - mean).powi(2)).sum::<f64>() / (returns.len() - 1) as f64;
    let std_dev = variance.sqrt();

    if std_dev <= f64::EPSILON {
        return 0.0;
    }

    (mean / std_dev) * TRADING_PERIODS_PER_YEAR.sqrt()
}

fn max_drawdown(equity_curve: &[f64]) -> f64 {
    let mut peak = f64::MIN;
    let mut max_dd = 0.0;
    for &equity in equity_curve {
        if equity > peak {
            peak = equity;
        }
        if peak > 0.0 {
            let drawdown = (peak - equity) / peak;
            if drawdown > max_dd {
                max_dd = drawdown;
            }
        }
    }
    max_dd
}

/// `true` when a chromosome's backtest passes the minimum-viability gates (§4.5); a
/// chromosome failing any gate gets fitness `0.0` regardless of its raw metrics.
pub fn passes_validity_gates(metrics: &PerformanceMetrics, config: &EvolutionConfig) -> bool {
    metrics.trade_count >= config.validation.min_trades
        && metrics.win_rate >= config.validation.min_win_rate
        && metrics.max_drawdown <= config.validation.max_drawdown
}

/// Weighted-sum fitness over the configured metric weights (§4.5, §6 `fitness.weights`).
/// Unrecognized metric names in the weight map are ignored; the weight map is a subset
/// selector over the fixed metric set, not an extension point.
pub fn calculate_fitness(metrics: &PerformanceMetrics, config: &EvolutionConfig) -> f64 {
    if !passes_validity_gates(metrics, config) {
        return 0.0;
    }

    let weights = &config.fitness_weights;
    let mut fitness = 0.0;
    fitness += weights.get("total_return").copied().unwrap_or(0.0) * metrics.total_return;
    fitness += weights.get("sharpe_ratio").copied().unwrap_or(0.0) * metrics.sharpe_ratio;
    fitness += weights.get("win_rate").copied().unwrap_or(0.0) * metrics.win_rate;
    fitness += weights.get("max_drawdown").copied().unwrap_or(0.0) * metrics.max_drawdown;

    if metrics.profit_factor > 1.0 {
        fitness *= 1.0 + (metrics.profit_factor - 1.0) * 0.1;
    }

    fitness.max(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backtest::{Direction, ExitReason, Trade};
    use crate::config::Config;

    fn trade(return_pct: f64) -> Trade {
        Trade {
            entry_index: 0,
            exit_index: 1,
            direction: Direction::Long,
            entry_price: 100.0,
            exit_price: 100.0 * (1.0 + return_pct),
            exit_reason: ExitReason::SignalReversal,
            return_pct,
        }
    }

    #[test]
    fn zero_trades_has_zero_win_rate_and_profit_factor() {
        let result = BacktestResult {
            trades: vec![],
            equity_curve: vec![10_000.0, 10_000.0],
            long_count: 0,
            short_count: 0,
            final_equity: 10_000.0,
            avg_win: 0.0,
            avg_loss: 0.0,
        };
        let metrics = calculate_metrics(&result);
        assert_eq!(metrics.win_rate, 0.0);
        assert_eq!(metrics.profit_factor, 0.0);
        assert_eq!(metrics.trade_count, 0);
    }

    #[test]
    fn failing_min_trades_gate_zeroes_fitness() {
        let metrics = PerformanceMetrics {
            total_return: 0.5,
            win_rate: 0.9,
            sharpe_ratio: 2.0,
            max_drawdown: 0.1,
            profit_factor: 3.0,
            trade_count: 1,
            avg_win: 0.1,
            avg_loss: -0.05,
        };
        let config = Config::default().evolution;
        assert_eq!(calculate_fitness(&metrics, &config), 0.0);
    }

    #[test]
    fn profit_factor_above_one_boosts_fitness_multiplicatively() {
        let base = PerformanceMetrics {
            total_return: 0.5,
            win_rate: 0.9,
            sharpe_ratio: 2.0,
            max_drawdown: 0.1,
            profit_factor: 1.0,
            trade_count: 10,
            avg_win: 0.1,
            avg_loss: -0.05,
        };
        let boosted = PerformanceMetrics {
            profit_factor: 3.0,
            ..base
        };
        let config = Config::default().evolution;
        let fitness_base = calculate_fitness(&base, &config);
        let fitness_boosted = calculate_fitness(&boosted, &config);
        assert!(fitness_boosted > fitness_base);
        assert!((fitness_boosted - fitness_base * 1.2).abs() < 1e-9);
    }

    #[test]
    fn drawdown_is_nonnegative_and_bounded_by_one() {
        let result = BacktestResult {
            trades: vec![trade(0.1), trade(-0.2)],
            equity_curve: vec![100.0, 110.0, 80.0, 90.0],
            long_count: 2,
            short_count: 0,
            final_equity: 90.0,
            avg_win: 0.1,
            avg_loss: -0.2,
        };
        let dd = max_drawdown(&result.equity_curve);
        assert!((0.0..=1.0).contains(&dd));
        assert!(dd > 0.0);
    }
}
