//! Event-driven backtest simulator (§4.4): walks the composite signal series bar by bar
//! through a Flat/Long/Short state machine, enforcing the single-open-position invariant
//! and applying commission + slippage at every fill.

use serde::{Deserialize, Serialize};

use crate::config::RiskManagementConfig;
use crate::data::bar::Bar;
use crate::error::{EvoError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Direction {
    Long,
    Short,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExitReason {
    StopLoss,
    TakeProfit,
    TrailingStop,
    SignalReversal,
    PeriodEnd,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Trade {
    pub entry_index: usize,
    pub exit_index: usize,
    pub direction: Direction,
    pub entry_price: f64,
    pub exit_price: f64,
    pub exit_reason: ExitReason,
    pub return_pct: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BacktestResult {
    pub trades: Vec<Trade>,
    /// Cumulative capital after each bar, starting from `risk.initial_capital`.
    pub equity_curve: Vec<f64>,
    pub long_count: u32,
    pub short_count: u32,
    /// Equity after the last bar, or the starting capital if no bar was simulated.
    pub final_equity: f64,
    pub avg_win: f64,
    pub avg_loss: f64,
}

enum Position {
    Flat,
    Open {
        direction: Direction,
        entry_index: usize,
        entry_price: f64,
        extreme_price: f64,
    },
}

/// Runs the simulator over `bars` driven by `signals` (one composite signal per bar, same
/// length, from [`crate::aggregator::aggregate_signals`]).
pub fn run_backtest(bars: &[Bar], signals: &[f64], risk: &RiskManagementConfig) -> Result<BacktestResult> {
    if bars.len() != signals.len() {
        return Err(EvoError::LogicViolation(format!(
            "bars ({}) and signals ({}) length mismatch",
            bars.len(),
            signals.len()
        )));
    }
    if bars.is_empty() {
        return Err(EvoError::insufficient_data("cannot backtest an empty bar series"));
    }

    let mut position = Position::Flat;
    let mut trades = Vec::new();
    let mut equity = risk.initial_capital;
    let mut equity_curve = Vec::with_capacity(bars.len());

    let last_index = bars.len() - 1;

    for (i, bar) in bars.iter().enumerate() {
        let signal = signals[i];

        match &mut position {
            Position::Flat => {
                if signal.abs() >= risk.signal_threshold {
                    let direction = if signal > 0.0 { Direction::Long } else { Direction::Short };
                    let entry_price = apply_slippage(bar.close, direction, risk.slippage, true);
                    position = Position::Open {
                        direction,
                        entry_index: i,
                        entry_price,
                        extreme_price: entry_price,
                    };
                }
            }
            Position::Open {
                direction,
                entry_index,
                entry_price,
                extreme_price,
            } => {
                update_extreme(*direction, extreme_price, bar);

                let exit_reason = determine_exit(
                    *direction,
                    *entry_price,
                    *extreme_price,
                    bar,
                    signal,
                    risk,
                    i == last_index,
                );

                if let Some(reason) = exit_reason {
                    let exit_price = apply_slippage(exit_price_for(reason, bar), *direction, risk.slippage, false);
                    let gross_return = direction_return(*direction, *entry_price, exit_price);
                    let net_return = gross_return - 2.0 * risk.commission;

                    trades.push(Trade {
                        entry_index: *entry_index,
                        exit_index: i,
                        direction: *direction,
                        entry_price: *entry_price,
                        exit_price,
                        exit_reason: reason,
                        return_pct: net_return,
                    });

                    equity *= 1.0 + net_return * risk.max_position_size;
                    position = Position::Flat;
                }
            }
        }

        equity_curve.push(equity);
    }

    let long_count = trades.iter().filter(|t| t.direction == Direction::Long).count() as u32;
    let short_count = trades.iter().filter(|t| t.direction == Direction::Short).count() as u32;
    let final_equity = equity_curve.last().copied().unwrap_or(risk.initial_capital);
    let avg_win = average(trades.iter().map(|t| t.return_pct).filter(|r| *r > 0.0));
    let avg_loss = average(trades.iter().map(|t| t.return_pct).filter(|r| *r < 0.0));

    Ok(BacktestResult {
        trades,
        equity_curve,
        long_count,
        short_count,
        final_equity,
        avg_win,
        avg_loss,
    })
}

fn average(values: impl Iterator<Item = f64>) -> f64 {
    let values: Vec<f64> = values.collect();
    if values.is_empty() {
        0.0
    } else {
        values.iter().sum::<f64>() / values.len() as f64
    }
}

fn update_extreme(direction: Direction, extreme_price: &mut f64, bar: &Bar) {
    match direction {
        Direction::Long => {
            if bar.high > *extreme_price {
                *extreme_price = bar.high;
            }
        }
        Direction::Short => {
            if bar.low < *extreme_price {
                *extreme_price = bar.low;
            }
        }
    }
}

#[allow(clippy::too_many_arguments)]
fn determine_exit(
    direction: Direction,
    entry_price: f64,
    extreme_price: f64,
    bar: &Bar,
    signal: f64,
    risk: &RiskManagementConfig,
    is_last_bar: bool,
) -> Option<ExitReason> {
    let stop_loss_price = match direction {
        Direction::Long => entry_price * (1.0 - risk.stop_loss_pct),
        Direction::Short => entry_price * (1.0 + risk.stop_loss_pct),
    };
    let take_profit_price = match direction {
        Direction::Long => entry_price * (1.0 + risk.take_profit_pct),
        Direction::Short => entry_price * (1.0 - risk.take_profit_pct),
    };
    let trailing_stop_price = match direction {
        Direction::Long => extreme_price * (1.0 - risk.trailing_stop_pct),
        Direction::Short => extreme_price * (1.0 + risk.trailing_stop_pct),
    };

    let hit_stop_loss = match direction {
        Direction::Long => bar.low <= stop_loss_price,
        Direction::Short => bar.high >= stop_loss_price,
    };
    let hit_take_profit = match direction {
        Direction::Long => bar.high >= take_profit_price,
        Direction::Short => bar.low <= take_profit_price,
    };
    let hit_trailing_stop = match direction {
        Direction::Long => bar.low <= trailing_stop_price,
        Direction::Short => bar.high >= trailing_stop_price,
    };
    let reversed = match direction {
        Direction::Long => signal <= -risk.signal_threshold,
        Direction::Short => signal >= risk.signal_threshold,
    };

    // Priority order per §4.4: stop-loss, take-profit, trailing-stop, signal-reversal,
    // then a forced period-end close on the last bar.
    if hit_stop_loss {
        Some(ExitReason::StopLoss)
    } else if hit_take_profit {
        Some(ExitReason::TakeProfit)
    } else if hit_trailing_stop {
        Some(ExitReason::TrailingStop)
    } else if reversed {
        Some(ExitReason::SignalReversal)
    } else if is_last_bar {
        Some(ExitReason::PeriodEnd)
    } else {
        None
    }
}

fn exit_price_for(reason: ExitReason, bar: &Bar) -> f64 {
    match reason {
        ExitReason::StopLoss | ExitReason::TakeProfit | ExitReason::TrailingStop => bar.close,
        ExitReason::SignalReversal | ExitReason::PeriodEnd => bar.close,
    }
}

fn apply_slippage(price: f64, direction: Direction, slippage: f64, is_entry: bool) -> f64 {
    let adverse = match (direction, is_entry) {
        (Direction::Long, true) => 1.0 + slippage,
        (Direction::Long, false) => 1.0 - slippage,
        (Direction::Short, true) => 1.0 - slippage,
        (Direction::Short, false) => 1.0 + slippage,
    };
    price * adverse
}

fn direction_return(direction: Direction, entry_price: f64, exit_price: f64) -> f64 {
    match direction {
        Direction::Long => (exit_price - entry_price) / entry_price,
        Direction::Short => (entry_price - exit_price) / entry_price,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn bar(secs: i64, o: f64, h: f64, l: f64, c: f64) -> Bar {
        Bar {
            timestamp: Utc.timestamp_opt(secs, 0).unwrap(),
            open: o,
            high: h,
            low: l,
            close: c,
            volume: 100.0,
        }
    }

    fn risk() -> RiskManagementConfig {
        RiskManagementConfig {
            signal_threshold: 0.2,
            stop_loss_pct: 0.05,
            take_profit_pct: 0.1,
            max_position_size: 1.0,
            trailing_stop_pct: 0.03,
            initial_capital: 10_000.0,
            commission: 0.0,
            slippage: 0.0,
        }
    }

    #[test]
    fn never_opens_more_than_one_position_at_once() {
        let bars = vec![
            bar(0, 100.0, 101.0, 99.0, 100.0),
            bar(60, 100.0, 112.0, 99.0, 111.0),
            bar(120, 111.0, 112.0, 99.0, 105.0),
        ];
        let signals = vec![0.5, 0.5, 0.5];
        let result = run_backtest(&bars, &signals, &risk()).unwrap();
        for window in result.trades.windows(2) {
            assert!(window[0].exit_index <= window[1].entry_index);
        }
    }

    #[test]
    fn forces_close_on_last_bar() {
        let bars = vec![
            bar(0, 100.0, 101.0, 99.0, 100.0),
            bar(60, 100.0, 101.0, 99.0, 100.5),
        ];
        let signals = vec![0.5, 0.5];
        let result = run_backtest(&bars, &signals, &risk()).unwrap();
        assert_eq!(result.trades.len(), 1);
        assert_eq!(result.trades[0].exit_reason, ExitReason::PeriodEnd);
    }

    #[test]
    fn stop_loss_triggers_before_take_profit_when_both_possible_same_bar() {
        let bars = vec![
            bar(0, 100.0, 100.0, 100.0, 100.0),
            bar(60, 100.0, 112.0, 94.0, 95.0),
        ];
        let signals = vec![0.5, 0.5];
        let result = run_backtest(&bars, &signals, &risk()).unwrap();
        assert_eq!(result.trades[0].exit_reason, ExitReason::StopLoss);
    }

    #[test]
    fn mismatched_lengths_are_rejected() {
        let bars = vec![bar(0, 100.0, 100.0, 100.0, 100.0)];
        let signals = vec![0.1, 0.2];
        assert!(run_backtest(&bars, &signals, &risk()).is_err());
    }
}
