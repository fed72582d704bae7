//! Volatility breakout gene: detects a tight-range consolidation followed by a close
//! breaking outside that range, signed by breakout direction.

use std::collections::BTreeMap;

use ta::indicators::StandardDeviation;
use ta::Next;

use super::{num_param, types::ParamValue};
use crate::data::bar::Bar;
use crate::error::{EvoError, Result};

pub fn signal_series(params: &BTreeMap<String, ParamValue>, bars: &[Bar]) -> Result<Vec<f64>> {
    let period = num_param(params, "period") as usize;
    let multiplier = num_param(params, "multiplier").max(1e-9);
    let breakout_threshold = num_param(params, "breakout_threshold").max(1e-9);
    let consolidation_periods = num_param(params, "consolidation_periods") as usize;

    let mut stdev = StandardDeviation::new(period)
        .map_err(|e| EvoError::invalid_input(format!("invalid volatility_breakout period: {}", e)))?;

    let mut out = Vec::with_capacity(bars.len());
    let mut recent_ranges: Vec<f64> = Vec::with_capacity(consolidation_periods);

    for (i, bar) in bars.iter().enumerate() {
        let sigma = stdev.next(bar.close);
        let range = bar.high - bar.low;

        recent_ranges.push(range);
        if recent_ranges.len() > consolidation_periods {
            recent_ranges.remove(0);
        }

        if i + 1 < period || recent_ranges.len() < consolidation_periods {
            out.push(0.0);
            continue;
        }

        let was_consolidating = recent_ranges.iter().all(|r| *r <= sigma * multiplier);
        if !was_consolidating {
            out.push(0.0);
            continue;
        }

        let move_size = (bar.close - bar.open) / bar.open.abs().max(1e-9);
        if move_size.abs() < breakout_threshold {
            out.push(0.0);
            continue;
        }
        let strength = (move_size.abs() / breakout_threshold).clamp(0.0, 1.0);
        out.push(strength * move_size.signum());
    }
    Ok(out)
}
