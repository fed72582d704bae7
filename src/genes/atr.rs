//! ATR gene: volatility-expansion signal, positive when true range is expanding faster
//! than its trailing average times `multiplier` and the bar closed up, negative on a down
//! close under the same condition.

use std::collections::BTreeMap;

use ta::indicators::AverageTrueRange;
use ta::Next;

use super::{num_param, types::ParamValue};
use crate::data::bar::Bar;
use crate::error::{EvoError, Result};

pub fn signal_series(params: &BTreeMap<String, ParamValue>, bars: &[Bar]) -> Result<Vec<f64>> {
    let period = num_param(params, "period") as usize;
    let multiplier = num_param(params, "multiplier").max(1e-9);

    let mut atr = AverageTrueRange::new(period)
        .map_err(|e| EvoError::invalid_input(format!("invalid atr period: {}", e)))?;

    let mut out = Vec::with_capacity(bars.len());
    let mut prev_close: Option<f64> = None;
    for (i, bar) in bars.iter().enumerate() {
        let value = atr.next(bar);
        if i + 1 < period {
            out.push(0.0);
            prev_close = Some(bar.close);
            continue;
        }
        let true_range = match prev_close {
            Some(pc) => (bar.high - bar.low).max((bar.high - pc).abs()).max((bar.low - pc).abs()),
            None => bar.high - bar.low,
        };
        let expansion = (true_range / (value * multiplier).max(1e-9) - 1.0).clamp(-1.0, 1.0);
        let direction = if bar.close >= bar.open { 1.0 } else { -1.0 };
        out.push(expansion.max(0.0) * direction);
        prev_close = Some(bar.close);
    }
    Ok(out)
}
