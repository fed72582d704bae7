//! Volume gene: signals +1/-1 for unusually high/low volume relative to its trailing
//! average, signed by the direction of the bar-over-bar price move, gated by
//! `min_price_change`. No equivalent indicator exists in `ta`; implemented directly as a
//! rolling-window ratio.

use std::collections::BTreeMap;

use ta::indicators::SimpleMovingAverage;
use ta::Next;

use super::{num_param, types::ParamValue};
use crate::data::bar::Bar;
use crate::error::{EvoError, Result};

pub fn signal_series(params: &BTreeMap<String, ParamValue>, bars: &[Bar]) -> Result<Vec<f64>> {
    let period = num_param(params, "period") as usize;
    let threshold = num_param(params, "threshold").max(1.0 + 1e-9);
    let min_price_change = num_param(params, "min_price_change").max(0.0);

    let mut avg = SimpleMovingAverage::new(period)
        .map_err(|e| EvoError::invalid_input(format!("invalid volume period: {}", e)))?;

    let mut out = Vec::with_capacity(bars.len());
    let mut prev_close: Option<f64> = None;
    for (i, bar) in bars.iter().enumerate() {
        let trailing = avg.next(bar.volume);
        let signal = match prev_close {
            Some(prev) if i + 1 >= period && trailing > 0.0 => {
                let ratio = bar.volume / trailing;
                let base_signal = if ratio > threshold {
                    1.0
                } else if ratio < 1.0 / threshold {
                    -1.0
                } else {
                    0.0
                };
                let price_change = (bar.close - prev) / prev;
                if price_change.abs() > min_price_change {
                    base_signal * price_change.signum()
                } else {
                    0.0
                }
            }
            _ => 0.0,
        };
        out.push(signal.clamp(-1.0, 1.0));
        prev_close = Some(bar.close);
    }
    Ok(out)
}
