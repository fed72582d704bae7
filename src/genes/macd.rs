//! MACD gene: trend/momentum signal from the histogram's normalized magnitude and sign.

use std::collections::BTreeMap;

use ta::indicators::MovingAverageConvergenceDivergence;
use ta::Next;

use super::{num_param, types::ParamValue};
use crate::data::bar::Bar;
use crate::error::{EvoError, Result};

pub fn signal_series(params: &BTreeMap<String, ParamValue>, bars: &[Bar]) -> Result<Vec<f64>> {
    let fast = num_param(params, "fast_period") as usize;
    let slow = num_param(params, "slow_period") as usize;
    let signal_period = num_param(params, "signal_period") as usize;
    let divergence_norm = num_param(params, "divergence_norm").max(1e-9);

    let mut macd = MovingAverageConvergenceDivergence::new(fast, slow, signal_period)
        .map_err(|e| EvoError::invalid_input(format!("invalid macd periods: {}", e)))?;

    let warmup = slow + signal_period;
    let mut out = Vec::with_capacity(bars.len());
    for (i, bar) in bars.iter().enumerate() {
        let output = macd.next(bar);
        if i < warmup {
            out.push(0.0);
            continue;
        }
        out.push((output.histogram / divergence_norm).clamp(-1.0, 1.0));
    }
    Ok(out)
}
