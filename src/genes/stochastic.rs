//! Stochastic oscillator gene: %K/%D crossover in overbought/oversold territory.

use std::collections::BTreeMap;

use ta::indicators::{ExponentialMovingAverage, FastStochastic};
use ta::Next;

use super::{num_param, types::ParamValue};
use crate::data::bar::Bar;
use crate::error::{EvoError, Result};

pub fn signal_series(params: &BTreeMap<String, ParamValue>, bars: &[Bar]) -> Result<Vec<f64>> {
    let k_period = num_param(params, "k_period") as usize;
    let d_period = num_param(params, "d_period") as usize;
    let smooth_k = num_param(params, "smooth_k") as usize;
    let overbought = num_param(params, "overbought");
    let oversold = num_param(params, "oversold");

    let mut fast_k = FastStochastic::new(k_period)
        .map_err(|e| EvoError::invalid_input(format!("invalid stochastic k_period: {}", e)))?;
    let mut smoother = ExponentialMovingAverage::new(smooth_k)
        .map_err(|e| EvoError::invalid_input(format!("invalid stochastic smooth_k: {}", e)))?;
    let mut d_smoother = ExponentialMovingAverage::new(d_period)
        .map_err(|e| EvoError::invalid_input(format!("invalid stochastic d_period: {}", e)))?;

    let warmup = k_period + smooth_k + d_period;
    let mut out = Vec::with_capacity(bars.len());
    for (i, bar) in bars.iter().enumerate() {
        let raw_k = fast_k.next(bar);
        let k = smoother.next(raw_k);
        let d = d_smoother.next(k);

        if i < warmup {
            out.push(0.0);
            continue;
        }

        let base_signal = if k < oversold {
            1.0
        } else if k > overbought {
            -1.0
        } else {
            let span = (overbought - oversold).max(1e-9);
            (((k - oversold) / span) - 0.5) * -2.0
        };
        let cross_signal = (k - d).signum();
        let signal = (base_signal * 0.7 + cross_signal * 0.3).clamp(-1.0, 1.0);
        out.push(signal);
    }
    Ok(out)
}
