//! Moving-average gene: signal from price distance above/below a trailing SMA or EMA.

use std::collections::BTreeMap;

use ta::indicators::{ExponentialMovingAverage, SimpleMovingAverage};
use ta::Next;

use super::{num_param, text_param, types::ParamValue};
use crate::data::bar::Bar;
use crate::error::{EvoError, Result};

pub fn signal_series(params: &BTreeMap<String, ParamValue>, bars: &[Bar]) -> Result<Vec<f64>> {
    let period = num_param(params, "period") as usize;
    let distance = num_param(params, "distance").max(1e-9);
    let ma_type = text_param(params, "type");

    let mut out = Vec::with_capacity(bars.len());

    match ma_type {
        "SMA" => {
            let mut sma = SimpleMovingAverage::new(period)
                .map_err(|e| EvoError::invalid_input(format!("invalid sma period: {}", e)))?;
            for (i, bar) in bars.iter().enumerate() {
                let avg = sma.next(bar.close);
                out.push(distance_signal(i, period, bar.close, avg, distance));
            }
        }
        "EMA" => {
            let mut ema = ExponentialMovingAverage::new(period)
                .map_err(|e| EvoError::invalid_input(format!("invalid ema period: {}", e)))?;
            for (i, bar) in bars.iter().enumerate() {
                let avg = ema.next(bar.close);
                out.push(distance_signal(i, period, bar.close, avg, distance));
            }
        }
        other => {
            return Err(EvoError::invalid_input(format!(
                "unknown moving average type: {}",
                other
            )))
        }
    }

    Ok(out)
}

fn distance_signal(index: usize, period: usize, close: f64, avg: f64, distance: f64) -> f64 {
    if index + 1 < period {
        return 0.0;
    }
    let relative = (close - avg) / avg.abs().max(1e-9);
    (relative / distance).clamp(-1.0, 1.0)
}
