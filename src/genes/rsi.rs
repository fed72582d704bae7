//! RSI gene: overbought/oversold mean-reversion signal with a parameterized band (§4.1).

use std::collections::BTreeMap;

use ta::indicators::RelativeStrengthIndex;
use ta::Next;

use super::{num_param, types::ParamValue};
use crate::data::bar::Bar;
use crate::error::{EvoError, Result};

/// Ramps linearly to -1 at/above `overbought` (expect reversion down) and to +1 at/below
/// `oversold` (expect reversion up). Inside the neutral band the signal is a centered
/// linear mapping around the band's midpoint, zero exactly at that midpoint.
pub fn signal_series(params: &BTreeMap<String, ParamValue>, bars: &[Bar]) -> Result<Vec<f64>> {
    let period = num_param(params, "period") as usize;
    let overbought = num_param(params, "overbought");
    let oversold = num_param(params, "oversold");

    let mut rsi = RelativeStrengthIndex::new(period)
        .map_err(|e| EvoError::invalid_input(format!("invalid rsi period {}: {}", period, e)))?;

    let mut out = Vec::with_capacity(bars.len());
    for (i, bar) in bars.iter().enumerate() {
        let value = rsi.next(bar);
        if i + 1 < period {
            out.push(0.0);
            continue;
        }
        out.push(rsi_to_signal(value, overbought, oversold));
    }
    Ok(out)
}

fn rsi_to_signal(rsi: f64, overbought: f64, oversold: f64) -> f64 {
    if rsi >= overbought {
        let span = (100.0 - overbought).max(1e-9);
        (-(rsi - overbought) / span).clamp(-1.0, 0.0)
    } else if rsi <= oversold {
        let span = oversold.max(1e-9);
        ((oversold - rsi) / span).clamp(0.0, 1.0)
    } else {
        let mid = (overbought + oversold) / 2.0;
        let span = (overbought - oversold).max(1e-9);
        ((mid - rsi) / span * 2.0).clamp(-1.0, 1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn neutral_band_yields_zero() {
        assert_eq!(rsi_to_signal(50.0, 70.0, 30.0), 0.0);
    }

    #[test]
    fn overbought_yields_negative_signal() {
        assert!(rsi_to_signal(90.0, 70.0, 30.0) < 0.0);
    }

    #[test]
    fn oversold_yields_positive_signal() {
        assert!(rsi_to_signal(10.0, 70.0, 30.0) > 0.0);
    }
}
