//! On-balance-volume gene: signal from whether OBV's rate of change diverges from price's
//! rate of change (§4.1).

use std::collections::BTreeMap;

use ta::indicators::OnBalanceVolume;
use ta::Next;

use super::{num_param, types::ParamValue};
use crate::data::bar::Bar;
use crate::error::Result;

pub fn signal_series(params: &BTreeMap<String, ParamValue>, bars: &[Bar]) -> Result<Vec<f64>> {
    let period = num_param(params, "period") as usize;
    let threshold = num_param(params, "threshold").max(1e-9);

    let mut obv = OnBalanceVolume::new();

    let mut out = Vec::with_capacity(bars.len());
    let mut prev_obv: Option<f64> = None;
    let mut prev_close: Option<f64> = None;
    for (i, bar) in bars.iter().enumerate() {
        let value = obv.next(bar);

        let signal = match (prev_obv, prev_close) {
            (Some(prev_o), Some(prev_c)) if i + 1 >= period => {
                let obv_change = if prev_o != 0.0 { (value - prev_o) / prev_o.abs() } else { 0.0 };
                let price_change = (bar.close - prev_c) / prev_c;

                if obv_change.abs() > threshold {
                    if obv_change.signum() != price_change.signum() {
                        -price_change.signum()
                    } else {
                        price_change.signum() * 0.5
                    }
                } else {
                    0.0
                }
            }
            _ => 0.0,
        };
        out.push(signal.clamp(-1.0, 1.0));

        prev_obv = Some(value);
        prev_close = Some(bar.close);
    }
    Ok(out)
}
