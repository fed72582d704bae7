//! Bollinger Bands gene: signal from how far price has pierced the band, scaled by
//! `touch_percentage`.

use std::collections::BTreeMap;

use ta::indicators::BollingerBands;
use ta::Next;

use super::{num_param, types::ParamValue};
use crate::data::bar::Bar;
use crate::error::{EvoError, Result};

pub fn signal_series(params: &BTreeMap<String, ParamValue>, bars: &[Bar]) -> Result<Vec<f64>> {
    let period = num_param(params, "period") as usize;
    let std_dev = num_param(params, "std_dev");
    let touch_percentage = num_param(params, "touch_percentage").max(1e-9);

    let mut bb = BollingerBands::new(period, std_dev)
        .map_err(|e| EvoError::invalid_input(format!("invalid bollinger params: {}", e)))?;

    let mut out = Vec::with_capacity(bars.len());
    for (i, bar) in bars.iter().enumerate() {
        let output = bb.next(bar.close);
        if i + 1 < period {
            out.push(0.0);
            continue;
        }
        let band_width = (output.upper - output.lower).max(1e-9);
        // Price's position relative to the midline, scaled by the band's half-width:
        // positive above the midline, negative below it.
        let position = (bar.close - output.average) / (band_width / 2.0);
        out.push((position / touch_percentage).clamp(-1.0, 1.0));
    }
    Ok(out)
}
