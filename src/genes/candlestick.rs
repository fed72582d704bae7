//! Candlestick pattern gene: scores doji, engulfing, star and harami formations against
//! the prior bar and signs the result by the implied reversal/continuation direction.

use std::collections::BTreeMap;

use super::{num_param, types::ParamValue};
use crate::data::bar::Bar;
use crate::error::Result;

struct Candle {
    body: f64,
    range: f64,
    upper_shadow: f64,
    lower_shadow: f64,
    bullish: bool,
}

fn describe(bar: &Bar) -> Candle {
    let body = (bar.close - bar.open).abs();
    let range = (bar.high - bar.low).max(1e-9);
    let upper_shadow = bar.high - bar.open.max(bar.close);
    let lower_shadow = bar.open.min(bar.close) - bar.low;
    Candle {
        body,
        range,
        upper_shadow,
        lower_shadow,
        bullish: bar.close >= bar.open,
    }
}

pub fn signal_series(params: &BTreeMap<String, ParamValue>, bars: &[Bar]) -> Result<Vec<f64>> {
    let doji_threshold = num_param(params, "doji_threshold");
    let shadow_ratio = num_param(params, "shadow_ratio").max(1e-9);
    let engulfing_size = num_param(params, "engulfing_size").max(1e-9);
    let star_body_size = num_param(params, "star_body_size");
    let harami_size = num_param(params, "harami_size");
    let pattern_weight = num_param(params, "pattern_weight").max(1e-9);

    let mut out = Vec::with_capacity(bars.len());
    out.push(0.0);

    for i in 1..bars.len() {
        let prev = describe(&bars[i - 1]);
        let curr = describe(&bars[i]);
        let prev_bar = &bars[i - 1];
        let curr_bar = &bars[i];

        let mut signal = 0.0;

        // Doji: body is a small fraction of range, reduces conviction of any other signal.
        let is_doji = curr.body / curr.range <= doji_threshold;

        // Engulfing: current body fully engulfs the previous body and is larger by
        // `engulfing_size`x, reversing the prior direction.
        let engulfs = curr.body >= prev.body * engulfing_size
            && curr_bar.open.min(curr_bar.close) <= prev_bar.open.min(prev_bar.close)
            && curr_bar.open.max(curr_bar.close) >= prev_bar.open.max(prev_bar.close);
        if engulfs && curr.bullish != prev.bullish {
            signal += if curr.bullish { 1.0 } else { -1.0 };
        }

        // Shooting star / hammer: long shadow on one side, small body, at the end of a move.
        if curr.body / curr.range <= star_body_size {
            if curr.lower_shadow >= curr.body * shadow_ratio && curr.upper_shadow < curr.body {
                signal += 0.5; // hammer: bullish reversal
            } else if curr.upper_shadow >= curr.body * shadow_ratio && curr.lower_shadow < curr.body {
                signal -= 0.5; // shooting star: bearish reversal
            }
        }

        // Harami: current body fully contained within the previous, larger body.
        let contained = curr.body <= prev.body * harami_size
            && curr_bar.open.min(curr_bar.close) >= prev_bar.open.min(prev_bar.close)
            && curr_bar.open.max(curr_bar.close) <= prev_bar.open.max(prev_bar.close);
        if contained {
            signal += if prev.bullish { -0.3 } else { 0.3 };
        }

        if is_doji {
            signal *= 0.5;
        }

        out.push((signal * pattern_weight).clamp(-1.0, 1.0));
    }

    Ok(out)
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
            volume: 1.0,
        }
    }

    fn default_params() -> BTreeMap<String, ParamValue> {
        BTreeMap::from([
            ("doji_threshold".to_string(), ParamValue::Number(0.1)),
            ("shadow_ratio".to_string(), ParamValue::Number(2.0)),
            ("engulfing_size".to_string(), ParamValue::Number(1.0)),
            ("star_body_size".to_string(), ParamValue::Number(0.3)),
            ("harami_size".to_string(), ParamValue::Number(0.5)),
            ("pattern_weight".to_string(), ParamValue::Number(1.0)),
        ])
    }

    #[test]
    fn bullish_engulfing_yields_positive_signal() {
        let bars = vec![
            bar(0, 100.0, 101.0, 95.0, 96.0),
            bar(60, 95.0, 106.0, 94.0, 105.0),
        ];
        let signals = signal_series(&default_params(), &bars).unwrap();
        assert!(signals[1] > 0.0);
    }

    #[test]
    fn first_bar_has_no_prior_context() {
        let bars = vec![bar(0, 100.0, 101.0, 95.0, 96.0)];
        let signals = signal_series(&default_params(), &bars).unwrap();
        assert_eq!(signals[0], 0.0);
    }
}
