//! Gene implementations (§4.1). Each submodule computes a per-bar signal series in
//! `[-1.0, 1.0]` from a validated parameter map and a bar history; [`calculate_signal_series`]
//! dispatches on [`GeneType`] to the matching submodule.

pub mod atr;
pub mod bollinger;
pub mod candlestick;
pub mod macd;
pub mod moving_average;
pub mod obv;
pub mod rsi;
pub mod stochastic;
pub mod types;
pub mod volatility_breakout;
pub mod volume;

use std::collections::BTreeMap;

use crate::data::bar::Bar;
use crate::error::Result;
use types::{GeneType, ParamValue};

/// Computes the full per-bar signal series for one gene, dispatching on its type.
/// Warm-up bars (before an indicator has enough history) are `0.0`, a neutral signal,
/// matching §4.3's aggregation contract of "no opinion yet".
pub fn calculate_signal_series(
    gene_type: GeneType,
    params: &BTreeMap<String, ParamValue>,
    bars: &[Bar],
) -> Result<Vec<f64>> {
    match gene_type {
        GeneType::Rsi => rsi::signal_series(params, bars),
        GeneType::Macd => macd::signal_series(params, bars),
        GeneType::MovingAverage => moving_average::signal_series(params, bars),
        GeneType::Bollinger => bollinger::signal_series(params, bars),
        GeneType::Stochastic => stochastic::signal_series(params, bars),
        GeneType::Atr => atr::signal_series(params, bars),
        GeneType::Obv => obv::signal_series(params, bars),
        GeneType::Volume => volume::signal_series(params, bars),
        GeneType::VolatilityBreakout => volatility_breakout::signal_series(params, bars),
        GeneType::Candlestick => candlestick::signal_series(params, bars),
    }
}

/// Shared helper: pulls a numeric parameter out of a validated map, panicking-free only
/// callers only reach this after `GeneTypeConfig::validate` has already run, so a missing
/// key here indicates an internal bug rather than bad user input.
pub(crate) fn num_param(params: &BTreeMap<String, ParamValue>, key: &str) -> f64 {
    params
        .get(key)
        .and_then(ParamValue::as_number)
        .unwrap_or_else(|| panic!("gene parameter '{}' missing or non-numeric after validation", key))
}

pub(crate) fn text_param<'a>(params: &'a BTreeMap<String, ParamValue>, key: &str) -> &'a str {
    params
        .get(key)
        .and_then(ParamValue::as_text)
        .unwrap_or_else(|| panic!("gene parameter '{}' missing or non-text after validation", key))
}
