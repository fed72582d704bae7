//! Shared gene vocabulary: the closed `GeneType` set, typed parameter values, and the
//! per-gene-type configuration (default parameters + constraints) loaded from YAML.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{de::Error as _, Deserialize, Deserializer, Serialize, Serializer};

use crate::error::{EvoError, Result};

/// The closed set of gene types (§2, §4.1). Driven entirely by configuration presence;
/// no open inheritance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum GeneType {
    Rsi,
    Macd,
    MovingAverage,
    Bollinger,
    Stochastic,
    Atr,
    Obv,
    Volume,
    VolatilityBreakout,
    Candlestick,
}

pub const ALL_GENE_TYPES: [GeneType; 10] = [
    GeneType::Rsi,
    GeneType::Macd,
    GeneType::MovingAverage,
    GeneType::Bollinger,
    GeneType::Stochastic,
    GeneType::Atr,
    GeneType::Obv,
    GeneType::Volume,
    GeneType::VolatilityBreakout,
    GeneType::Candlestick,
];

impl GeneType {
    pub fn as_str(&self) -> &'static str {
        match self {
            GeneType::Rsi => "rsi",
            GeneType::Macd => "macd",
            GeneType::MovingAverage => "moving_average",
            GeneType::Bollinger => "bollinger",
            GeneType::Stochastic => "stochastic",
            GeneType::Atr => "atr",
            GeneType::Obv => "obv",
            GeneType::Volume => "volume",
            GeneType::VolatilityBreakout => "volatility_breakout",
            GeneType::Candlestick => "candlestick",
        }
    }
}

impl fmt::Display for GeneType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for GeneType {
    type Err = EvoError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "rsi" => Ok(GeneType::Rsi),
            "macd" => Ok(GeneType::Macd),
            "moving_average" => Ok(GeneType::MovingAverage),
            "bollinger" => Ok(GeneType::Bollinger),
            "stochastic" => Ok(GeneType::Stochastic),
            "atr" => Ok(GeneType::Atr),
            "obv" => Ok(GeneType::Obv),
            "volume" => Ok(GeneType::Volume),
            "volatility_breakout" => Ok(GeneType::VolatilityBreakout),
            "candlestick" => Ok(GeneType::Candlestick),
            other => Err(EvoError::UnknownGeneType(other.to_string())),
        }
    }
}

impl Serialize for GeneType {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for GeneType {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        GeneType::from_str(&s).map_err(D::Error::custom)
    }
}

/// A single parameter value. Numeric parameters are mutated/blended arithmetically;
/// text parameters (e.g. moving-average `type`) are coin-flipped / resampled over the
/// declared enumeration (§4.2, §4.7, §4.8).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    Number(f64),
    Text(String),
}

impl ParamValue {
    pub fn as_number(&self) -> Option<f64> {
        match self {
            ParamValue::Number(n) => Some(*n),
            ParamValue::Text(_) => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            ParamValue::Text(s) => Some(s),
            ParamValue::Number(_) => None,
        }
    }
}

/// Declared bounds for one parameter (§4.2).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Constraint {
    Range { min: f64, max: f64 },
    Enumeration { types: Vec<String> },
}

impl Constraint {
    pub fn clamp_numeric(&self, value: f64) -> f64 {
        match self {
            Constraint::Range { min, max } => value.clamp(*min, *max),
            Constraint::Enumeration { .. } => value,
        }
    }

    pub fn contains(&self, value: &ParamValue) -> bool {
        match (self, value) {
            (Constraint::Range { min, max }, ParamValue::Number(n)) => *n >= *min && *n <= *max,
            (Constraint::Enumeration { types }, ParamValue::Text(t)) => types.contains(t),
            _ => false,
        }
    }
}

/// `default` + `constraints` for a single gene type, as parsed from the `gene:` YAML map
/// (SPEC_FULL.md §6).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneTypeConfig {
    pub default: BTreeMap<String, ParamValue>,
    pub constraints: BTreeMap<String, Constraint>,
}

impl GeneTypeConfig {
    /// Validates that every parameter in `params` is declared and within its constraint.
    /// A declared-but-missing key is a hard validation error. §9 resolves this
    /// explicitly: missing config keys are never silently defaulted to zero.
    pub fn validate(&self, gene_type: GeneType, params: &BTreeMap<String, ParamValue>) -> Result<()> {
        for key in self.default.keys() {
            let value = params.get(key).ok_or_else(|| EvoError::UnknownParameter {
                gene_type: gene_type.to_string(),
                parameter: key.clone(),
            })?;
            if let Some(constraint) = self.constraints.get(key) {
                if !constraint.contains(value) {
                    return Err(EvoError::invalid_input(format!(
                        "{}.{} = {:?} violates constraint {:?}",
                        gene_type, key, value, constraint
                    )));
                }
            }
        }
        Ok(())
    }
}

/// The `base:` block shared across all gene types (§6).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneBaseConfig {
    pub mutation_rate: f64,
    pub crossover_rate: f64,
    pub weight_min: f64,
    pub weight_max: f64,
    pub risk_factor_min: f64,
    pub risk_factor_max: f64,
    pub test_period_days: u32,
}

impl Default for GeneBaseConfig {
    fn default() -> Self {
        Self {
            mutation_rate: 0.01,
            crossover_rate: 0.5,
            weight_min: 0.1,
            weight_max: 5.0,
            risk_factor_min: 0.1,
            risk_factor_max: 1.0,
            test_period_days: 90,
        }
    }
}

/// The whole `gene:` configuration map, keyed by gene type.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenesConfig {
    pub types: BTreeMap<GeneType, GeneTypeConfig>,
    pub base: GeneBaseConfig,
}

impl GenesConfig {
    pub fn get(&self, gene_type: GeneType) -> Result<&GeneTypeConfig> {
        self.types
            .get(&gene_type)
            .ok_or_else(|| EvoError::Config(format!("no gene config for {}", gene_type)))
    }
}
