//! YAML-shaped configuration loader: create-a-default-on-first-run, an
//! `#[instrument]`-annotated load function, `gene` / `population.evolution` /
//! `portfolio.risk_management` maps (§6).

use std::{
    collections::BTreeMap,
    fs::File,
    io::{BufReader, Write},
    path::Path,
};

use serde::{Deserialize, Serialize};
use tracing::{info, instrument};

use crate::error::{EvoError, Result};
use crate::genes::types::{Constraint, GeneBaseConfig, GeneTypeConfig, GenesConfig, GeneType, ParamValue};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationConfig {
    pub min_trades: u32,
    pub min_win_rate: f64,
    pub max_drawdown: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvolutionConfig {
    #[serde(rename = "mutation_rate_range")]
    pub mutation_rate_range: (f64, f64),
    #[serde(rename = "selection_pressure_range")]
    pub selection_pressure_range: (f64, f64),
    #[serde(rename = "generation_interval_range")]
    pub generation_interval_range: (f64, f64),
    #[serde(rename = "diversity_threshold_range")]
    pub diversity_threshold_range: (f64, f64),
    #[serde(rename = "fitness.weights")]
    pub fitness_weights: BTreeMap<String, f64>,
    pub validation: ValidationConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskManagementConfig {
    pub signal_threshold: f64,
    pub stop_loss_pct: f64,
    pub take_profit_pct: f64,
    pub max_position_size: f64,
    pub trailing_stop_pct: f64,
    pub initial_capital: f64,
    pub commission: f64,
    pub slippage: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub gene: GenesConfig,
    #[serde(rename = "population.evolution")]
    pub evolution: EvolutionConfig,
    #[serde(rename = "portfolio.risk_management")]
    pub risk: RiskManagementConfig,
    #[serde(rename = "db-path")]
    pub db_path: String,
    #[serde(rename = "market-data-path")]
    pub market_data_path: String,
    #[serde(rename = "worker-pool-size")]
    pub worker_pool_size: usize,
    #[serde(rename = "log-dir")]
    pub log_dir: String,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            gene: default_genes_config(),
            evolution: EvolutionConfig {
                mutation_rate_range: (0.001, 0.05),
                selection_pressure_range: (1.0, 10.0),
                generation_interval_range: (1.0, 24.0),
                diversity_threshold_range: (0.5, 1.0),
                fitness_weights: BTreeMap::from([
                    ("total_return".to_string(), 0.3),
                    ("sharpe_ratio".to_string(), 0.3),
                    ("win_rate".to_string(), 0.2),
                    ("max_drawdown".to_string(), -0.2),
                ]),
                validation: ValidationConfig {
                    min_trades: 10,
                    min_win_rate: 0.3,
                    max_drawdown: 0.5,
                },
            },
            risk: RiskManagementConfig {
                signal_threshold: 0.2,
                stop_loss_pct: 0.05,
                take_profit_pct: 0.1,
                max_position_size: 0.25,
                trailing_stop_pct: 0.03,
                initial_capital: 10_000.0,
                commission: 0.001,
                slippage: 0.0005,
            },
            db_path: "evocrate.db".to_string(),
            market_data_path: "market_data".to_string(),
            worker_pool_size: 4,
            log_dir: "logs".to_string(),
        }
    }
}

impl Config {
    /// Reads configuration from a YAML file, writing a default one if absent.
    #[instrument(level = "info", skip(path))]
    pub fn read_config<P: AsRef<Path>>(path: Option<P>) -> Result<Self> {
        let path = path
            .map(|p| p.as_ref().to_path_buf())
            .unwrap_or_else(|| Path::new("config.yml").to_path_buf());

        info!(path = %path.display(), "Reading configuration");

        if !path.exists() {
            info!("Config file does not exist. Creating default config at {}", path.display());
            let default = Config::default();
            let mut file = File::create(&path)?;
            file.write_all(serde_yaml::to_string(&default)?.as_bytes())?;
            return Ok(default);
        }

        let file = File::open(&path)?;
        let reader = BufReader::new(file);
        let config: Self = serde_yaml::from_reader(reader)?;
        config.validate()?;
        info!("Configuration loaded successfully");
        Ok(config)
    }

    /// Validates configured ranges against §3's population/gene bounds. Out-of-range
    /// values are a hard `Config` error, never silently clamped (§4.10).
    pub fn validate(&self) -> Result<()> {
        let (mr_lo, mr_hi) = self.evolution.mutation_rate_range;
        if !(0.001..=0.05).contains(&mr_lo) || !(0.001..=0.05).contains(&mr_hi) || mr_lo > mr_hi {
            return Err(EvoError::Config(format!(
                "mutation_rate_range {:?} outside [0.001, 0.05]",
                self.evolution.mutation_rate_range
            )));
        }
        let (sp_lo, sp_hi) = self.evolution.selection_pressure_range;
        if !(1.0..=10.0).contains(&sp_lo) || !(1.0..=10.0).contains(&sp_hi) || sp_lo > sp_hi {
            return Err(EvoError::Config(format!(
                "selection_pressure_range {:?} outside [1, 10]",
                self.evolution.selection_pressure_range
            )));
        }
        let (dt_lo, dt_hi) = self.evolution.diversity_threshold_range;
        if !(0.5..=1.0).contains(&dt_lo) || !(0.5..=1.0).contains(&dt_hi) || dt_lo > dt_hi {
            return Err(EvoError::Config(format!(
                "diversity_threshold_range {:?} outside [0.5, 1.0]",
                self.evolution.diversity_threshold_range
            )));
        }
        if self.worker_pool_size == 0 {
            return Err(EvoError::Config("worker-pool-size must be > 0".to_string()));
        }
        Ok(())
    }
}

fn num(v: f64) -> ParamValue {
    ParamValue::Number(v)
}

fn range(min: f64, max: f64) -> Constraint {
    Constraint::Range { min, max }
}

/// Built-in defaults for every gene type's parameters + constraints (§4.1, §4.2),
/// used to seed `config.yml` on first run and as the fallback in tests.
pub fn default_genes_config() -> GenesConfig {
    let mut types = BTreeMap::new();

    types.insert(
        GeneType::Rsi,
        GeneTypeConfig {
            default: BTreeMap::from([
                ("period".to_string(), num(14.0)),
                ("overbought".to_string(), num(70.0)),
                ("oversold".to_string(), num(30.0)),
            ]),
            constraints: BTreeMap::from([
                ("period".to_string(), range(2.0, 50.0)),
                ("overbought".to_string(), range(50.0, 95.0)),
                ("oversold".to_string(), range(5.0, 50.0)),
            ]),
        },
    );

    types.insert(
        GeneType::Macd,
        GeneTypeConfig {
            default: BTreeMap::from([
                ("fast_period".to_string(), num(12.0)),
                ("slow_period".to_string(), num(26.0)),
                ("signal_period".to_string(), num(9.0)),
                ("divergence_norm".to_string(), num(1.0)),
            ]),
            constraints: BTreeMap::from([
                ("fast_period".to_string(), range(2.0, 50.0)),
                ("slow_period".to_string(), range(5.0, 100.0)),
                ("signal_period".to_string(), range(2.0, 50.0)),
                ("divergence_norm".to_string(), range(0.01, 100.0)),
            ]),
        },
    );

    types.insert(
        GeneType::MovingAverage,
        GeneTypeConfig {
            default: BTreeMap::from([
                ("period".to_string(), num(20.0)),
                ("type".to_string(), ParamValue::Text("EMA".to_string())),
                ("distance".to_string(), num(0.02)),
            ]),
            constraints: BTreeMap::from([
                ("period".to_string(), range(2.0, 200.0)),
                (
                    "type".to_string(),
                    Constraint::Enumeration {
                        types: vec!["SMA".to_string(), "EMA".to_string()],
                    },
                ),
                ("distance".to_string(), range(0.001, 1.0)),
            ]),
        },
    );

    types.insert(
        GeneType::Bollinger,
        GeneTypeConfig {
            default: BTreeMap::from([
                ("period".to_string(), num(20.0)),
                ("std_dev".to_string(), num(2.0)),
                ("touch_percentage".to_string(), num(1.0)),
            ]),
            constraints: BTreeMap::from([
                ("period".to_string(), range(2.0, 200.0)),
                ("std_dev".to_string(), range(0.5, 5.0)),
                ("touch_percentage".to_string(), range(0.1, 2.0)),
            ]),
        },
    );

    types.insert(
        GeneType::Stochastic,
        GeneTypeConfig {
            default: BTreeMap::from([
                ("k_period".to_string(), num(14.0)),
                ("d_period".to_string(), num(3.0)),
                ("smooth_k".to_string(), num(3.0)),
                ("overbought".to_string(), num(80.0)),
                ("oversold".to_string(), num(20.0)),
            ]),
            constraints: BTreeMap::from([
                ("k_period".to_string(), range(2.0, 100.0)),
                ("d_period".to_string(), range(1.0, 20.0)),
                ("smooth_k".to_string(), range(1.0, 20.0)),
                ("overbought".to_string(), range(50.0, 95.0)),
                ("oversold".to_string(), range(5.0, 50.0)),
            ]),
        },
    );

    types.insert(
        GeneType::Atr,
        GeneTypeConfig {
            default: BTreeMap::from([
                ("period".to_string(), num(14.0)),
                ("multiplier".to_string(), num(2.0)),
            ]),
            constraints: BTreeMap::from([
                ("period".to_string(), range(2.0, 100.0)),
                ("multiplier".to_string(), range(0.5, 5.0)),
            ]),
        },
    );

    types.insert(
        GeneType::Obv,
        GeneTypeConfig {
            default: BTreeMap::from([
                ("period".to_string(), num(20.0)),
                ("threshold".to_string(), num(0.05)),
            ]),
            constraints: BTreeMap::from([
                ("period".to_string(), range(2.0, 100.0)),
                ("threshold".to_string(), range(0.001, 1.0)),
            ]),
        },
    );

    types.insert(
        GeneType::Volume,
        GeneTypeConfig {
            default: BTreeMap::from([
                ("period".to_string(), num(20.0)),
                ("threshold".to_string(), num(1.5)),
                ("min_price_change".to_string(), num(0.001)),
            ]),
            constraints: BTreeMap::from([
                ("period".to_string(), range(2.0, 100.0)),
                ("threshold".to_string(), range(1.01, 10.0)),
                ("min_price_change".to_string(), range(0.0001, 0.1)),
            ]),
        },
    );

    types.insert(
        GeneType::VolatilityBreakout,
        GeneTypeConfig {
            default: BTreeMap::from([
                ("period".to_string(), num(20.0)),
                ("multiplier".to_string(), num(2.0)),
                ("breakout_threshold".to_string(), num(0.01)),
                ("consolidation_periods".to_string(), num(5.0)),
            ]),
            constraints: BTreeMap::from([
                ("period".to_string(), range(2.0, 100.0)),
                ("multiplier".to_string(), range(0.5, 5.0)),
                ("breakout_threshold".to_string(), range(0.001, 0.2)),
                ("consolidation_periods".to_string(), range(2.0, 50.0)),
            ]),
        },
    );

    types.insert(
        GeneType::Candlestick,
        GeneTypeConfig {
            default: BTreeMap::from([
                ("doji_threshold".to_string(), num(0.1)),
                ("shadow_ratio".to_string(), num(2.0)),
                ("engulfing_size".to_string(), num(1.0)),
                ("star_body_size".to_string(), num(0.3)),
                ("harami_size".to_string(), num(0.5)),
                ("pattern_weight".to_string(), num(1.0)),
            ]),
            constraints: BTreeMap::from([
                ("doji_threshold".to_string(), range(0.01, 0.5)),
                ("shadow_ratio".to_string(), range(1.0, 10.0)),
                ("engulfing_size".to_string(), range(0.1, 3.0)),
                ("star_body_size".to_string(), range(0.05, 1.0)),
                ("harami_size".to_string(), range(0.05, 1.0)),
                ("pattern_weight".to_string(), range(0.1, 3.0)),
            ]),
        },
    );

    GenesConfig {
        types,
        base: GeneBaseConfig::default(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_validates() {
        let config = Config::default();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn default_gene_config_covers_all_ten_types() {
        let genes = default_genes_config();
        for gt in crate::genes::types::ALL_GENE_TYPES {
            assert!(genes.get(gt).is_ok(), "missing config for {}", gt);
        }
    }

    #[test]
    fn rejects_out_of_range_mutation_rate() {
        let mut config = Config::default();
        config.evolution.mutation_rate_range = (0.1, 0.2);
        assert!(config.validate().is_err());
    }
}
