//! A single gene as carried inside a chromosome: its type, its validated parameters, and
//! the weight/risk_factor that scale its contribution in the aggregator and the simulator
//! respectively (§4.1, §4.3).

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::config::Config;
use crate::error::{EvoError, Result};
use crate::genes::types::{GeneType, ParamValue};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChromosomeGene {
    pub gene_type: GeneType,
    pub params: BTreeMap<String, ParamValue>,
    pub weight: f64,
    pub risk_factor: f64,
}

impl ChromosomeGene {
    pub fn new(
        gene_type: GeneType,
        params: BTreeMap<String, ParamValue>,
        weight: f64,
        risk_factor: f64,
    ) -> Self {
        Self {
            gene_type,
            params,
            weight,
            risk_factor,
        }
    }

    /// Validates parameters against the gene's declared config, and weight/risk_factor
    /// against the shared `base` bounds (§4.2).
    pub fn validate(&self, config: &Config) -> Result<()> {
        let gene_config = config.gene.get(self.gene_type)?;
        gene_config.validate(self.gene_type, &self.params)?;

        let base = &config.gene.base;
        if self.weight < base.weight_min || self.weight > base.weight_max {
            return Err(EvoError::invalid_input(format!(
                "{} weight {} outside [{}, {}]",
                self.gene_type, self.weight, base.weight_min, base.weight_max
            )));
        }
        if self.risk_factor < base.risk_factor_min || self.risk_factor > base.risk_factor_max {
            return Err(EvoError::invalid_input(format!(
                "{} risk_factor {} outside [{}, {}]",
                self.gene_type, self.risk_factor, base.risk_factor_min, base.risk_factor_max
            )));
        }
        Ok(())
    }
}
