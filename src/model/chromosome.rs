//! A chromosome: a weighted ensemble of genes, exactly one instance per represented gene
//! type (§4.1 "uniform gene-set"), plus the provenance and fitness bookkeeping needed by
//! the evolution driver and the persistence layer.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::config::Config;
use crate::error::{EvoError, Result};
use crate::evolution::history::MutationStats;
use crate::genes::types::GeneType;
use crate::metrics::PerformanceMetrics;
use crate::model::fingerprint::fingerprint;
use crate::model::gene_instance::ChromosomeGene;

/// A chromosome's lifecycle state (§3): `Active` competes in selection, `Testing` is held
/// out for an extended backtest before being promoted or discarded, `Archived` has been
/// displaced from the active population but is kept for lineage and audit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChromosomeStatus {
    Active,
    Testing,
    Archived,
}

impl ChromosomeStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            ChromosomeStatus::Active => "active",
            ChromosomeStatus::Testing => "testing",
            ChromosomeStatus::Archived => "archived",
        }
    }

    pub fn parse(s: &str) -> Result<Self> {
        match s {
            "active" => Ok(ChromosomeStatus::Active),
            "testing" => Ok(ChromosomeStatus::Testing),
            "archived" => Ok(ChromosomeStatus::Archived),
            other => Err(EvoError::invalid_input(format!("unknown chromosome status: {}", other))),
        }
    }
}

/// One fitness evaluation recorded against a chromosome (§3 `fitness_history`):
/// time-ordered, append-only, never rewritten by later generations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FitnessRecord {
    pub generation: u32,
    pub fitness: f64,
    pub recorded_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Chromosome {
    pub id: i64,
    pub population_id: i64,
    pub generation: u32,
    pub genes: Vec<ChromosomeGene>,
    pub fingerprint: String,
    pub fitness: Option<f64>,
    pub created_at: DateTime<Utc>,
    pub status: ChromosomeStatus,
    pub parent1_id: Option<i64>,
    pub parent2_id: Option<i64>,
    pub performance_metrics: Option<PerformanceMetrics>,
    pub weight_distribution: BTreeMap<GeneType, f64>,
    pub mutation_stats: MutationStats,
    pub fitness_history: Vec<FitnessRecord>,
    pub last_test_date: Option<DateTime<Utc>>,
}

impl Chromosome {
    /// Builds a chromosome and computes its fingerprint. `id` is `0` until persisted,
    /// callers get the real id back from the repository's insert.
    pub fn new(population_id: i64, generation: u32, genes: Vec<ChromosomeGene>, created_at: DateTime<Utc>) -> Self {
        let fp = fingerprint(
            &genes
                .iter()
                .map(|g| (g.gene_type, g.params.clone(), g.weight, g.risk_factor))
                .collect::<Vec<_>>(),
        );
        let weight_distribution = genes.iter().map(|g| (g.gene_type, g.weight)).collect();
        Self {
            id: 0,
            population_id,
            generation,
            genes,
            fingerprint: fp,
            fitness: None,
            created_at,
            status: ChromosomeStatus::Active,
            parent1_id: None,
            parent2_id: None,
            performance_metrics: None,
            weight_distribution,
            mutation_stats: MutationStats::default(),
            fitness_history: Vec::new(),
            last_test_date: None,
        }
    }

    /// Records a freshly computed fitness value (§4.9 step 5): appends to the append-only
    /// history, sets the live `fitness`/`performance_metrics` fields, and stamps the test
    /// date.
    pub fn record_fitness(&mut self, generation: u32, fitness: f64, metrics: PerformanceMetrics, recorded_at: DateTime<Utc>) {
        self.fitness = Some(fitness);
        self.performance_metrics = Some(metrics);
        self.last_test_date = Some(recorded_at);
        self.fitness_history.push(FitnessRecord { generation, fitness, recorded_at });
    }

    pub fn recompute_fingerprint(&mut self) {
        self.fingerprint = fingerprint(
            &self
                .genes
                .iter()
                .map(|g| (g.gene_type, g.params.clone(), g.weight, g.risk_factor))
                .collect::<Vec<_>>(),
        );
        self.weight_distribution = self.genes.iter().map(|g| (g.gene_type, g.weight)).collect();
    }

    /// Validates the chromosome's structural invariants (§4.1): non-empty, each gene type
    /// appears at most once, and every gene's own parameters pass config validation.
    pub fn validate(&self, config: &Config) -> Result<()> {
        if self.genes.is_empty() {
            return Err(EvoError::LogicViolation(
                "chromosome must contain at least one gene".to_string(),
            ));
        }
        let mut seen = BTreeSet::new();
        for gene in &self.genes {
            if !seen.insert(gene.gene_type) {
                return Err(EvoError::LogicViolation(format!(
                    "duplicate gene type {} in chromosome",
                    gene.gene_type
                )));
            }
            gene.validate(config)?;
        }
        Ok(())
    }

    pub fn gene_types(&self) -> BTreeSet<crate::genes::types::GeneType> {
        self.genes.iter().map(|g| g.gene_type).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::default_genes_config;
    use crate::genes::types::{GeneType, ParamValue};
    use std::collections::BTreeMap;

    fn rsi_gene() -> ChromosomeGene {
        let mut params = BTreeMap::new();
        params.insert("period".to_string(), ParamValue::Number(14.0));
        params.insert("overbought".to_string(), ParamValue::Number(70.0));
        params.insert("oversold".to_string(), ParamValue::Number(30.0));
        ChromosomeGene::new(GeneType::Rsi, params, 1.0, 0.5)
    }

    #[test]
    fn duplicate_gene_types_are_rejected() {
        let config = Config {
            gene: default_genes_config(),
            ..Config::default()
        };
        let chromosome = Chromosome::new(1, 0, vec![rsi_gene(), rsi_gene()], Utc::now());
        assert!(chromosome.validate(&config).is_err());
    }

    #[test]
    fn empty_chromosome_is_rejected() {
        let config = Config::default();
        let chromosome = Chromosome::new(1, 0, vec![], Utc::now());
        assert!(chromosome.validate(&config).is_err());
    }

    #[test]
    fn fingerprint_is_stable_after_recompute() {
        let chromosome = Chromosome::new(1, 0, vec![rsi_gene()], Utc::now());
        let original = chromosome.fingerprint.clone();
        let mut clone = chromosome.clone();
        clone.recompute_fingerprint();
        assert_eq!(original, clone.fingerprint);
    }
}
