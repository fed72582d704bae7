//! A population: a cohort of chromosomes evolving generation-by-generation under one RNG
//! stream (§2, §5). `rng_seed` plus a chromosome's id derive that chromosome's private
//! RNG stream; see [`crate::evolution::rng::chromosome_rng`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::data::interval::Interval;
use crate::model::chromosome::Chromosome;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PopulationStatus {
    Active,
    Paused,
    Stopped,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Population {
    pub id: i64,
    pub name: String,
    pub symbol: String,
    pub interval: Interval,
    pub current_generation: u32,
    pub size: usize,
    pub rng_seed: u64,
    pub status: PopulationStatus,
    pub created_at: DateTime<Utc>,
}

impl Population {
    pub fn new(
        name: impl Into<String>,
        symbol: impl Into<String>,
        interval: Interval,
        size: usize,
        rng_seed: u64,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: 0,
            name: name.into(),
            symbol: symbol.into(),
            interval,
            current_generation: 0,
            size,
            rng_seed,
            status: PopulationStatus::Active,
            created_at,
        }
    }

    /// Advances the population's generation counter. This is the *only* place the counter
    /// moves forward; a child chromosome's `generation` field is set to
    /// `parent.population.current_generation + 1` at birth time, but the population-level
    /// counter only steps once per completed generation (§4.9 step 7, §9).
    pub fn advance_generation(&mut self) {
        self.current_generation += 1;
    }
}

/// Population-level diversity: fraction of distinct fingerprints among its chromosomes
/// (§4.6's diversity_threshold gate).
pub fn diversity(chromosomes: &[Chromosome]) -> f64 {
    if chromosomes.is_empty() {
        return 1.0;
    }
    let distinct: std::collections::BTreeSet<&str> =
        chromosomes.iter().map(|c| c.fingerprint.as_str()).collect();
    distinct.len() as f64 / chromosomes.len() as f64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::gene_instance::ChromosomeGene;
    use crate::genes::types::{GeneType, ParamValue};
    use std::collections::BTreeMap;

    fn chromosome_with_period(period: f64) -> Chromosome {
        let mut params = BTreeMap::new();
        params.insert("period".to_string(), ParamValue::Number(period));
        params.insert("overbought".to_string(), ParamValue::Number(70.0));
        params.insert("oversold".to_string(), ParamValue::Number(30.0));
        let gene = ChromosomeGene::new(GeneType::Rsi, params, 1.0, 0.5);
        Chromosome::new(1, 0, vec![gene], Utc::now())
    }

    #[test]
    fn diversity_of_identical_chromosomes_is_low() {
        let chromosomes = vec![chromosome_with_period(14.0), chromosome_with_period(14.0)];
        assert_eq!(diversity(&chromosomes), 0.5);
    }

    #[test]
    fn diversity_of_distinct_chromosomes_is_one() {
        let chromosomes = vec![chromosome_with_period(14.0), chromosome_with_period(21.0)];
        assert_eq!(diversity(&chromosomes), 1.0);
    }

    #[test]
    fn advance_generation_increments_counter() {
        let mut population = Population::new("p", "BTCUSD", Interval::OneHour, 10, 1, Utc::now());
        assert_eq!(population.current_generation, 0);
        population.advance_generation();
        assert_eq!(population.current_generation, 1);
    }
}
