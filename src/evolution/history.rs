//! Per-generation evolution history (§6 output (b)): the summary statistics recorded each
//! time a population completes a generation, independent of any individual chromosome.

use serde::{Deserialize, Serialize};

use crate::metrics::PerformanceMetrics;
use crate::model::chromosome::Chromosome;
use crate::model::population::diversity;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationStats {
    pub generation: u32,
    pub population_size: usize,
    pub best_fitness: f64,
    pub mean_fitness: f64,
    pub diversity: f64,
    pub best_metrics: Option<PerformanceMetrics>,
}

impl GenerationStats {
    pub fn compute(generation: u32, chromosomes: &[Chromosome], metrics_by_id: &[(i64, PerformanceMetrics)]) -> Self {
        let fitnesses: Vec<f64> = chromosomes.iter().map(|c| c.fitness.unwrap_or(0.0)).collect();
        let best_fitness = fitnesses.iter().cloned().fold(f64::MIN, f64::max).max(0.0);
        let mean_fitness = if fitnesses.is_empty() {
            0.0
        } else {
            fitnesses.iter().sum::<f64>() / fitnesses.len() as f64
        };

        let best_metrics = chromosomes
            .iter()
            .max_by(|a, b| {
                a.fitness
                    .unwrap_or(0.0)
                    .partial_cmp(&b.fitness.unwrap_or(0.0))
                    .unwrap_or(std::cmp::Ordering::Equal)
            })
            .and_then(|best| metrics_by_id.iter().find(|(id, _)| *id == best.id))
            .map(|(_, m)| *m);

        GenerationStats {
            generation,
            population_size: chromosomes.len(),
            best_fitness,
            mean_fitness,
            diversity: diversity(chromosomes),
            best_metrics,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MutationStats {
    pub parameter_jitter_count: u32,
    pub weight_mutation_count: u32,
    pub risk_factor_mutation_count: u32,
    pub gene_swap_count: u32,
}
