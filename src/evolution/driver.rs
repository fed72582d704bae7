//! Evolution Driver (§4.9): orchestrates one full generation: fitness evaluation,
//! selection, reproduction, mutation, persistence, and can run that cycle in an
//! autonomous background loop with cooperative cancellation (§5).

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use tracing::{info, instrument, warn};

use crate::aggregator::aggregate_signals;
use crate::backtest::run_backtest;
use crate::config::Config;
use crate::context::AppContext;
use crate::data::bar::Bar;
use crate::error::Result;
use crate::evolution::history::{GenerationStats, MutationStats};
use crate::evolution::reproduction::crossover;
use crate::evolution::rng::chromosome_rng;
use crate::evolution::selection::{truncation_select, tournament_select};
use crate::evolution::mutation::mutate;
use crate::metrics::{calculate_fitness, calculate_metrics, PerformanceMetrics};
use crate::model::chromosome::Chromosome;
use crate::model::population::Population;

/// Drives a single population's generations. One driver instance is created per
/// autonomous task (§5); interactive callers construct one and call [`run_generation`]
/// directly for a single synchronous step.
pub struct EvolutionDriver {
    context: Arc<AppContext>,
    cancel: Arc<AtomicBool>,
}

impl EvolutionDriver {
    pub fn new(context: Arc<AppContext>) -> Self {
        Self {
            context,
            cancel: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn cancellation_flag(&self) -> Arc<AtomicBool> {
        self.cancel.clone()
    }

    /// Runs fitness evaluation, selection, reproduction and mutation for one generation of
    /// `population_id`, then persists the result, returning the generation's summary stats.
    #[instrument(level = "info", skip(self))]
    pub async fn run_generation(&self, population_id: i64) -> Result<GenerationStats> {
        let population = self.context.repository.load_population(population_id).await?;
        let mut chromosomes = self.context.repository.load_chromosomes(population_id).await?;

        let all_bars = self
            .context
            .market_data
            .get(&population.symbol, population.interval)
            .await?;

        let config = self.context.config.clone();

        // Window the fitness backtest to the configured test horizon (§4.9 step 1,
        // `gene.base.test_period_days`) rather than the full history the cache holds.
        let bars_per_day = (24 * 60) / population.interval.to_minutes();
        let window = (config.gene.base.test_period_days as i64 * bars_per_day).max(1) as usize;
        let bars = if all_bars.len() > window {
            all_bars[all_bars.len() - window..].to_vec()
        } else {
            all_bars
        };
        let unevaluated: Vec<usize> = chromosomes
            .iter()
            .enumerate()
            .filter(|(_, c)| c.fitness.is_none())
            .map(|(i, _)| i)
            .collect();

        let mut fresh_metrics: Vec<(i64, PerformanceMetrics)> = Vec::new();
        if !unevaluated.is_empty() {
            let evaluated = evaluate_fitness(&chromosomes, &unevaluated, &bars, &config).await?;
            let now = chrono::Utc::now();
            for (idx, fitness, metrics) in &evaluated {
                chromosomes[*idx].record_fitness(population.current_generation, *fitness, *metrics, now);
                self.context.repository.update_fitness(&chromosomes[*idx]).await?;
                fresh_metrics.push((chromosomes[*idx].id, *metrics));
            }
        }

        let next_generation = population.current_generation + 1;
        let mut generation_rng = chromosome_rng(population.rng_seed, -(next_generation as i64));

        // Selection pressure is sampled fresh each generation from its configured range
        // rather than pinned to one value, keeping the pairing count itself part of the
        // search (§4.6, §6 `selection_pressure_range`). It scales how many breeding pairs
        // are drawn; survivor count below is always `population.size`, per §4.9 step 6.
        let (pressure_lo, pressure_hi) = config.evolution.selection_pressure_range;
        let selection_pressure = generation_rng.gen_range(pressure_lo..=pressure_hi);
        let num_pairs = (((population.size as f64) / selection_pressure).round().max(1.0) as usize)
            .min(population.size / 2 + 1);

        // Mutation rate is likewise sampled per generation from its configured range
        // rather than pinned to the gene config's single `base.mutation_rate` value,
        // keeping the strength of exploration itself part of the search (§4.8, §6
        // `mutation_rate_range`).
        let (mutation_lo, mutation_hi) = config.evolution.mutation_rate_range;
        let mutation_rate = generation_rng.gen_range(mutation_lo..=mutation_hi);

        // Step 2: select parent pairs via tournament, without replacement within a
        // tournament and with the second parent drawn from the pool excluding the first
        // (§4.6 "repeat for the second parent from the remaining set").
        let tournament_size = ((chromosomes.len() as f64 * 0.1).floor() as usize)
            .max(2)
            .min(chromosomes.len());
        let mut mutation_stats = MutationStats::default();
        let mut offspring = Vec::with_capacity(num_pairs * 2);

        for _ in 0..num_pairs {
            let idx_a = tournament_select(&chromosomes, tournament_size, None, &mut generation_rng);
            let idx_b = tournament_select(&chromosomes, tournament_size, Some(idx_a), &mut generation_rng);
            let parent_a = &chromosomes[idx_a];
            let parent_b = &chromosomes[idx_b];

            // Step 3/4: reproduce then mutate. Two children per pair, asymmetric primary
            // parent per §4.7 step 1.
            let mut rng = chromosome_rng(population.rng_seed, parent_a.id ^ parent_b.id);
            let mut child1 = crossover(
                parent_a,
                parent_b,
                population_id,
                next_generation,
                chrono::Utc::now(),
                config.gene.base.crossover_rate,
                &mut rng,
            );
            mutate(&mut child1, mutation_rate, &config, &mut rng)?;
            mutation_stats.parameter_jitter_count += 1;

            let mut child2 = crossover(
                parent_b,
                parent_a,
                population_id,
                next_generation,
                chrono::Utc::now(),
                config.gene.base.crossover_rate,
                &mut rng,
            );
            mutate(&mut child2, mutation_rate, &config, &mut rng)?;
            mutation_stats.parameter_jitter_count += 1;

            offspring.push(child1);
            offspring.push(child2);
        }

        // Step 5: every offspring must carry a computed fitness before it can compete in
        // survivor selection; nothing downstream ever reads an offspring's fitness as `None`.
        let offspring_indices: Vec<usize> = (0..offspring.len()).collect();
        let evaluated_offspring = evaluate_fitness(&offspring, &offspring_indices, &bars, &config).await?;
        let now = chrono::Utc::now();
        for (idx, fitness, metrics) in &evaluated_offspring {
            offspring[*idx].record_fitness(next_generation, *fitness, *metrics, now);
            fresh_metrics.push((offspring[*idx].id, *metrics));
        }

        // Step 6: survivors are drawn from the merged pool of existing chromosomes and
        // evaluated offspring (§4.6 "merge existing active chromosomes with new
        // offspring"), not from either side alone.
        let mut merged = chromosomes.clone();
        merged.extend(offspring.iter().cloned());
        let final_survivors = truncation_select(&merged, population.size.min(merged.len()));

        let existing_ids: std::collections::HashSet<i64> = chromosomes.iter().map(|c| c.id).collect();
        let surviving_ids: std::collections::HashSet<i64> = final_survivors.iter().map(|c| c.id).collect();
        let surviving_existing: Vec<Chromosome> = final_survivors
            .iter()
            .filter(|c| existing_ids.contains(&c.id))
            .cloned()
            .collect();
        let surviving_offspring: Vec<Chromosome> = final_survivors
            .iter()
            .filter(|c| !existing_ids.contains(&c.id))
            .cloned()
            .collect();
        // Every existing chromosome the merged pool didn't keep is archived rather than
        // deleted (§4.9 step 6), preserving lineage for anything that references it as a
        // parent.
        let archived_ids: Vec<i64> = chromosomes
            .iter()
            .map(|c| c.id)
            .filter(|id| !surviving_ids.contains(id))
            .collect();

        let mut next_population = population.clone();
        next_population.advance_generation();

        let stats = GenerationStats::compute(next_generation, &final_survivors, &fresh_metrics);

        self.context
            .repository
            .commit_generation(
                &next_population,
                &surviving_existing,
                &surviving_offspring,
                &archived_ids,
                &stats,
                &mutation_stats,
            )
            .await?;

        info!(
            population_id,
            generation = next_generation,
            best_fitness = stats.best_fitness,
            "completed generation"
        );

        Ok(stats)
    }

    /// Runs generations in a loop until [`request_stop`] is called. The delay between
    /// cycles is re-sampled every iteration from `population.evolution.generation_interval_range`
    /// (hours), seeded off the population's own RNG stream so a rerun with the same seed
    /// sleeps the same sequence of intervals. Suspension happens only at the
    /// `run_generation` DB-bound await points and this sleep; no CPU-bound work runs on
    /// the async executor directly (§5).
    pub async fn run_autonomous(&self, population_id: i64) -> Result<()> {
        while !self.cancel.load(Ordering::Relaxed) {
            let population = self.context.repository.load_population(population_id).await?;
            if let Err(e) = self.run_generation(population_id).await {
                warn!(population_id, error = %e, "generation failed, stopping autonomous loop");
                return Err(e);
            }

            let (lo, hi) = self.context.config.evolution.generation_interval_range;
            let mut rng = chromosome_rng(population.rng_seed, -(population.current_generation as i64 + 1));
            let hours: f64 = rng.gen_range(lo..=hi);
            tokio::time::sleep(Duration::from_secs_f64(hours * 3600.0)).await;
        }
        info!(population_id, "autonomous loop stopped by cancellation");
        Ok(())
    }

    pub fn request_stop(&self) {
        self.cancel.store(true, Ordering::Relaxed);
    }
}

/// Evaluates fitness for the chromosomes at `indices` on a bounded rayon pool, bridged
/// into the async world via `spawn_blocking` so the tokio executor never blocks on CPU-bound
/// backtesting work (§5).
async fn evaluate_fitness(
    chromosomes: &[Chromosome],
    indices: &[usize],
    bars: &[Bar],
    config: &Config,
) -> Result<Vec<(usize, f64, PerformanceMetrics)>> {
    let targets: Vec<Chromosome> = indices.iter().map(|i| chromosomes[*i].clone()).collect();
    let bars = bars.to_vec();
    let config = config.clone();

    let results = tokio::task::spawn_blocking(move || {
        targets
            .par_iter()
            .map(|chromosome| {
                let signals = aggregate_signals(chromosome, &bars)?;
                let backtest = run_backtest(&bars, &signals, &config.risk)?;
                let metrics = calculate_metrics(&backtest);
                let fitness = calculate_fitness(&metrics, &config.evolution);
                Ok::<_, crate::error::EvoError>((fitness, metrics))
            })
            .collect::<Result<Vec<_>>>()
    })
    .await??;

    Ok(indices
        .iter()
        .zip(results)
        .map(|(idx, (fitness, metrics))| (*idx, fitness, metrics))
        .collect())
}

pub fn seed_rng(seed: u64) -> ChaCha8Rng {
    ChaCha8Rng::seed_from_u64(seed)
}
