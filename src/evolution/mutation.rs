//! Mutation operators (§4.8): four independent operators, each applied to a chromosome
//! with its own probability drawn from the gene's configured `mutation_rate`.

use rand::Rng;
use rand_distr::{Distribution, Normal};

use crate::config::Config;
use crate::error::Result;
use crate::genes::types::{GeneType, ParamValue, ALL_GENE_TYPES};
use crate::model::chromosome::Chromosome;
use crate::model::gene_instance::ChromosomeGene;

const JITTER_STD_FRACTION: f64 = 0.1;

/// Applies all four mutation operators in sequence, each gated independently by `rate`
/// (sampled per generation from `population.evolution.mutation_rate_range` by the caller,
/// §4.8, §6). Mutates `chromosome` in place and recomputes its fingerprint afterward.
pub fn mutate<R: Rng + ?Sized>(chromosome: &mut Chromosome, rate: f64, config: &Config, rng: &mut R) -> Result<()> {
    for gene in &mut chromosome.genes {
        if rng.gen::<f64>() < rate {
            jitter_parameters(gene, config, rng)?;
            chromosome.mutation_stats.parameter_jitter_count += 1;
        }
    }
    for gene in &mut chromosome.genes {
        if rng.gen::<f64>() < rate {
            mutate_weight(gene, config, rng);
            chromosome.mutation_stats.weight_mutation_count += 1;
        }
    }
    for gene in &mut chromosome.genes {
        if rng.gen::<f64>() < rate {
            mutate_risk_factor(gene, config, rng);
            chromosome.mutation_stats.risk_factor_mutation_count += 1;
        }
    }
    if rng.gen::<f64>() < rate {
        swap_gene(chromosome, config, rng)?;
        chromosome.mutation_stats.gene_swap_count += 1;
    }

    chromosome.recompute_fingerprint();
    Ok(())
}

/// Operator 1: perturbs each numeric parameter by Gaussian noise scaled to its declared
/// range, then clamps back into the range.
fn jitter_parameters<R: Rng + ?Sized>(gene: &mut ChromosomeGene, config: &Config, rng: &mut R) -> Result<()> {
    let gene_config = config.gene.get(gene.gene_type)?;
    for (key, value) in gene.params.iter_mut() {
        let ParamValue::Number(n) = value else { continue };
        let Some(crate::genes::types::Constraint::Range { min, max }) = gene_config.constraints.get(key) else {
            continue;
        };
        let std_dev = ((max - min) * JITTER_STD_FRACTION).max(1e-9);
        let normal = Normal::new(0.0, std_dev).expect("std_dev is always positive");
        let perturbed = *n + normal.sample(rng);
        *value = ParamValue::Number(perturbed.clamp(*min, *max));
    }
    Ok(())
}

/// Operator 2: perturbs the gene's weight within `[weight_min, weight_max]`.
fn mutate_weight<R: Rng + ?Sized>(gene: &mut ChromosomeGene, config: &Config, rng: &mut R) {
    let base = &config.gene.base;
    let std_dev = ((base.weight_max - base.weight_min) * JITTER_STD_FRACTION).max(1e-9);
    let normal = Normal::new(0.0, std_dev).expect("std_dev is always positive");
    gene.weight = (gene.weight + normal.sample(rng)).clamp(base.weight_min, base.weight_max);
}

/// Operator 3: perturbs the gene's risk_factor within `[risk_factor_min, risk_factor_max]`.
fn mutate_risk_factor<R: Rng + ?Sized>(gene: &mut ChromosomeGene, config: &Config, rng: &mut R) {
    let base = &config.gene.base;
    let std_dev = ((base.risk_factor_max - base.risk_factor_min) * JITTER_STD_FRACTION).max(1e-9);
    let normal = Normal::new(0.0, std_dev).expect("std_dev is always positive");
    gene.risk_factor = (gene.risk_factor + normal.sample(rng)).clamp(base.risk_factor_min, base.risk_factor_max);
}

/// Operator 4: replaces one existing gene with a freshly initialized gene of a type the
/// chromosome does not yet carry, seeded from that type's configured defaults. A no-op if
/// the chromosome already carries every gene type.
fn swap_gene<R: Rng + ?Sized>(chromosome: &mut Chromosome, config: &Config, rng: &mut R) -> Result<()> {
    let present = chromosome.gene_types();
    let candidates: Vec<GeneType> = ALL_GENE_TYPES.into_iter().filter(|gt| !present.contains(gt)).collect();
    if candidates.is_empty() || chromosome.genes.is_empty() {
        return Ok(());
    }

    let new_type = candidates[rng.gen_range(0..candidates.len())];
    let new_type_config = config.gene.get(new_type)?;
    let replace_index = rng.gen_range(0..chromosome.genes.len());

    chromosome.genes[replace_index] = ChromosomeGene::new(
        new_type,
        new_type_config.default.clone(),
        config.gene.base.weight_min.max(1.0),
        config.gene.base.risk_factor_min.max(0.5),
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;
    use std::collections::BTreeMap;

    fn rsi_gene() -> ChromosomeGene {
        let mut params = BTreeMap::new();
        params.insert("period".to_string(), ParamValue::Number(14.0));
        params.insert("overbought".to_string(), ParamValue::Number(70.0));
        params.insert("oversold".to_string(), ParamValue::Number(30.0));
        ChromosomeGene::new(GeneType::Rsi, params, 1.0, 0.5)
    }

    #[test]
    fn mutation_keeps_parameters_within_constraints() {
        let config = Config::default();
        let mut chromosome = Chromosome::new(1, 0, vec![rsi_gene()], Utc::now());
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        for _ in 0..50 {
            mutate(&mut chromosome, 0.5, &config, &mut rng).unwrap();
            let gene = &chromosome.genes[0];
            if gene.gene_type == GeneType::Rsi {
                let period = gene.params["period"].as_number().unwrap();
                assert!((2.0..=50.0).contains(&period));
            }
        }
    }

    #[test]
    fn mutation_never_exceeds_weight_bounds() {
        let config = Config::default();
        let mut chromosome = Chromosome::new(1, 0, vec![rsi_gene()], Utc::now());
        let mut rng = ChaCha8Rng::seed_from_u64(2);
        for _ in 0..50 {
            mutate(&mut chromosome, 0.5, &config, &mut rng).unwrap();
            assert!(chromosome.genes[0].weight >= config.gene.base.weight_min);
            assert!(chromosome.genes[0].weight <= config.gene.base.weight_max);
        }
    }
}
