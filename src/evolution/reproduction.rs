//! Reproduction operators (§4.7): uniform gene-set crossover decides which gene types a
//! child inherits, weighted-blend parameter crossover decides the inherited gene's actual
//! parameter values when both parents carry that gene type.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use rand::Rng;

use crate::genes::types::ParamValue;
use crate::model::chromosome::Chromosome;
use crate::model::gene_instance::ChromosomeGene;

/// Produces one child chromosome from two parents. Every gene type present in either
/// parent is a candidate; if present in both, `crossover_rate` (§6 `gene.base.crossover_rate`)
/// gates whether the two copies are actually blended; below it, the child simply inherits
/// one parent's copy unchanged, same as a gene type present in only one parent.
pub fn crossover<R: Rng + ?Sized>(
    parent_a: &Chromosome,
    parent_b: &Chromosome,
    population_id: i64,
    child_generation: u32,
    created_at: DateTime<Utc>,
    crossover_rate: f64,
    rng: &mut R,
) -> Chromosome {
    let genes_a: BTreeMap<_, _> = parent_a.genes.iter().map(|g| (g.gene_type, g)).collect();
    let genes_b: BTreeMap<_, _> = parent_b.genes.iter().map(|g| (g.gene_type, g)).collect();

    let all_types: BTreeSet<_> = genes_a.keys().chain(genes_b.keys()).copied().collect();

    let mut child_genes = Vec::with_capacity(all_types.len());
    for gene_type in all_types {
        match (genes_a.get(&gene_type), genes_b.get(&gene_type)) {
            (Some(a), Some(b)) if rng.gen::<f64>() < crossover_rate => child_genes.push(blend_genes(a, b, rng)),
            (Some(a), Some(b)) => {
                child_genes.push(if rng.gen_bool(0.5) { (*a).clone() } else { (*b).clone() });
            }
            (Some(a), None) => child_genes.push((*a).clone()),
            (None, Some(b)) => child_genes.push((*b).clone()),
            (None, None) => unreachable!("gene type came from the union of both parents' keys"),
        }
    }

    let mut child = Chromosome::new(population_id, child_generation, child_genes, created_at);
    child.parent1_id = Some(parent_a.id);
    child.parent2_id = Some(parent_b.id);
    child
}

/// Weighted-blend parameter crossover: each numeric parameter (and `weight`/`risk_factor`)
/// is blended with an independently drawn mixing ratio; text parameters are inherited
/// from one parent chosen by the same coin flip as the mixing ratio's side.
fn blend_genes<R: Rng + ?Sized>(a: &ChromosomeGene, b: &ChromosomeGene, rng: &mut R) -> ChromosomeGene {
    debug_assert_eq!(a.gene_type, b.gene_type);

    let mut params = BTreeMap::new();
    for key in a.params.keys() {
        let ratio: f64 = rng.gen_range(0.0..=1.0);
        let value = match (a.params.get(key), b.params.get(key)) {
            (Some(ParamValue::Number(x)), Some(ParamValue::Number(y))) => {
                ParamValue::Number(x * ratio + y * (1.0 - ratio))
            }
            (Some(ParamValue::Text(x)), Some(_)) => {
                ParamValue::Text(if ratio >= 0.5 { x.clone() } else { b.params[key].as_text().unwrap_or(x).to_string() })
            }
            (Some(v), None) | (None, Some(v)) => v.clone(),
            _ => continue,
        };
        params.insert(key.clone(), value);
    }

    let weight_ratio: f64 = rng.gen_range(0.0..=1.0);
    let risk_ratio: f64 = rng.gen_range(0.0..=1.0);

    ChromosomeGene::new(
        a.gene_type,
        params,
        a.weight * weight_ratio + b.weight * (1.0 - weight_ratio),
        a.risk_factor * risk_ratio + b.risk_factor * (1.0 - risk_ratio),
    )
}
