//! Selection operators (§4.6): tournament selection to choose breeding parents, truncation
//! to choose survivors, gated by the population's diversity threshold.

use rand::seq::SliceRandom;
use rand::Rng;

use crate::model::chromosome::Chromosome;

/// Picks one parent's index via tournament selection: draws `tournament_size` candidates
/// without replacement and returns the index of the one with the highest fitness.
/// Chromosomes without a computed fitness are treated as `0.0`. `exclude`, when given,
/// removes one pool index from the draw, so a second tournament for the same breeding
/// pair picks from the remaining set rather than risking its own parent again; if `pool`
/// has only one member, `exclude` is ignored and that member is returned.
pub fn tournament_select<R: Rng + ?Sized>(
    pool: &[Chromosome],
    tournament_size: usize,
    exclude: Option<usize>,
    rng: &mut R,
) -> usize {
    assert!(!pool.is_empty(), "tournament selection requires a non-empty pool");

    let mut candidates: Vec<usize> = (0..pool.len()).filter(|&i| Some(i) != exclude).collect();
    if candidates.is_empty() {
        candidates = (0..pool.len()).collect();
    }
    candidates.shuffle(rng);
    let tournament_size = tournament_size.max(1).min(candidates.len());

    let mut best = candidates[0];
    for &idx in &candidates[1..tournament_size] {
        if pool[idx].fitness.unwrap_or(0.0) > pool[best].fitness.unwrap_or(0.0) {
            best = idx;
        }
    }
    best
}

/// Selects the top `survivor_count` chromosomes, ranked by fitness descending, breaking
/// ties first by younger age (lower generation number loses to higher, i.e. newer
/// survives) then by fingerprint, so survivor selection is fully deterministic given
/// identical fitness values rather than depending on sort stability.
pub fn truncation_select(pool: &[Chromosome], survivor_count: usize) -> Vec<Chromosome> {
    let mut ranked: Vec<&Chromosome> = pool.iter().collect();
    ranked.sort_by(|a, b| {
        b.fitness
            .unwrap_or(0.0)
            .partial_cmp(&a.fitness.unwrap_or(0.0))
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| b.generation.cmp(&a.generation))
            .then_with(|| a.fingerprint.cmp(&b.fingerprint))
    });
    ranked.into_iter().take(survivor_count).cloned().collect()
}
