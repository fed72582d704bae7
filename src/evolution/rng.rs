//! Seedable RNG stream derivation (§5): every chromosome gets its own deterministic
//! `ChaCha8Rng` stream keyed by `(population.rng_seed, chromosome_id)`, so re-running the
//! same population/chromosome pair reproduces identical mutation/crossover decisions
//! regardless of evaluation order or thread.

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

/// Derives a chromosome's private RNG stream from its population's seed and its own id.
/// Uses `ChaCha8Rng::seed_from_u64` composed over both values rather than
/// `set_stream`, since the latter is only exposed by the lower-level `ChaChaCore`.
pub fn chromosome_rng(population_rng_seed: u64, chromosome_id: i64) -> ChaCha8Rng {
    let mixed = population_rng_seed ^ splitmix64(chromosome_id as u64);
    ChaCha8Rng::seed_from_u64(mixed)
}

/// SplitMix64 finalizer, used only to decorrelate the chromosome id from the population
/// seed before folding them together; not a security primitive.
fn splitmix64(mut x: u64) -> u64 {
    x = x.wrapping_add(0x9E3779B97F4A7C15);
    let mut z = x;
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58476D1CE4E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D049BB133111EB);
    z ^ (z >> 31)
}
