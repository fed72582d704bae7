//! Property-based tests for §8's quantified invariants over randomized chromosomes and
//! bar windows.

use std::collections::BTreeMap;

use chrono::{TimeZone, Utc};
use evocrate::aggregator::aggregate_signals;
use evocrate::config::Config;
use evocrate::data::bar::Bar;
use evocrate::evolution::mutation::mutate;
use evocrate::genes::types::{GeneType, ParamValue};
use evocrate::model::chromosome::Chromosome;
use evocrate::model::gene_instance::ChromosomeGene;
use proptest::prelude::*;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

fn bars_strategy(len: usize) -> impl Strategy<Value = Vec<Bar>> {
    proptest::collection::vec(60.0f64..160.0, len).prop_map(|closes| {
        closes
            .into_iter()
            .enumerate()
            .map(|(i, close)| Bar {
                timestamp: Utc.timestamp_opt(i as i64 * 60, 0).unwrap(),
                open: close,
                high: close + 1.0,
                low: (close - 1.0).max(0.01),
                close,
                volume: 500.0,
            })
            .collect()
    })
}

fn rsi_gene(weight: f64) -> ChromosomeGene {
    let mut params = BTreeMap::new();
    params.insert("period".to_string(), ParamValue::Number(5.0));
    params.insert("overbought".to_string(), ParamValue::Number(70.0));
    params.insert("oversold".to_string(), ParamValue::Number(30.0));
    ChromosomeGene::new(GeneType::Rsi, params, weight, 0.5)
}

proptest! {
    // Invariant 1: aggregated signal always stays within [-1, 1] for any bar window.
    #[test]
    fn aggregated_signal_stays_in_bounds(bars in bars_strategy(40), weight in 0.1f64..5.0) {
        let chromosome = Chromosome::new(1, 0, vec![rsi_gene(weight)], Utc::now());
        let signals = aggregate_signals(&chromosome, &bars).unwrap();
        for s in signals {
            prop_assert!((-1.0..=1.0).contains(&s));
        }
    }

    // Invariant 2: mutation never pushes weight or risk_factor outside the configured
    // bounds, across arbitrary seeds and repeated application.
    #[test]
    fn mutation_keeps_weight_and_risk_factor_in_bounds(seed in any::<u64>(), rounds in 1usize..20) {
        let config = Config::default();
        let mut chromosome = Chromosome::new(1, 0, vec![rsi_gene(1.0)], Utc::now());
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        for _ in 0..rounds {
            mutate(&mut chromosome, 0.5, &config, &mut rng).unwrap();
        }
        for gene in &chromosome.genes {
            prop_assert!(gene.weight >= config.gene.base.weight_min && gene.weight <= config.gene.base.weight_max);
            prop_assert!(gene.risk_factor >= config.gene.base.risk_factor_min && gene.risk_factor <= config.gene.base.risk_factor_max);
        }
    }
}
