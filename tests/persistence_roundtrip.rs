//! §8's persistence invariants: reloading a population and its chromosomes after a write
//! must compare equal under canonical JSON normalization, and a rolled-back transaction
//! must leave the database exactly as it was.

use std::collections::BTreeMap;

use chrono::Utc;
use evocrate::config::Config;
use evocrate::context::AppContext;
use evocrate::data::interval::Interval;
use evocrate::genes::types::{GeneType, ParamValue};
use evocrate::model::chromosome::Chromosome;
use evocrate::model::gene_instance::ChromosomeGene;
use evocrate::model::population::Population;

fn rsi_gene() -> ChromosomeGene {
    let mut params = BTreeMap::new();
    params.insert("period".to_string(), ParamValue::Number(9.0));
    params.insert("overbought".to_string(), ParamValue::Number(72.0));
    params.insert("oversold".to_string(), ParamValue::Number(28.0));
    ChromosomeGene::new(GeneType::Rsi, params, 1.25, 0.6)
}

async fn build_context() -> std::sync::Arc<AppContext> {
    let dir = std::env::temp_dir().join(format!(
        "evocrate-roundtrip-market-{}-{}",
        std::process::id(),
        Utc::now().timestamp_nanos_opt().unwrap_or(0)
    ));
    std::fs::create_dir_all(&dir).unwrap();

    let mut config = Config::default();
    config.db_path = ":memory:".to_string();
    config.market_data_path = dir.to_string_lossy().to_string();
    AppContext::build(config).await.unwrap()
}

// Persisting and reloading a population yields an object whose scalar fields compare
// equal field-by-field (no derived PartialEq on `Population`; comparing the fields the
// spec actually cares about is more informative than an opaque `assert_eq!` on the struct).
#[tokio::test]
async fn reloaded_population_matches_what_was_written() {
    let context = build_context().await;

    let mut population = Population::new("roundtrip", "ETHUSD", Interval::FourHours, 8, 42, Utc::now());
    let id = context.repository.create_population(&population).await.unwrap();
    population.id = id;

    let reloaded = context.repository.load_population(id).await.unwrap();

    assert_eq!(reloaded.id, population.id);
    assert_eq!(reloaded.name, population.name);
    assert_eq!(reloaded.symbol, population.symbol);
    assert_eq!(reloaded.interval, population.interval);
    assert_eq!(reloaded.current_generation, population.current_generation);
    assert_eq!(reloaded.size, population.size);
    assert_eq!(reloaded.rng_seed, population.rng_seed);
}

// A chromosome's genes, params, weight and risk_factor survive a write/read cycle
// byte-for-byte once normalized through `serde_json::Value` (key order, float formatting).
#[tokio::test]
async fn reloaded_chromosome_genes_match_under_canonical_json() {
    let context = build_context().await;

    let mut population = Population::new("roundtrip2", "BTCUSD", Interval::OneHour, 4, 7, Utc::now());
    let population_id = context.repository.create_population(&population).await.unwrap();
    population.id = population_id;

    let original = Chromosome::new(population_id, 0, vec![rsi_gene()], Utc::now());

    let mut tx = context.repository.begin().await.unwrap();
    let chromosome_id = context.repository.insert_chromosome(&mut tx, &original).await.unwrap();
    tx.commit().await.unwrap();

    let reloaded_all = context.repository.load_chromosomes(population_id).await.unwrap();
    let reloaded = reloaded_all.iter().find(|c| c.id == chromosome_id).unwrap();

    let original_json = serde_json::to_value(&original.genes).unwrap();
    let reloaded_json = serde_json::to_value(&reloaded.genes).unwrap();
    assert_eq!(original_json, reloaded_json);
    assert_eq!(reloaded.fingerprint, original.fingerprint);
}

// Starting a transaction, writing a chromosome, then rolling back leaves the chromosome
// table exactly as it was before the transaction began.
#[tokio::test]
async fn rolled_back_transaction_leaves_no_trace() {
    let context = build_context().await;

    let mut population = Population::new("rollback", "BTCUSD", Interval::OneHour, 4, 11, Utc::now());
    let population_id = context.repository.create_population(&population).await.unwrap();
    population.id = population_id;

    let before = context.repository.load_chromosomes(population_id).await.unwrap();
    assert!(before.is_empty());

    {
        let mut tx = context.repository.begin().await.unwrap();
        let doomed = Chromosome::new(population_id, 0, vec![rsi_gene()], Utc::now());
        context.repository.insert_chromosome(&mut tx, &doomed).await.unwrap();
        tx.rollback().await.unwrap();
    }

    let after = context.repository.load_chromosomes(population_id).await.unwrap();
    assert!(after.is_empty(), "rolled-back insert must not be visible");
}
