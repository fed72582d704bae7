//! Signal Aggregator (§4.3): combines every gene's per-bar signal series into one
//! weight-normalized composite series per chromosome, squashed through `tanh` so the
//! result stays in `(-1, 1)` regardless of gene count or weight magnitude (§9 resolves
//! the aggregation formula: a single `tanh` pass here, no second clip downstream).

use crate::data::bar::Bar;
use crate::error::{EvoError, Result};
use crate::genes::calculate_signal_series;
use crate::model::chromosome::Chromosome;

/// Computes the aggregated composite signal for every bar in `bars`.
pub fn aggregate_signals(chromosome: &Chromosome, bars: &[Bar]) -> Result<Vec<f64>> {
    if chromosome.genes.is_empty() {
        return Err(EvoError::LogicViolation(
            "cannot aggregate signals for a chromosome with no genes".to_string(),
        ));
    }

    let total_weight: f64 = chromosome.genes.iter().map(|g| g.weight).sum();
    if total_weight <= 0.0 {
        return Err(EvoError::LogicViolation(
            "chromosome's total gene weight must be positive".to_string(),
        ));
    }

    let mut per_gene_series = Vec::with_capacity(chromosome.genes.len());
    for gene in &chromosome.genes {
        let series = calculate_signal_series(gene.gene_type, &gene.params, bars)?;
        per_gene_series.push((gene.weight / total_weight, series));
    }

    let mut composite = vec![0.0; bars.len()];
    for (normalized_weight, series) in &per_gene_series {
        for (i, value) in series.iter().enumerate() {
            composite[i] += normalized_weight * value;
        }
    }

    for value in composite.iter_mut() {
        *value = value.tanh();
    }

    Ok(composite)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::genes::types::{GeneType, ParamValue};
    use crate::model::gene_instance::ChromosomeGene;
    use chrono::{TimeZone, Utc};
    use std::collections::BTreeMap;

    fn bar(secs: i64, close: f64) -> Bar {
        Bar {
            timestamp: Utc.timestamp_opt(secs, 0).unwrap(),
            open: close,
            high: close + 1.0,
            low: close - 1.0,
            close,
            volume: 100.0,
        }
    }

    fn rsi_gene(weight: f64) -> ChromosomeGene {
        let mut params = BTreeMap::new();
        params.insert("period".to_string(), ParamValue::Number(3.0));
        params.insert("overbought".to_string(), ParamValue::Number(70.0));
        params.insert("oversold".to_string(), ParamValue::Number(30.0));
        ChromosomeGene::new(GeneType::Rsi, params, weight, 0.5)
    }

    #[test]
    fn composite_stays_within_bounds() {
        let bars: Vec<Bar> = (0..20).map(|i| bar(i * 60, 100.0 + i as f64)).collect();
        let chromosome = Chromosome::new(1, 0, vec![rsi_gene(1.0), rsi_gene(2.0)], Utc::now());
        let composite = aggregate_signals(&chromosome, &bars).unwrap();
        assert_eq!(composite.len(), bars.len());
        for value in composite {
            assert!((-1.0..=1.0).contains(&value));
        }
    }

    #[test]
    fn empty_gene_list_is_rejected() {
        let chromosome = Chromosome::new(1, 0, vec![], Utc::now());
        let bars: Vec<Bar> = (0..5).map(|i| bar(i * 60, 100.0)).collect();
        assert!(aggregate_signals(&chromosome, &bars).is_err());
    }
}
