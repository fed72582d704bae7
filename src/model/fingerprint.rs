//! SHA-256 chromosome fingerprinting (§4.7): a canonical, order-independent digest used
//! to detect duplicate genomes during diversity checks and for external identification.

use std::collections::BTreeMap;

use sha2::{Digest, Sha256};

use crate::genes::types::{GeneType, ParamValue};

/// One gene's contribution to the canonical fingerprint input, sorted by gene type so the
/// digest is independent of the in-memory gene ordering.
pub fn fingerprint(genes: &[(GeneType, BTreeMap<String, ParamValue>, f64, f64)]) -> String {
    let mut sorted: Vec<&(GeneType, BTreeMap<String, ParamValue>, f64, f64)> = genes.iter().collect();
    sorted.sort_by_key(|(gt, _, _, _)| *gt);

    let mut hasher = Sha256::new();
    for (gene_type, params, weight, risk_factor) in sorted {
        hasher.update(gene_type.as_str().as_bytes());
        for (key, value) in params {
            hasher.update(key.as_bytes());
            match value {
                ParamValue::Number(n) => hasher.update(n.to_bits().to_le_bytes()),
                ParamValue::Text(t) => hasher.update(t.as_bytes()),
            }
        }
        hasher.update(weight.to_bits().to_le_bytes());
        hasher.update(risk_factor.to_bits().to_le_bytes());
    }
    format!("{:x}", hasher.finalize())
}
