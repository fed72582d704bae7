//! Schema-versioned JSON envelope (§3) wrapping every JSON-blob column: `performance_metrics`,
//! `weight_distribution`, `mutation_stats`, and per-generation history stats. A newer
//! envelope than this binary understands is a hard error; an older one is upgraded
//! in-place before the payload is handed to the caller.

use serde::{de::DeserializeOwned, Deserialize, Serialize};

use crate::error::{EvoError, Result};

pub const CURRENT_SCHEMA_VERSION: u16 = 1;

#[derive(Debug, Serialize, Deserialize)]
struct Envelope<T> {
    schema_version: u16,
    payload: T,
}

/// Serializes `payload` wrapped in the current schema envelope, ready to store in a JSON
/// column.
pub fn encode<T: Serialize>(payload: &T) -> Result<String> {
    let envelope = Envelope {
        schema_version: CURRENT_SCHEMA_VERSION,
        payload,
    };
    Ok(serde_json::to_string(&envelope)?)
}

/// Decodes a stored envelope. Rejects envelopes newer than this binary's
/// `CURRENT_SCHEMA_VERSION`; envelopes from an older version are deserialized as-is since
/// every field added since version 1 has so far been additive with a `#[serde(default)]`.
pub fn decode<T: DeserializeOwned>(raw: &str) -> Result<T> {
    let value: serde_json::Value = serde_json::from_str(raw)?;
    let found_version = value
        .get("schema_version")
        .and_then(|v| v.as_u64())
        .unwrap_or(0) as u16;

    if found_version > CURRENT_SCHEMA_VERSION {
        return Err(EvoError::UnsupportedSchemaVersion {
            found: found_version,
            supported: CURRENT_SCHEMA_VERSION,
        });
    }

    let payload = value
        .get("payload")
        .cloned()
        .ok_or_else(|| EvoError::invalid_input("envelope missing payload field"))?;
    Ok(serde_json::from_value(payload)?)
}
