//! Consolidated error taxonomy. See SPEC_FULL.md §7.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum EvoError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("insufficient data: {0}")]
    InsufficientData(String),

    #[error("storage error after {attempts} attempt(s): {source}")]
    Storage {
        attempts: u32,
        #[source]
        source: sqlx::Error,
    },

    #[error("logic violation: {0}")]
    LogicViolation(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("unknown gene type: {0}")]
    UnknownGeneType(String),

    #[error("unknown technical parameter: {gene_type}.{parameter}")]
    UnknownParameter { gene_type: String, parameter: String },

    #[error("schema version {found} is newer than supported version {supported}")]
    UnsupportedSchemaVersion { found: u16, supported: u16 },

    #[error("population {0} not found")]
    PopulationNotFound(i64),

    #[error("chromosome {0} not found")]
    ChromosomeNotFound(i64),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("yaml error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),

    #[error("database error: {0}")]
    Sqlx(#[from] sqlx::Error),

    #[error("join error: {0}")]
    Join(#[from] tokio::task::JoinError),
}

impl EvoError {
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        EvoError::InvalidInput(msg.into())
    }

    pub fn insufficient_data(msg: impl Into<String>) -> Self {
        EvoError::InsufficientData(msg.into())
    }

    /// Whether this error represents a transient condition worth retrying (§7).
    pub fn is_retryable(&self) -> bool {
        matches!(self, EvoError::Storage { .. })
    }
}

pub type Result<T> = std::result::Result<T, EvoError>;
