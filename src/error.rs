//! Error types for loading and scoring.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum RfmError {
    #[error("malformed input at line {line}, column '{column}' (value '{value}'): {reason}")]
    MalformedInput {
        line: u64,
        column: String,
        value: String,
        reason: String,
    },

    #[error("invalid record for customer '{customer_id}': {reason}")]
    InvalidRecord { customer_id: String, reason: String },

    #[error("cannot split '{metric}' into {buckets} non-empty quantile buckets ({distinct} distinct values)")]
    DegenerateDistribution {
        metric: String,
        distinct: usize,
        buckets: usize,
    },

    #[error("customer population is empty")]
    EmptyPopulation,

    #[error("score {0} is outside 1..=5")]
    InvalidScore(u8),

    #[error("invalid campaign configuration: {0}")]
    InvalidConfig(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

impl RfmError {
    pub(crate) fn malformed(
        line: u64,
        column: &str,
        value: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        RfmError::MalformedInput {
            line,
            column: column.to_string(),
            value: value.into(),
            reason: reason.into(),
        }
    }
}
