use polars::error::PolarsError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClaimCostError {
    #[error("Data loading error: {0}")]
    DataLoading(#[from] PolarsError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Config parse error: {0}")]
    ConfigParse(#[from] toml::de::Error),

    #[error("Invalid config: {0}")]
    InvalidConfig(String),

    #[error("Missing column `{0}`")]
    MissingColumn(String),

    #[error("Row {row}: invalid number {value:?} in column `{column}`")]
    InvalidNumber {
        column: String,
        row: usize,
        value: String,
    },

    #[error("Row {row}: unparsable timestamp {value:?} in column `{column}`")]
    InvalidTimestamp {
        column: String,
        row: usize,
        value: String,
    },

    #[error("Row {row}: missing target value in column `{column}`")]
    MissingTarget { column: String, row: usize },

    #[error("Unknown category {value:?} in column `{column}`")]
    UnknownCategory { column: String, value: String },

    #[error("Insufficient data: {0}")]
    InsufficientData(String),

    #[error("Model error: {0}")]
    Model(String),

    #[error("Prediction count {actual} does not match submission rows {expected}")]
    RowCountMismatch { expected: usize, actual: usize },
}

pub type Result<T> = std::result::Result<T, ClaimCostError>;
