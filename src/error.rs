use thiserror::Error;

/// Errors that abort an analysis run
#[derive(Error, Debug)]
pub enum AnalysisError {
    /// Reading or writing a local file failed
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The delimited input could not be read
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// A config override file could not be parsed
    #[error("Configuration error: {0}")]
    Config(#[from] serde_json::Error),

    /// The input lacks a column the analysis needs
    #[error("Missing expected column: {0}")]
    MissingColumn(String),

    /// A row holds a value that cannot be interpreted
    #[error("Invalid record at row {row}: {message}")]
    InvalidRecord { row: usize, message: String },

    /// A fitting or scoring step has nothing sensible to work with
    #[error("Computation error: {0}")]
    Computation(String),
}

pub type Result<T> = std::result::Result<T, AnalysisError>;
