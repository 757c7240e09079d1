use thiserror::Error;

/// Error types for the histopt-rs library.
#[derive(Error, Debug)]
pub enum HistOptError {
    /// A row's bounds are empty after clamping (`low > high`) or not finite.
    #[error("Invalid bounds for '{variable}' at row {row}: low {low} > high {high}")]
    InvalidBounds {
        row: usize,
        variable: String,
        low: f64,
        high: f64,
    },

    /// A column referenced by the configuration is absent from the table.
    #[error("Missing column: {0}")]
    MissingColumn(String),

    /// Error indicating a mismatch in vector or table dimensions.
    #[error("Dimension mismatch: {0}")]
    DimensionMismatch(String),

    /// Configuration values that cannot be used for a batch.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Input file extension the loader does not understand.
    #[error("{extension} is not supported. Supported file types are: {supported}")]
    UnsupportedInputFormat {
        extension: String,
        supported: String,
    },

    /// A cell or record could not be parsed.
    #[error("Parse error: {0}")]
    Parse(String),

    /// Error during model or objective evaluation.
    #[error("Function evaluation error: {0}")]
    FunctionEvaluation(String),

    /// Error indicating the search itself failed.
    #[error("Optimization failed: {0}")]
    OptimizationFailure(String),

    /// The worker pool could not be built or returned inconsistent results.
    #[error("Worker pool error: {0}")]
    WorkerPool(String),

    /// I/O error wrapper.
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    /// CSV reading or writing error.
    #[error("CSV error: {0}")]
    CsvError(#[from] csv::Error),
}

/// Result type alias for histopt-rs operations.
pub type Result<T> = std::result::Result<T, HistOptError>;
