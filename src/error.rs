use thiserror::Error;

#[derive(Error, Debug)]
pub enum EtlError {
    #[error("Extraction failed: {0}")]
    Extraction(String),

    #[error("Extraction failed: request to {url} timed out after {secs}s")]
    Timeout { url: String, secs: u64 },

    #[error("Failed to parse {column} in row {row}: {value:?} is not a number")]
    Parse {
        row: usize,
        column: String,
        value: String,
    },

    #[error("Exchange rate source is malformed: {0}")]
    RateParse(String),

    #[error("Exchange rate missing for currency: {0}")]
    MissingRate(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Database error: {0}")]
    Storage(#[from] rusqlite::Error),

    #[error("Query failed: {sql}: {source}")]
    Query {
        sql: String,
        #[source]
        source: rusqlite::Error,
    },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("TOML deserialization failed: {0}")]
    Toml(#[from] toml::de::Error),
}

impl EtlError {
    /// Category name used when reporting a failed run.
    pub fn category(&self) -> &'static str {
        match self {
            EtlError::Extraction(_) | EtlError::Timeout { .. } => "ExtractionError",
            EtlError::Parse { .. } => "ParseError",
            EtlError::RateParse(_) => "RateParseError",
            EtlError::MissingRate(_) => "MissingRateError",
            EtlError::Io(_) | EtlError::Csv(_) => "IOError",
            EtlError::Storage(_) => "StorageError",
            EtlError::Query { .. } => "QueryError",
            EtlError::Config(_) | EtlError::Toml(_) => "ConfigError",
        }
    }
}

pub type Result<T> = std::result::Result<T, EtlError>;
