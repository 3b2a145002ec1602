use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    // Source Acquisition Errors
    #[error("HTTP error: {0}")]
    HttpError(String),

    #[error("Source {source_id} returned status {status}")]
    UnexpectedStatus {
        source_id: &'static str,
        status: u16,
    },

    #[error("No line for currency {0} in bank feed")]
    CurrencyNotFound(String),

    #[error("Column {index} missing on {currency} line")]
    ColumnMissing {
        currency: String,
        index: usize,
    },

    #[error("Invalid rate value: {0:?}")]
    InvalidRate(String),

    #[error("Rates extraction failed: direct={direct:?}, usd={usd:?}")]
    ExtractionFailed {
        direct: Option<f64>,
        usd: Option<f64>,
    },

    // Browser Session Errors
    #[error("Browser launch failed: {0}")]
    BrowserLaunch(String),

    #[error("Navigation to {url} failed: {reason}")]
    Navigation {
        url: String,
        reason: String,
    },

    #[error("Selector {selector} not attached within {timeout_ms}ms")]
    SelectorTimeout {
        selector: String,
        timeout_ms: u64,
    },

    #[error("Script evaluation failed: {0}")]
    Evaluation(String),

    #[error("WebDriver protocol error: {0}")]
    WebDriver(String),

    // Ledger Errors
    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Ledger data corrupt: {0}")]
    CorruptLedger(String),

    #[error("Ledger is empty")]
    EmptyLedger,

    // Acquisition Guard
    #[error("Acquisition cycle already in progress")]
    AcquisitionInProgress,

    #[error("Background task failure: {0}")]
    TaskFailed(String),

    // System Errors
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Invalid timezone: {0}")]
    InvalidTimezone(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("Deserialization failed: {0}")]
    DeserializationError(String),

    // IO Errors
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        Error::HttpError(err.to_string())
    }
}

impl From<rusqlite::Error> for Error {
    fn from(err: rusqlite::Error) -> Self {
        Error::Storage(err.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::SerializationError(err.to_string())
    }
}

impl From<::config::ConfigError> for Error {
    fn from(err: ::config::ConfigError) -> Self {
        Error::ConfigError(err.to_string())
    }
}
