use thiserror::Error;

#[derive(Error, Debug)]
pub enum UssdError {
    #[error("CSV error: {0}")]
    CsvError(#[from] csv::Error),
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
    #[error("Validation error: {0}")]
    ValidationError(String),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Configuration error: {0}")]
    ConfigError(String),
    #[error("Gateway rejected request with status {status}: {body}")]
    GatewayRejected { status: u16, body: String },
    #[error("HTTP error: {0}")]
    HttpError(#[from] reqwest::Error),
    #[error("Reconciliation error: {0}")]
    ReconciliationError(String),
    #[error("Dispatch error: {0}")]
    DispatchError(String),
    #[cfg(feature = "storage-rocksdb")]
    #[error("Storage error: {0}")]
    StorageError(#[from] rocksdb::Error),
    #[error("Internal error: {0}")]
    InternalError(#[from] Box<dyn std::error::Error + Send + Sync>),
}

impl UssdError {
    /// Errors raised while talking to the payment gateway or SMS provider.
    pub fn is_gateway(&self) -> bool {
        matches!(self, Self::GatewayRejected { .. } | Self::HttpError(_))
    }
}

pub type Result<T> = std::result::Result<T, UssdError>;
