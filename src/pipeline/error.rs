//! Error types for the swap/candle pipeline

/// Failure inside the persistence layer
///
/// Always terminal for the in-flight event; nothing retries.
#[derive(Debug)]
pub enum StoreError {
    Database(String),
    Io(std::io::Error),
    /// Row exists but cannot be mapped back to an entity
    Corrupt(String),
}

impl From<rusqlite::Error> for StoreError {
    fn from(err: rusqlite::Error) -> Self {
        match err {
            rusqlite::Error::FromSqlConversionFailure(..) => StoreError::Corrupt(err.to_string()),
            other => StoreError::Database(other.to_string()),
        }
    }
}

impl From<std::io::Error> for StoreError {
    fn from(err: std::io::Error) -> Self {
        StoreError::Io(err)
    }
}

impl std::fmt::Display for StoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StoreError::Database(e) => write!(f, "Database error: {}", e),
            StoreError::Io(e) => write!(f, "IO error: {}", e),
            StoreError::Corrupt(msg) => write!(f, "Corrupt row: {}", msg),
        }
    }
}

impl std::error::Error for StoreError {}

/// Failure processing a single swap event
#[derive(Debug)]
pub enum PipelineError {
    Store(StoreError),
    /// Required event attribute absent (e.g. `pool_id`)
    MissingAttribute(String),
}

impl From<StoreError> for PipelineError {
    fn from(err: StoreError) -> Self {
        PipelineError::Store(err)
    }
}

impl std::fmt::Display for PipelineError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PipelineError::Store(e) => write!(f, "Store error: {}", e),
            PipelineError::MissingAttribute(key) => {
                write!(f, "Missing required event attribute: {}", key)
            }
        }
    }
}

impl std::error::Error for PipelineError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            PipelineError::Store(e) => Some(e),
            PipelineError::MissingAttribute(_) => None,
        }
    }
}
