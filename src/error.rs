//! Error types for tradeq.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("max concurrency must be positive, got {0}")]
    InvalidConcurrency(usize),

    #[error("inbound stream failed: {0}")]
    Inbound(String),

    #[error("processing failed for key {key}: {message}")]
    Processing { key: String, message: String },

    #[error("configuration error: {0}")]
    Config(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Key of the work item this error belongs to, if any.
    pub fn key(&self) -> Option<&str> {
        match self {
            Error::Processing { key, .. } => Some(key),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
