use std::time::Duration;

use thiserror::Error;

pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// A JSON document did not have the shape the extractor expected.
#[derive(Error, Debug)]
#[error("Unable to extract {document} from JSON: {source}")]
pub struct ExtractionError {
    pub document: &'static str,
    #[source]
    pub source: serde_json::Error,
}

impl ExtractionError {
    pub fn new(document: &'static str, source: serde_json::Error) -> Self {
        Self { document, source }
    }
}

#[derive(Error, Debug)]
pub enum ClientError {
    #[error("Unable to {operation}: HTTP {status} - {status_text}")]
    Status {
        operation: &'static str,
        status: u16,
        status_text: String,
    },

    #[error("Unable to {operation}: no response within {timeout:?}")]
    Timeout {
        operation: &'static str,
        timeout: Duration,
    },

    #[error("Unable to {operation}: {source}")]
    Transport {
        operation: &'static str,
        #[source]
        source: BoxError,
    },

    #[error(transparent)]
    Extraction(#[from] ExtractionError),

    #[error("Configuration error: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, ClientError>;

impl ClientError {
    /// HTTP status code, when the server answered with an unexpected one.
    pub fn status(&self) -> Option<u16> {
        match self {
            ClientError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub fn status_text(&self) -> Option<&str> {
        match self {
            ClientError::Status { status_text, .. } => Some(status_text),
            _ => None,
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, ClientError::Timeout { .. })
    }
}
