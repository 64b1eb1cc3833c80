//! Error Taxonomy
//!
//! Every failure the bridge can observe falls into one of a handful of classes.
//! Per-record and per-document failures are collected into an `AckResult`
//! instead of being raised; only configuration failures abort a whole run.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A record that cannot be turned into a document.
///
/// Always scoped to a single record, so callers can skip-and-count or abort.
#[derive(Debug, Clone, Error, PartialEq, Eq, Serialize, Deserialize)]
#[error("malformed record '{record_id}': {reason}")]
pub struct MalformedRecordError {
    /// Identifier of the offending record (empty when the record had none).
    pub record_id: String,
    pub reason: String,
}

impl MalformedRecordError {
    pub fn new(record_id: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            record_id: record_id.into(),
            reason: reason.into(),
        }
    }
}

#[derive(Debug, Clone, Error)]
pub enum BridgeError {
    #[error(transparent)]
    MalformedRecord(#[from] MalformedRecordError),
    #[error("no live replica for shard '{shard}' of collection '{collection}'")]
    NoLiveShard { collection: String, shard: String },
    #[error("transient transport failure: {0}")]
    RetryableTransport(String),
    #[error("cluster rejected request: {0}")]
    NonRetryableRejection(String),
    #[error("query failed: {0}")]
    QueryExecution(String),
    #[error("configuration error: {0}")]
    Configuration(String),
    #[error("run cancelled before the batch was issued")]
    Cancelled,
}

/// Serializable classification of a failure, carried in acknowledgements and
/// in error bodies on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    MalformedRecord,
    NoLiveShard,
    RetryableTransport,
    NonRetryableRejection,
    QueryExecution,
    Configuration,
    Cancelled,
}

impl BridgeError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            BridgeError::MalformedRecord(_) => ErrorKind::MalformedRecord,
            BridgeError::NoLiveShard { .. } => ErrorKind::NoLiveShard,
            BridgeError::RetryableTransport(_) => ErrorKind::RetryableTransport,
            BridgeError::NonRetryableRejection(_) => ErrorKind::NonRetryableRejection,
            BridgeError::QueryExecution(_) => ErrorKind::QueryExecution,
            BridgeError::Configuration(_) => ErrorKind::Configuration,
            BridgeError::Cancelled => ErrorKind::Cancelled,
        }
    }

    /// Only transient transport failures are worth another attempt.
    pub fn is_retryable(&self) -> bool {
        matches!(self, BridgeError::RetryableTransport(_))
    }

    /// Rebuilds an error from its wire form.
    pub fn from_kind(kind: ErrorKind, message: String) -> Self {
        match kind {
            ErrorKind::MalformedRecord => {
                BridgeError::MalformedRecord(MalformedRecordError::new("", message))
            }
            ErrorKind::NoLiveShard => BridgeError::NoLiveShard {
                collection: String::new(),
                shard: message,
            },
            ErrorKind::RetryableTransport => BridgeError::RetryableTransport(message),
            ErrorKind::NonRetryableRejection => BridgeError::NonRetryableRejection(message),
            ErrorKind::QueryExecution => BridgeError::QueryExecution(message),
            ErrorKind::Configuration => BridgeError::Configuration(message),
            ErrorKind::Cancelled => BridgeError::Cancelled,
        }
    }
}

pub type Result<T> = std::result::Result<T, BridgeError>;
