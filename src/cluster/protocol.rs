//! Network Protocol Definitions
//!
//! DTOs exchanged between `HttpClusterClient` and a node serving the cluster
//! router. Error responses always carry an `ErrorBody` so the client can rebuild
//! the typed error on its side.

use super::client::CollectionSpec;
use crate::error::{BridgeError, ErrorKind};
use crate::indexer::types::Batch;
use crate::routing::router::RouteDecision;
use serde::{Deserialize, Serialize};

pub const ENDPOINT_COLLECTIONS: &str = "/admin/collections";
pub const ENDPOINT_COLLECTION: &str = "/admin/collections/:collection";
pub const ENDPOINT_ROUTING: &str = "/collections/:collection/routing";
pub const ENDPOINT_UPDATE: &str = "/collections/:collection/update";
pub const ENDPOINT_COMMIT: &str = "/collections/:collection/commit";
pub const ENDPOINT_SELECT: &str = "/collections/:collection/select";
pub const ENDPOINT_COUNT: &str = "/collections/:collection/count";

/// Fills the `:collection` segment of an endpoint template.
pub fn collection_path(endpoint: &str, collection: &str) -> String {
    endpoint.replace(":collection", collection)
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CreateCollectionRequest {
    pub spec: CollectionSpec,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AdminResponse {
    pub success: bool,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SubmitBatchRequest {
    pub batch: Batch,
    pub route: RouteDecision,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CommitRequest {
    pub hard: bool,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CommitResponse {
    pub success: bool,
    pub hard: bool,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CountRequest {
    pub expression: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CountResponse {
    pub count: u64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    pub kind: ErrorKind,
    pub message: String,
}

impl From<&BridgeError> for ErrorBody {
    fn from(err: &BridgeError) -> Self {
        let message = match err {
            BridgeError::NoLiveShard { shard, .. } => shard.clone(),
            BridgeError::MalformedRecord(inner) => inner.reason.clone(),
            BridgeError::RetryableTransport(m)
            | BridgeError::NonRetryableRejection(m)
            | BridgeError::QueryExecution(m)
            | BridgeError::Configuration(m) => m.clone(),
            BridgeError::Cancelled => String::new(),
        };
        Self {
            kind: err.kind(),
            message,
        }
    }
}

impl From<ErrorBody> for BridgeError {
    fn from(body: ErrorBody) -> Self {
        BridgeError::from_kind(body.kind, body.message)
    }
}
