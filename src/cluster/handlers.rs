use super::client::{ClusterAdmin, ClusterClient};
use super::memory::InMemoryCluster;
use super::protocol::*;
use crate::error::BridgeError;
use crate::indexer::types::AckResult;
use crate::query::types::{PageRequest, QueryPage};
use crate::routing::table::RoutingTable;

use axum::response::{IntoResponse, Response};
use axum::routing::{delete, get, post};
use axum::{Extension, Json, Router, extract::Path, http::StatusCode};
use std::sync::Arc;

/// Builds the HTTP surface of a cluster node.
pub fn router(cluster: Arc<InMemoryCluster>) -> Router {
    Router::new()
        .route(ENDPOINT_COLLECTIONS, post(handle_create_collection))
        .route(ENDPOINT_COLLECTION, delete(handle_delete_collection))
        .route(ENDPOINT_ROUTING, get(handle_routing_table))
        .route(ENDPOINT_UPDATE, post(handle_update))
        .route(ENDPOINT_COMMIT, post(handle_commit))
        .route(ENDPOINT_SELECT, post(handle_select))
        .route(ENDPOINT_COUNT, post(handle_count))
        .layer(Extension(cluster))
}

pub struct ApiError(pub BridgeError);

impl From<BridgeError> for ApiError {
    fn from(err: BridgeError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            BridgeError::RetryableTransport(_) | BridgeError::NoLiveShard { .. } => {
                StatusCode::SERVICE_UNAVAILABLE
            }
            BridgeError::Cancelled => StatusCode::CONFLICT,
            BridgeError::MalformedRecord(_)
            | BridgeError::NonRetryableRejection(_)
            | BridgeError::QueryExecution(_)
            | BridgeError::Configuration(_) => StatusCode::BAD_REQUEST,
        };
        if status == StatusCode::SERVICE_UNAVAILABLE {
            tracing::warn!("Request failed: {}", self.0);
        } else {
            tracing::debug!("Request rejected: {}", self.0);
        }
        (status, Json(ErrorBody::from(&self.0))).into_response()
    }
}

pub async fn handle_create_collection(
    Extension(cluster): Extension<Arc<InMemoryCluster>>,
    Json(req): Json<CreateCollectionRequest>,
) -> Result<Json<AdminResponse>, ApiError> {
    cluster.create_collection(&req.spec).await?;
    Ok(Json(AdminResponse { success: true }))
}

pub async fn handle_delete_collection(
    Extension(cluster): Extension<Arc<InMemoryCluster>>,
    Path(collection): Path<String>,
) -> Result<Json<AdminResponse>, ApiError> {
    cluster.delete_collection(&collection).await?;
    Ok(Json(AdminResponse { success: true }))
}

pub async fn handle_routing_table(
    Extension(cluster): Extension<Arc<InMemoryCluster>>,
    Path(collection): Path<String>,
) -> Result<Json<RoutingTable>, ApiError> {
    Ok(Json(cluster.routing_table(&collection).await?))
}

pub async fn handle_update(
    Extension(cluster): Extension<Arc<InMemoryCluster>>,
    Path(collection): Path<String>,
    Json(req): Json<SubmitBatchRequest>,
) -> Result<Json<AckResult>, ApiError> {
    tracing::debug!(
        "Received batch {} ({} documents) for {}",
        req.batch.id.0,
        req.batch.len(),
        collection
    );
    let ack = cluster.submit_batch(&collection, &req.batch, &req.route).await?;
    Ok(Json(ack))
}

pub async fn handle_commit(
    Extension(cluster): Extension<Arc<InMemoryCluster>>,
    Path(collection): Path<String>,
    Json(req): Json<CommitRequest>,
) -> Result<Json<CommitResponse>, ApiError> {
    cluster.commit(&collection, req.hard).await?;
    Ok(Json(CommitResponse {
        success: true,
        hard: req.hard,
    }))
}

pub async fn handle_select(
    Extension(cluster): Extension<Arc<InMemoryCluster>>,
    Path(collection): Path<String>,
    Json(req): Json<PageRequest>,
) -> Result<Json<QueryPage>, ApiError> {
    Ok(Json(cluster.query_page(&collection, &req).await?))
}

pub async fn handle_count(
    Extension(cluster): Extension<Arc<InMemoryCluster>>,
    Path(collection): Path<String>,
    Json(req): Json<CountRequest>,
) -> Result<Json<CountResponse>, ApiError> {
    let count = cluster.count_only(&collection, &req.expression).await?;
    Ok(Json(CountResponse { count }))
}
