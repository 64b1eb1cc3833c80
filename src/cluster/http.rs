use super::client::{ClusterAdmin, ClusterClient, CollectionSpec};
use super::protocol::*;
use crate::error::{BridgeError, Result};
use crate::indexer::types::{AckResult, Batch};
use crate::query::types::{PageRequest, QueryPage};
use crate::routing::router::RouteDecision;
use crate::routing::table::RoutingTable;

use async_trait::async_trait;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::time::Duration;

/// Talks to a cluster node over JSON/HTTP.
///
/// Every call is a single attempt; retrying is left to the caller's
/// `RetryPolicy` so that attempts are counted in one place.
pub struct HttpClusterClient {
    base_url: String,
    http_client: reqwest::Client,
    timeout: Duration,
}

impl HttpClusterClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            http_client: reqwest::Client::new(),
            timeout: Duration::from_secs(10),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn post_json<T: Serialize, R: DeserializeOwned>(&self, path: String, payload: &T) -> Result<R> {
        let response = self
            .http_client
            .post(self.url(&path))
            .json(payload)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| BridgeError::RetryableTransport(format!("POST {} failed: {}", path, e)))?;
        Self::decode(path, response).await
    }

    async fn get_json<R: DeserializeOwned>(&self, path: String) -> Result<R> {
        let response = self
            .http_client
            .get(self.url(&path))
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| BridgeError::RetryableTransport(format!("GET {} failed: {}", path, e)))?;
        Self::decode(path, response).await
    }

    async fn decode<R: DeserializeOwned>(path: String, response: reqwest::Response) -> Result<R> {
        let status = response.status();
        if status.is_success() {
            return response.json::<R>().await.map_err(|e| {
                BridgeError::RetryableTransport(format!("unreadable response from {}: {}", path, e))
            });
        }

        match response.json::<ErrorBody>().await {
            Ok(body) => Err(body.into()),
            Err(_) if status.is_server_error() => Err(BridgeError::RetryableTransport(format!(
                "{} answered {}",
                path, status
            ))),
            Err(_) => Err(BridgeError::NonRetryableRejection(format!(
                "{} answered {}",
                path, status
            ))),
        }
    }
}

/// Error bodies do not carry the collection name; put it back.
fn with_collection(err: BridgeError, collection: &str) -> BridgeError {
    match err {
        BridgeError::NoLiveShard { collection: c, shard } if c.is_empty() => BridgeError::NoLiveShard {
            collection: collection.to_string(),
            shard,
        },
        other => other,
    }
}

#[async_trait]
impl ClusterClient for HttpClusterClient {
    async fn routing_table(&self, collection: &str) -> Result<RoutingTable> {
        self.get_json(collection_path(ENDPOINT_ROUTING, collection))
            .await
            .map_err(|e| with_collection(e, collection))
    }

    async fn submit_batch(
        &self,
        collection: &str,
        batch: &Batch,
        route: &RouteDecision,
    ) -> Result<AckResult> {
        let payload = SubmitBatchRequest {
            batch: batch.clone(),
            route: route.clone(),
        };
        self.post_json(collection_path(ENDPOINT_UPDATE, collection), &payload)
            .await
            .map_err(|e| with_collection(e, collection))
    }

    async fn commit(&self, collection: &str, hard: bool) -> Result<()> {
        let response: CommitResponse = self
            .post_json(collection_path(ENDPOINT_COMMIT, collection), &CommitRequest { hard })
            .await?;
        if !response.success {
            return Err(BridgeError::NonRetryableRejection(format!(
                "commit on {} was not applied",
                collection
            )));
        }
        Ok(())
    }

    async fn query_page(&self, collection: &str, request: &PageRequest) -> Result<QueryPage> {
        self.post_json(collection_path(ENDPOINT_SELECT, collection), request)
            .await
    }

    async fn count_only(&self, collection: &str, expression: &str) -> Result<u64> {
        let response: CountResponse = self
            .post_json(
                collection_path(ENDPOINT_COUNT, collection),
                &CountRequest {
                    expression: expression.to_string(),
                },
            )
            .await?;
        Ok(response.count)
    }
}

#[async_trait]
impl ClusterAdmin for HttpClusterClient {
    async fn create_collection(&self, spec: &CollectionSpec) -> Result<()> {
        let _: AdminResponse = self
            .post_json(
                ENDPOINT_COLLECTIONS.to_string(),
                &CreateCollectionRequest { spec: spec.clone() },
            )
            .await?;
        Ok(())
    }

    async fn delete_collection(&self, name: &str) -> Result<()> {
        let path = collection_path(ENDPOINT_COLLECTION, name);
        let response = self
            .http_client
            .delete(self.url(&path))
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| BridgeError::RetryableTransport(format!("DELETE {} failed: {}", path, e)))?;
        let _: AdminResponse = Self::decode(path, response).await?;
        Ok(())
    }
}
