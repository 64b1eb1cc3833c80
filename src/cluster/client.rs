use crate::error::Result;
use crate::indexer::types::{AckResult, Batch};
use crate::query::types::{PageRequest, QueryPage};
use crate::routing::router::RouteDecision;
use crate::routing::table::RoutingTable;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Read/write access to a collection on the search cluster.
///
/// `submit_batch` returns `Ok` with per-document failures when the cluster
/// reports them individually, and `Err` when the whole batch failed.
#[async_trait]
pub trait ClusterClient: Send + Sync {
    /// Current routing table snapshot for `collection`.
    async fn routing_table(&self, collection: &str) -> Result<RoutingTable>;

    async fn submit_batch(
        &self,
        collection: &str,
        batch: &Batch,
        route: &RouteDecision,
    ) -> Result<AckResult>;

    /// `hard` flushes durably; otherwise only visibility is guaranteed.
    async fn commit(&self, collection: &str, hard: bool) -> Result<()>;

    async fn query_page(&self, collection: &str, request: &PageRequest) -> Result<QueryPage>;

    async fn count_only(&self, collection: &str, expression: &str) -> Result<u64>;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectionSpec {
    pub name: String,
    pub shard_count: usize,
    pub replication_factor: usize,
    pub max_shards_per_node: usize,
    pub config_set_name: String,
    pub config_set_source: String,
}

impl CollectionSpec {
    /// The layout the verification harness provisions: one replica per shard and
    /// enough room per node for every shard.
    pub fn for_verification(name: &str, shard_count: usize) -> Self {
        Self {
            name: name.to_string(),
            shard_count,
            replication_factor: 1,
            max_shards_per_node: shard_count,
            config_set_name: "testConfig".to_string(),
            config_set_source: "conf".to_string(),
        }
    }
}

/// Collection provisioning. Treated as an opaque step before indexing.
#[async_trait]
pub trait ClusterAdmin: Send + Sync {
    async fn create_collection(&self, spec: &CollectionSpec) -> Result<()>;

    async fn delete_collection(&self, name: &str) -> Result<()>;
}
