use super::hash::route_hash;
use super::table::{Replica, RoutingTable, ShardId, ShardInfo};
use crate::codec::types::Document;
use crate::error::{BridgeError, Result};

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RouteMode {
    /// The cluster hashes and forwards documents itself.
    #[default]
    ClusterRouted,
    /// The client targets the owning shard directly.
    Explicit,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplicaTarget {
    pub name: String,
    pub node: String,
}

impl From<&Replica> for ReplicaTarget {
    fn from(replica: &Replica) -> Self {
        Self {
            name: replica.name.clone(),
            node: replica.node.clone(),
        }
    }
}

/// Where one batch goes. Computed once per batch and never changed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteDecision {
    pub target_shard: Option<ShardId>,
    pub mode: RouteMode,
    pub replica: Option<ReplicaTarget>,
}

impl RouteDecision {
    pub fn cluster_routed(replica: Option<ReplicaTarget>) -> Self {
        Self {
            target_shard: None,
            mode: RouteMode::ClusterRouted,
            replica,
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ShardRouter {
    mode: RouteMode,
}

impl ShardRouter {
    pub fn new(mode: RouteMode) -> Self {
        Self { mode }
    }

    pub fn mode(&self) -> RouteMode {
        self.mode
    }

    pub fn shard_for_id<'a>(&self, id: &str, table: &'a RoutingTable) -> Result<&'a ShardInfo> {
        let hash = route_hash(id);
        table.shard_for_hash(hash).ok_or_else(|| {
            BridgeError::Configuration(format!(
                "hash {} of '{}' is not covered by the routing table of '{}'",
                hash, id, table.collection
            ))
        })
    }

    /// Groups documents by owning shard, keeping input order inside each group.
    /// Groups appear in the order their first document was seen.
    pub fn split_by_shard(
        &self,
        documents: Vec<Document>,
        table: &RoutingTable,
    ) -> Result<Vec<(ShardId, Vec<Document>)>> {
        let mut groups: Vec<(ShardId, Vec<Document>)> = Vec::new();
        for doc in documents {
            let shard = self.shard_for_id(doc.id(), table)?;
            match groups.iter_mut().find(|(name, _)| name == &shard.name) {
                Some((_, docs)) => docs.push(doc),
                None => groups.push((shard.name.clone(), vec![doc])),
            }
        }
        Ok(groups)
    }

    /// Picks the destination for `batch`.
    ///
    /// `hint` spreads cluster-routed batches across live replicas.
    pub fn route(&self, batch: &[Document], table: &RoutingTable, hint: usize) -> Result<RouteDecision> {
        if self.mode == RouteMode::Explicit {
            if let Some(shard) = self.single_shard(batch, table)? {
                let replica = shard.preferred_replica().ok_or_else(|| BridgeError::NoLiveShard {
                    collection: table.collection.clone(),
                    shard: shard.name.0.clone(),
                })?;
                return Ok(RouteDecision {
                    target_shard: Some(shard.name.clone()),
                    mode: RouteMode::Explicit,
                    replica: Some(replica.into()),
                });
            }
            tracing::debug!(
                "Batch of {} spans several shards of {}, letting the cluster route it",
                batch.len(),
                table.collection
            );
        }

        let live = table.live_replicas();
        if live.is_empty() {
            return Err(BridgeError::NoLiveShard {
                collection: table.collection.clone(),
                shard: "*".to_string(),
            });
        }
        let replica = live[hint % live.len()];
        Ok(RouteDecision::cluster_routed(Some(replica.into())))
    }

    fn single_shard<'a>(
        &self,
        batch: &[Document],
        table: &'a RoutingTable,
    ) -> Result<Option<&'a ShardInfo>> {
        let mut target: Option<&ShardInfo> = None;
        for doc in batch {
            let shard = self.shard_for_id(doc.id(), table)?;
            match target {
                None => target = Some(shard),
                Some(existing) if existing.name == shard.name => {}
                Some(_) => return Ok(None),
            }
        }
        Ok(target)
    }
}
