use super::client::{ClusterAdmin, ClusterClient, CollectionSpec};
use crate::codec::types::{Document, FieldType, FieldValue, dynamic_field_type};
use crate::error::{BridgeError, ErrorKind, Result};
use crate::indexer::types::{AckResult, Batch, BatchId};
use crate::query::expr::QueryExpr;
use crate::query::types::{PageRequest, QueryCursor, QueryPage};
use crate::routing::hash::route_hash;
use crate::routing::router::{RouteDecision, RouteMode};
use crate::routing::table::{ReplicaState, RoutingTable, ShardId};

use async_trait::async_trait;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering as CmpOrdering;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::time::{Duration, Instant};
use tokio::sync::RwLock;

const PROCESSED_BATCH_LIMIT: usize = 10_000;
/// Upper bounds on a single collection's layout.
pub const MAX_SHARDS: usize = 4096;
pub const MAX_REPLICAS: usize = 65_536;

struct PendingWrite {
    document: Document,
    written_at: Instant,
}

#[derive(Default)]
struct ShardStore {
    visible: DashMap<String, Document>,
    pending: DashMap<String, PendingWrite>,
}

impl ShardStore {
    fn write(&self, document: Document) {
        self.pending.insert(
            document.id().to_string(),
            PendingWrite {
                document,
                written_at: Instant::now(),
            },
        );
    }

    /// Moves pending writes at least `min_age` old into the visible set.
    fn promote(&self, min_age: Option<Duration>) -> usize {
        let due: Vec<String> = self
            .pending
            .iter()
            .filter(|entry| min_age.is_none_or(|age| entry.value().written_at.elapsed() >= age))
            .map(|entry| entry.key().clone())
            .collect();

        let mut promoted = 0;
        for id in due {
            let removed = self.pending.remove_if(&id, |_, write| {
                min_age.is_none_or(|age| write.written_at.elapsed() >= age)
            });
            if let Some((id, write)) = removed {
                self.visible.insert(id, write.document);
                promoted += 1;
            }
        }
        promoted
    }
}

struct CollectionState {
    spec: CollectionSpec,
    table: RwLock<RoutingTable>,
    shards: DashMap<ShardId, ShardStore>,
}

#[derive(Default)]
struct Faults {
    transient_failures: AtomicUsize,
    reject_batches: AtomicBool,
    rejected_ids: DashMap<String, ()>,
    submit_latency_ms: AtomicU64,
}

#[derive(Default)]
struct Counters {
    submit_calls: AtomicUsize,
    in_flight: AtomicUsize,
    peak_in_flight: AtomicUsize,
    soft_commits: AtomicUsize,
    hard_commits: AtomicUsize,
}

struct InFlight<'a>(&'a AtomicUsize);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterStats {
    pub submit_calls: usize,
    pub peak_in_flight: usize,
    pub soft_commits: usize,
    pub hard_commits: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectionStats {
    pub shards: usize,
    pub visible: usize,
    pub pending: usize,
}

/// Reference search cluster kept entirely in memory.
///
/// Documents are stored per shard and overwritten by id. A write stays pending
/// until a commit, or until it is older than the soft-commit interval when one
/// is configured; queries and counts only see visible documents.
pub struct InMemoryCluster {
    nodes: Vec<String>,
    soft_commit: Option<Duration>,
    collections: DashMap<String, Arc<CollectionState>>,
    processed_batches: DashMap<BatchId, AckResult>,
    faults: Faults,
    counters: Counters,
}

impl InMemoryCluster {
    pub fn new(node_count: usize) -> Self {
        Self::with_nodes(
            (0..node_count.max(1))
                .map(|i| format!("node-{}", i + 1))
                .collect(),
        )
    }

    pub fn with_nodes(nodes: Vec<String>) -> Self {
        Self {
            nodes,
            soft_commit: None,
            collections: DashMap::new(),
            processed_batches: DashMap::new(),
            faults: Faults::default(),
            counters: Counters::default(),
        }
    }

    /// Writes become visible on their own once they are `interval` old.
    pub fn with_soft_commit(mut self, interval: Duration) -> Self {
        self.soft_commit = Some(interval);
        self
    }

    pub fn nodes(&self) -> &[String] {
        &self.nodes
    }

    // --- Fault injection ---

    /// The next `count` submissions fail with a transient transport error.
    pub fn fail_next_submissions(&self, count: usize) {
        self.faults.transient_failures.store(count, Ordering::SeqCst);
    }

    /// Submissions containing `id` get a per-document rejection for it.
    pub fn reject_document(&self, id: &str) {
        self.faults.rejected_ids.insert(id.to_string(), ());
    }

    /// While set, every submission is rejected as a whole.
    pub fn reject_batches(&self, reject: bool) {
        self.faults.reject_batches.store(reject, Ordering::SeqCst);
    }

    pub fn set_submit_latency(&self, latency: Duration) {
        self.faults
            .submit_latency_ms
            .store(latency.as_millis() as u64, Ordering::SeqCst);
    }

    pub async fn set_replica_state(
        &self,
        collection: &str,
        shard: &ShardId,
        state: ReplicaState,
    ) -> Result<()> {
        let collection_state = self.collection(collection)?;
        let mut table = collection_state.table.write().await;
        let target = table
            .shards
            .iter_mut()
            .find(|info| &info.name == shard)
            .ok_or_else(|| {
                BridgeError::Configuration(format!("unknown shard {} of {}", shard, collection))
            })?;
        for replica in target.replicas.iter_mut() {
            replica.state = state;
        }
        table.version += 1;
        tracing::info!("Replicas of {}/{} set to {:?}", collection, shard, state);
        Ok(())
    }

    // --- Introspection ---

    pub fn stats(&self) -> ClusterStats {
        ClusterStats {
            submit_calls: self.counters.submit_calls.load(Ordering::SeqCst),
            peak_in_flight: self.counters.peak_in_flight.load(Ordering::SeqCst),
            soft_commits: self.counters.soft_commits.load(Ordering::SeqCst),
            hard_commits: self.counters.hard_commits.load(Ordering::SeqCst),
        }
    }

    pub fn collection_stats(&self, collection: &str) -> Option<CollectionStats> {
        let state = self.collections.get(collection)?;
        Some(CollectionStats {
            shards: state.spec.shard_count,
            visible: state.shards.iter().map(|shard| shard.visible.len()).sum(),
            pending: state.shards.iter().map(|shard| shard.pending.len()).sum(),
        })
    }

    fn collection(&self, name: &str) -> Result<Arc<CollectionState>> {
        self.collections
            .get(name)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| BridgeError::Configuration(format!("collection '{}' does not exist", name)))
    }

    fn promote_due(&self, state: &CollectionState) {
        if let Some(interval) = self.soft_commit {
            let promoted: usize = state
                .shards
                .iter()
                .map(|shard| shard.promote(Some(interval)))
                .sum();
            if promoted > 0 {
                tracing::trace!("Soft commit made {} documents visible", promoted);
            }
        }
    }

    fn take_transient_failure(&self) -> bool {
        self.faults
            .transient_failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }

    fn remember_batch(&self, id: BatchId, ack: AckResult) {
        if self.processed_batches.len() > PROCESSED_BATCH_LIMIT {
            self.processed_batches.clear();
        }
        self.processed_batches.insert(id, ack);
    }

    fn check_route(&self, table: &RoutingTable, route: &RouteDecision) -> Result<()> {
        if let Some(target) = &route.replica {
            let replica = table
                .shards
                .iter()
                .flat_map(|shard| shard.replicas.iter())
                .find(|replica| replica.name == target.name);
            match replica {
                Some(replica) if replica.is_live() => {}
                Some(_) => {
                    return Err(BridgeError::RetryableTransport(format!(
                        "replica {} is not accepting updates",
                        target.name
                    )));
                }
                None => {
                    return Err(BridgeError::NonRetryableRejection(format!(
                        "unknown replica {}",
                        target.name
                    )));
                }
            }
        }

        if route.mode == RouteMode::Explicit {
            let target = route.target_shard.as_ref().ok_or_else(|| {
                BridgeError::NonRetryableRejection("explicit route without a target shard".into())
            })?;
            let shard = table.shard(target).ok_or_else(|| {
                BridgeError::NonRetryableRejection(format!("unknown shard {}", target))
            })?;
            if shard.preferred_replica().is_none() {
                return Err(BridgeError::NoLiveShard {
                    collection: table.collection.clone(),
                    shard: target.0.clone(),
                });
            }
        }
        Ok(())
    }
}

/// Checks values against the types implied by dynamic-field suffixes.
fn validate_field_types(doc: &Document) -> std::result::Result<(), String> {
    for field in doc.fields() {
        if field.name == doc.id_field() {
            continue;
        }
        let Some(expected) = dynamic_field_type(&field.name) else {
            continue;
        };
        let compatible = matches!(
            (expected, &field.value),
            (FieldType::Text, FieldValue::Text(_))
                | (FieldType::Integer, FieldValue::Integer(_))
                | (FieldType::TextList, FieldValue::TextList(_) | FieldValue::Text(_))
                | (FieldType::IntegerList, FieldValue::IntegerList(_) | FieldValue::Integer(_))
        );
        if !compatible {
            return Err(format!(
                "field '{}' does not match its {:?} schema type",
                field.name, expected
            ));
        }
    }
    Ok(())
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
enum SortKey {
    Missing,
    Integer(i64),
    Text(String),
}

impl SortKey {
    fn of(doc: &Document, field: &str) -> Self {
        match doc.get(field) {
            Some(FieldValue::Integer(v)) => SortKey::Integer(*v),
            Some(FieldValue::Text(s)) => SortKey::Text(s.clone()),
            _ => SortKey::Missing,
        }
    }
}

impl fmt::Display for SortKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SortKey::Missing => Ok(()),
            SortKey::Integer(v) => write!(f, "{}", v),
            SortKey::Text(s) => f.write_str(s),
        }
    }
}

fn position_order(
    (key, id): (&SortKey, &str),
    (other_key, other_id): (&SortKey, &str),
    descending: bool,
) -> CmpOrdering {
    let order = key.cmp(other_key).then_with(|| id.cmp(other_id));
    if descending { order.reverse() } else { order }
}

fn encode_cursor(key: &SortKey, id: &str) -> Result<String> {
    serde_json::to_string(&(key, id))
        .map_err(|e| BridgeError::QueryExecution(format!("cannot encode cursor: {}", e)))
}

fn decode_cursor(token: &str) -> Result<(SortKey, String)> {
    serde_json::from_str(token)
        .map_err(|_| BridgeError::QueryExecution(format!("invalid cursor '{}'", token)))
}

#[async_trait]
impl ClusterClient for InMemoryCluster {
    async fn routing_table(&self, collection: &str) -> Result<RoutingTable> {
        let state = self.collection(collection)?;
        let table = state.table.read().await.clone();
        Ok(table)
    }

    async fn submit_batch(
        &self,
        collection: &str,
        batch: &Batch,
        route: &RouteDecision,
    ) -> Result<AckResult> {
        self.counters.submit_calls.fetch_add(1, Ordering::SeqCst);
        let current = self.counters.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.counters
            .peak_in_flight
            .fetch_max(current, Ordering::SeqCst);
        let _in_flight = InFlight(&self.counters.in_flight);

        let latency = self.faults.submit_latency_ms.load(Ordering::SeqCst);
        if latency > 0 {
            tokio::time::sleep(Duration::from_millis(latency)).await;
        }

        let state = self.collection(collection)?;

        if let Some(ack) = self.processed_batches.get(&batch.id) {
            tracing::debug!("Batch {} already processed, replaying its acknowledgement", batch.id.0);
            return Ok(ack.clone());
        }
        if self.take_transient_failure() {
            return Err(BridgeError::RetryableTransport(format!(
                "node unavailable while handling batch {}",
                batch.id.0
            )));
        }
        if self.faults.reject_batches.load(Ordering::SeqCst) {
            return Err(BridgeError::NonRetryableRejection(format!(
                "batch {} rejected by the update chain",
                batch.id.0
            )));
        }

        let table = state.table.read().await.clone();
        self.check_route(&table, route)?;

        let mut ack = AckResult::default();
        let mut accepted: Vec<(ShardId, Document)> = Vec::with_capacity(batch.len());
        for doc in &batch.documents {
            let Some(owner) = table.shard_for_hash(route_hash(doc.id())) else {
                ack.record_failure(doc.id(), ErrorKind::NonRetryableRejection, "no shard owns this id");
                continue;
            };
            if route.mode == RouteMode::Explicit && route.target_shard.as_ref() != Some(&owner.name) {
                ack.record_failure(
                    doc.id(),
                    ErrorKind::NonRetryableRejection,
                    format!("document belongs to {} but was sent to another shard", owner.name),
                );
                continue;
            }
            if owner.preferred_replica().is_none() {
                return Err(BridgeError::NoLiveShard {
                    collection: collection.to_string(),
                    shard: owner.name.0.clone(),
                });
            }
            if self.faults.rejected_ids.contains_key(doc.id()) {
                ack.record_failure(
                    doc.id(),
                    ErrorKind::NonRetryableRejection,
                    "document rejected by the update processor",
                );
                continue;
            }
            if let Err(reason) = validate_field_types(doc) {
                ack.record_failure(doc.id(), ErrorKind::NonRetryableRejection, reason);
                continue;
            }
            accepted.push((owner.name.clone(), doc.clone()));
        }

        for (shard, doc) in accepted {
            state.shards.entry(shard).or_default().write(doc);
            ack.documents_accepted += 1;
        }

        tracing::debug!(
            "Batch {} on {}: {} accepted, {} rejected",
            batch.id.0,
            collection,
            ack.documents_accepted,
            ack.errors.len()
        );
        self.remember_batch(batch.id.clone(), ack.clone());
        Ok(ack)
    }

    async fn commit(&self, collection: &str, hard: bool) -> Result<()> {
        let state = self.collection(collection)?;
        let promoted: usize = state.shards.iter().map(|shard| shard.promote(None)).sum();
        if hard {
            self.counters.hard_commits.fetch_add(1, Ordering::SeqCst);
        } else {
            self.counters.soft_commits.fetch_add(1, Ordering::SeqCst);
        }
        tracing::info!(
            "{} commit on {}: {} documents made visible",
            if hard { "Hard" } else { "Soft" },
            collection,
            promoted
        );
        Ok(())
    }

    async fn query_page(&self, collection: &str, request: &PageRequest) -> Result<QueryPage> {
        let expr = QueryExpr::parse(&request.expression)?;
        if request.page_size == 0 {
            return Err(BridgeError::QueryExecution("page size must be positive".into()));
        }
        let state = self.collection(collection)?;
        if let Some(shard) = &request.shard
            && state.table.read().await.shard(shard).is_none()
        {
            return Err(BridgeError::QueryExecution(format!(
                "unknown shard {} of {}",
                shard, collection
            )));
        }
        self.promote_due(&state);

        let descending = request.sort.descending;
        let mut hits: Vec<(SortKey, Document)> = state
            .shards
            .iter()
            .filter(|entry| request.shard.as_ref().is_none_or(|shard| entry.key() == shard))
            .flat_map(|entry| {
                entry
                    .value()
                    .visible
                    .iter()
                    .filter(|doc| expr.matches(doc.value()))
                    .map(|doc| doc.value().clone())
                    .collect::<Vec<_>>()
            })
            .map(|doc| (SortKey::of(&doc, &request.sort.field), doc))
            .collect();
        hits.sort_by(|a, b| position_order((&a.0, a.1.id()), (&b.0, b.1.id()), descending));

        let after = if request.cursor.is_start() {
            None
        } else {
            Some(decode_cursor(&request.cursor.token)?)
        };
        let mut remaining = hits.into_iter().filter(|(key, doc)| {
            after.as_ref().is_none_or(|(after_key, after_id)| {
                position_order((key, doc.id()), (after_key, after_id.as_str()), descending)
                    == CmpOrdering::Greater
            })
        });

        let page: Vec<(SortKey, Document)> = remaining.by_ref().take(request.page_size).collect();
        let has_more = remaining.next().is_some();

        let next_cursor = match page.last() {
            Some((key, doc)) if has_more => Some(QueryCursor {
                token: encode_cursor(key, doc.id())?,
                last_sort_key: Some(key.to_string()),
            }),
            _ => None,
        };

        Ok(QueryPage {
            documents: page.into_iter().map(|(_, doc)| doc).collect(),
            next_cursor,
        })
    }

    async fn count_only(&self, collection: &str, expression: &str) -> Result<u64> {
        let expr = QueryExpr::parse(expression)?;
        let state = self.collection(collection)?;
        self.promote_due(&state);

        let count: usize = state
            .shards
            .iter()
            .map(|shard| {
                shard
                    .visible
                    .iter()
                    .filter(|doc| expr.matches(doc.value()))
                    .count()
            })
            .sum();
        Ok(count as u64)
    }
}

#[async_trait]
impl ClusterAdmin for InMemoryCluster {
    async fn create_collection(&self, spec: &CollectionSpec) -> Result<()> {
        if spec.name.trim().is_empty() {
            return Err(BridgeError::Configuration("collection name is empty".into()));
        }
        if spec.shard_count == 0 || spec.replication_factor == 0 || spec.max_shards_per_node == 0 {
            return Err(BridgeError::Configuration(format!(
                "collection {}: shard count, replication factor and maxShardsPerNode must be positive",
                spec.name
            )));
        }

        if spec.shard_count > MAX_SHARDS {
            return Err(BridgeError::Configuration(format!(
                "collection {}: {} shards requested, at most {} are supported",
                spec.name, spec.shard_count, MAX_SHARDS
            )));
        }
        let requested = spec
            .shard_count
            .checked_mul(spec.replication_factor)
            .filter(|&replicas| replicas <= MAX_REPLICAS)
            .ok_or_else(|| {
                BridgeError::Configuration(format!(
                    "collection {}: {} shards x {} replicas exceeds the limit of {} replicas",
                    spec.name, spec.shard_count, spec.replication_factor, MAX_REPLICAS
                ))
            })?;
        let capacity = self
            .nodes
            .len()
            .saturating_mul(spec.max_shards_per_node);
        if requested > capacity {
            return Err(BridgeError::Configuration(format!(
                "cannot create collection {}: {} replicas requested but {} nodes allow at most {} with maxShardsPerNode={}",
                spec.name,
                requested,
                self.nodes.len(),
                capacity,
                spec.max_shards_per_node
            )));
        }

        match self.collections.entry(spec.name.clone()) {
            Entry::Occupied(_) => Err(BridgeError::Configuration(format!(
                "collection '{}' already exists",
                spec.name
            ))),
            Entry::Vacant(vacant) => {
                let table = RoutingTable::with_even_ranges(
                    &spec.name,
                    spec.shard_count,
                    spec.replication_factor,
                    &self.nodes,
                );
                let shards = DashMap::new();
                for shard in &table.shards {
                    shards.insert(shard.name.clone(), ShardStore::default());
                }
                vacant.insert(Arc::new(CollectionState {
                    spec: spec.clone(),
                    table: RwLock::new(table),
                    shards,
                }));
                tracing::info!(
                    "Created collection {} ({} shards x {} replicas, config set {})",
                    spec.name,
                    spec.shard_count,
                    spec.replication_factor,
                    spec.config_set_name
                );
                Ok(())
            }
        }
    }

    async fn delete_collection(&self, name: &str) -> Result<()> {
        match self.collections.remove(name) {
            Some(_) => {
                tracing::info!("Deleted collection {}", name);
                Ok(())
            }
            None => Err(BridgeError::Configuration(format!(
                "collection '{}' does not exist",
                name
            ))),
        }
    }
}
