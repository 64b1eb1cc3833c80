//! Batched Concurrent Submission
//!
//! One `BatchIndexer` serves one collection for the duration of a run and is
//! shared by every compute partition.
//!
//! ## Flow per partition
//! 1. **Encode**: records become documents; malformed ones are recorded and skipped.
//! 2. **Batch**: documents are grouped by owning shard (explicit routing only)
//!    and cut into batches of `batch_size`.
//! 3. **Route**: each batch gets a `RouteDecision` before submission.
//! 4. **Submit**: batches run concurrently, at most `max_concurrency` at a time,
//!    each with its own retry loop.
//! 5. **Absorb**: acknowledgements are reconciled as batches complete, and the
//!    commit policy is consulted after each one.

use super::types::{AckResult, Batch, IndexOutcome};
use crate::cluster::client::ClusterClient;
use crate::codec::codec::DocumentCodec;
use crate::codec::types::{Document, Record};
use crate::commit::policy::CommitPolicy;
use crate::config::IndexerConfig;
use crate::error::{BridgeError, ErrorKind, Result};
use crate::pipeline::cancel::CancellationSignal;
use crate::routing::router::{RouteDecision, RouteMode, ShardRouter};
use crate::routing::table::RoutingTable;

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Semaphore;
use tokio::task::{self, JoinSet};

pub struct BatchIndexer {
    client: Arc<dyn ClusterClient>,
    collection: String,
    codec: Arc<DocumentCodec>,
    router: ShardRouter,
    /// Snapshot taken when the run started; never refreshed mid-run.
    table: Arc<RoutingTable>,
    config: IndexerConfig,
    commit: CommitPolicy,
    cancel: CancellationSignal,
}

impl BatchIndexer {
    pub fn new(
        client: Arc<dyn ClusterClient>,
        collection: impl Into<String>,
        table: Arc<RoutingTable>,
        config: IndexerConfig,
    ) -> Self {
        Self {
            client,
            collection: collection.into(),
            codec: Arc::new(DocumentCodec::default()),
            router: ShardRouter::new(config.route_mode),
            table,
            config,
            commit: CommitPolicy::default(),
            cancel: CancellationSignal::default(),
        }
    }

    pub fn with_codec(mut self, codec: Arc<DocumentCodec>) -> Self {
        self.codec = codec;
        self
    }

    pub fn with_commit_policy(mut self, commit: CommitPolicy) -> Self {
        self.commit = commit;
        self
    }

    pub fn with_cancellation(mut self, cancel: CancellationSignal) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn collection(&self) -> &str {
        &self.collection
    }

    pub fn commit_policy(&self) -> CommitPolicy {
        self.commit
    }

    /// Encodes and indexes the records of one partition.
    ///
    /// Never fails as a whole: every record ends up either accepted or listed
    /// in `ack.errors` with its classification.
    pub async fn submit(&self, partition: usize, records: Vec<Record>) -> IndexOutcome {
        let mut outcome = IndexOutcome::default();
        let mut documents = Vec::with_capacity(records.len());

        for (position, record) in records.iter().enumerate() {
            match self.codec.encode(record) {
                Ok(doc) => documents.push(doc),
                Err(e) => {
                    tracing::warn!("Skipping record in partition {}: {}", partition, e);
                    let id = if e.record_id.is_empty() {
                        format!("<partition {} record {}>", partition, position)
                    } else {
                        e.record_id.clone()
                    };
                    outcome
                        .ack
                        .record_failure(id, ErrorKind::MalformedRecord, e.to_string());
                }
            }
        }

        outcome.merge(self.submit_documents(partition, documents).await);
        outcome
    }

    /// Indexes documents that are already encoded.
    pub async fn submit_documents(&self, partition: usize, documents: Vec<Document>) -> IndexOutcome {
        let mut outcome = IndexOutcome::default();
        if documents.is_empty() {
            return outcome;
        }

        let total = documents.len();
        let batches = self.plan_batches(partition, documents);
        outcome.batches = batches.len();

        let semaphore = Arc::new(Semaphore::new(self.config.max_concurrency.max(1)));
        let mut in_flight = InFlightBatches::default();

        for batch in batches {
            let route = match self.route(&batch) {
                Ok(route) => route,
                Err(e) => {
                    tracing::error!(
                        "Cannot route batch {} of partition {}: {}",
                        batch.id.0,
                        partition,
                        e
                    );
                    outcome.ack.merge(AckResult::all_failed(&batch, &e));
                    continue;
                }
            };

            let slots = semaphore.clone();
            let client = self.client.clone();
            let collection = self.collection.clone();
            let retry = self.config.retry.clone();
            let cancel = self.cancel.clone();

            in_flight.spawn(batch, move |batch| async move {
                let _permit = match slots.acquire_owned().await {
                    Ok(permit) => permit,
                    Err(_) => return Err(BridgeError::Cancelled),
                };
                if cancel.is_cancelled() {
                    return Err(BridgeError::Cancelled);
                }

                let label = format!("batch {} of partition {}", batch.id.0, batch.partition);
                let (client, collection, submitted, route) = (&client, &collection, &*batch, &route);
                retry
                    .run(&label, move |_| client.submit_batch(collection, submitted, route))
                    .await
            });
        }

        let mut completed = 0usize;
        let mut last_commit = Instant::now();

        while let Some((batch, result)) = in_flight.join_next().await {
            match result {
                Ok(ack) => outcome.ack.merge(AckResult::reconcile(&batch, ack)),
                Err(BridgeError::Cancelled) => {
                    outcome.cancelled = true;
                    outcome
                        .ack
                        .merge(AckResult::all_failed(&batch, &BridgeError::Cancelled));
                    continue;
                }
                Err(e) => {
                    tracing::error!(
                        "Batch {} of partition {} failed: {}",
                        batch.id.0,
                        partition,
                        e
                    );
                    outcome.ack.merge(AckResult::all_failed(&batch, &e));
                }
            }

            if self.commit.should_commit_now(completed, last_commit.elapsed()) {
                match self.client.commit(&self.collection, self.commit.hard()).await {
                    Ok(()) => outcome.commits += 1,
                    Err(e) => {
                        tracing::warn!("Commit on {} failed: {}", self.collection, e);
                        outcome.commit_failures += 1;
                    }
                }
                last_commit = Instant::now();
            }
            completed += 1;
        }

        tracing::info!(
            "Partition {} indexed into {}: {} of {} documents accepted, {} failures, {} batches",
            partition,
            self.collection,
            outcome.ack.documents_accepted,
            total,
            outcome.ack.errors.len(),
            outcome.batches
        );
        outcome
    }

    fn plan_batches(&self, partition: usize, documents: Vec<Document>) -> Vec<Batch> {
        let groups = match self.router.mode() {
            RouteMode::Explicit => match self.router.split_by_shard(documents.clone(), &self.table) {
                Ok(groups) => groups.into_iter().map(|(_, docs)| docs).collect(),
                Err(e) => {
                    tracing::warn!("Cannot group partition {} by shard: {}", partition, e);
                    vec![documents]
                }
            },
            RouteMode::ClusterRouted => vec![documents],
        };

        groups
            .into_iter()
            .flat_map(|group| chunk(group, self.config.batch_size.max(1)))
            .enumerate()
            .map(|(index, docs)| Batch::new(partition, index, docs))
            .collect()
    }

    fn route(&self, batch: &Batch) -> Result<RouteDecision> {
        self.router
            .route(&batch.documents, &self.table, batch.partition + batch.index)
    }
}

/// Spawned batch submissions, keyed by task so that a task which never
/// reports back still resolves to the batch it was carrying.
#[derive(Default)]
pub(crate) struct InFlightBatches {
    tasks: JoinSet<Result<AckResult>>,
    batches: HashMap<task::Id, Arc<Batch>>,
}

impl InFlightBatches {
    pub(crate) fn spawn<F, Fut>(&mut self, batch: Batch, submit: F)
    where
        F: FnOnce(Arc<Batch>) -> Fut,
        Fut: Future<Output = Result<AckResult>> + Send + 'static,
    {
        let batch = Arc::new(batch);
        let handle = self.tasks.spawn(submit(batch.clone()));
        self.batches.insert(handle.id(), batch);
    }

    /// Next finished batch. Panics in a task are propagated; a task aborted
    /// before finishing yields `Cancelled` for its batch.
    pub(crate) async fn join_next(&mut self) -> Option<(Arc<Batch>, Result<AckResult>)> {
        loop {
            let (id, result) = match self.tasks.join_next_with_id().await? {
                Ok((id, result)) => (id, result),
                Err(e) if e.is_panic() => std::panic::resume_unwind(e.into_panic()),
                Err(e) => {
                    tracing::error!("Batch task did not finish: {}", e);
                    (e.id(), Err(BridgeError::Cancelled))
                }
            };
            match self.batches.remove(&id) {
                Some(batch) => return Some((batch, result)),
                None => tracing::error!("Finished task {} carried no known batch", id),
            }
        }
    }

    #[cfg(test)]
    pub(crate) fn abort_all(&mut self) {
        self.tasks.abort_all();
    }
}

fn chunk(documents: Vec<Document>, size: usize) -> Vec<Vec<Document>> {
    let mut chunks = Vec::with_capacity(documents.len().div_ceil(size));
    let mut remaining = documents.into_iter().peekable();
    while remaining.peek().is_some() {
        chunks.push(remaining.by_ref().take(size).collect());
    }
    chunks
}
