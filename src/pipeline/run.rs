use super::cancel::CancellationSignal;
use crate::cluster::client::ClusterClient;
use crate::codec::codec::DocumentCodec;
use crate::codec::types::Record;
use crate::commit::policy::CommitPolicy;
use crate::config::BridgeConfig;
use crate::dataset::dataset::ParallelDataset;
use crate::error::{BridgeError, Result};
use crate::indexer::indexer::BatchIndexer;
use crate::indexer::types::{AckResult, IndexOutcome};

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;

/// Summary of one indexing run across all partitions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunReport {
    pub collection: String,
    pub ack: AckResult,
    /// Records handed to the run.
    pub total_submitted: usize,
    pub partitions: usize,
    pub batches: usize,
    pub commits: usize,
    pub commit_failures: usize,
    pub cancelled: bool,
    pub elapsed_ms: u64,
}

impl RunReport {
    pub fn documents_failed(&self) -> usize {
        self.ack.failed_ids().len()
    }

    /// Every record accepted and the run not cancelled.
    pub fn is_complete(&self) -> bool {
        !self.cancelled && self.ack.is_clean() && self.ack.documents_accepted == self.total_submitted
    }
}

pub struct IndexingPipeline {
    client: Arc<dyn ClusterClient>,
    codec: Arc<DocumentCodec>,
    config: BridgeConfig,
    cancel: CancellationSignal,
}

impl IndexingPipeline {
    pub fn new(client: Arc<dyn ClusterClient>, config: BridgeConfig) -> Self {
        Self {
            client,
            codec: Arc::new(DocumentCodec::default()),
            config,
            cancel: CancellationSignal::new(),
        }
    }

    pub fn with_codec(mut self, codec: Arc<DocumentCodec>) -> Self {
        self.codec = codec;
        self
    }

    pub fn with_cancellation(mut self, cancel: CancellationSignal) -> Self {
        self.cancel = cancel;
        self
    }

    /// Handle that stops the run from issuing further batches.
    pub fn cancellation(&self) -> CancellationSignal {
        self.cancel.clone()
    }

    pub fn config(&self) -> &BridgeConfig {
        &self.config
    }

    /// Indexes every record of `dataset`, one `BatchIndexer` call per partition.
    ///
    /// Only configuration problems fail the run; per-record and per-batch
    /// failures end up in the report.
    pub async fn run<D>(&self, dataset: D) -> Result<RunReport>
    where
        D: ParallelDataset<Record>,
    {
        self.config.validate()?;
        let started = Instant::now();
        let collection = self.config.collection.clone();

        let table = self.client.routing_table(&collection).await.map_err(|e| match e {
            BridgeError::Configuration(_) => e,
            other => BridgeError::Configuration(format!(
                "cannot load routing table of {}: {}",
                collection, other
            )),
        })?;

        let commit = CommitPolicy::from_config(&self.config.commit);
        let indexer = Arc::new(
            BatchIndexer::new(
                self.client.clone(),
                collection.as_str(),
                Arc::new(table),
                self.config.indexer.clone(),
            )
            .with_codec(self.codec.clone())
            .with_commit_policy(commit)
            .with_cancellation(self.cancel.clone()),
        );

        let partitions = dataset.num_partitions();
        let total_submitted = dataset.count();
        tracing::info!(
            "Indexing {} records into {} across {} partitions",
            total_submitted,
            collection,
            partitions
        );

        let outcomes = dataset
            .for_each_partition(move |partition, records| {
                let indexer = indexer.clone();
                async move { indexer.submit(partition, records).await }
            })
            .await;

        let mut outcome = IndexOutcome::default();
        for partition_outcome in outcomes {
            outcome.merge(partition_outcome);
        }

        if commit.commit_after_run() {
            match self.client.commit(&collection, commit.hard()).await {
                Ok(()) => outcome.commits += 1,
                Err(e) => {
                    tracing::warn!("Final commit on {} failed: {}", collection, e);
                    outcome.commit_failures += 1;
                }
            }
        }

        if outcome.ack.total_accounted() != total_submitted {
            tracing::warn!(
                "Accounted for {} of {} records in {}; identifiers may repeat across records",
                outcome.ack.total_accounted(),
                total_submitted,
                collection
            );
        }

        let report = RunReport {
            collection,
            ack: outcome.ack,
            total_submitted,
            partitions,
            batches: outcome.batches,
            commits: outcome.commits,
            commit_failures: outcome.commit_failures,
            cancelled: outcome.cancelled,
            elapsed_ms: started.elapsed().as_millis() as u64,
        };
        tracing::info!(
            "Run on {} finished in {}ms: {} accepted, {} failed, {} batches, {} commits{}",
            report.collection,
            report.elapsed_ms,
            report.ack.documents_accepted,
            report.documents_failed(),
            report.batches,
            report.commits,
            if report.cancelled { " (cancelled)" } else { "" }
        );
        Ok(report)
    }
}
