use crate::codec::types::Document;
use crate::error::{BridgeError, ErrorKind};

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Unique identifier for one batch submission.
///
/// Retries of the same batch reuse the id, which lets the cluster answer a
/// replayed request from its record of processed batches.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct BatchId(pub String);

impl BatchId {
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }
}

impl Default for BatchId {
    fn default() -> Self {
        Self::new()
    }
}

/// Ordered documents destined for a single submission call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Batch {
    pub id: BatchId,
    /// Compute partition that produced the batch.
    pub partition: usize,
    /// Position of the batch within its partition.
    pub index: usize,
    pub documents: Vec<Document>,
}

impl Batch {
    pub fn new(partition: usize, index: usize, documents: Vec<Document>) -> Self {
        Self {
            id: BatchId::new(),
            partition,
            index,
            documents,
        }
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    pub fn document_ids(&self) -> impl Iterator<Item = &str> {
        self.documents.iter().map(|doc| doc.id())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentFailure {
    pub document_id: String,
    pub kind: ErrorKind,
    pub cause: String,
}

/// Acknowledgement counts for one batch, one partition, or a whole run.
///
/// Invariant: `documents_accepted + failed_ids().len()` equals the number of
/// distinct documents the result accounts for.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AckResult {
    pub documents_accepted: usize,
    pub errors: Vec<DocumentFailure>,
}

impl AckResult {
    pub fn accepted(count: usize) -> Self {
        Self {
            documents_accepted: count,
            errors: Vec::new(),
        }
    }

    /// Every document of `batch` failed for the same reason.
    pub fn all_failed(batch: &Batch, err: &BridgeError) -> Self {
        let mut ack = Self::default();
        let cause = err.to_string();
        for id in batch.document_ids() {
            ack.record_failure(id, err.kind(), cause.clone());
        }
        ack
    }

    pub fn record_failure(&mut self, document_id: impl Into<String>, kind: ErrorKind, cause: impl Into<String>) {
        self.errors.push(DocumentFailure {
            document_id: document_id.into(),
            kind,
            cause: cause.into(),
        });
    }

    /// Normalizes a cluster acknowledgement against what was actually sent:
    /// failures for ids outside the batch are dropped and duplicates collapse.
    ///
    /// When the cluster accepted fewer documents than it explains with
    /// failures, there is no way to tell which ones made it, so every document
    /// without a reported failure is failed as unacknowledged.
    pub fn reconcile(batch: &Batch, cluster_ack: AckResult) -> Self {
        let submitted: HashSet<&str> = batch.document_ids().collect();
        let mut seen = HashSet::new();
        let mut errors: Vec<DocumentFailure> = cluster_ack
            .errors
            .into_iter()
            .filter(|failure| submitted.contains(failure.document_id.as_str()))
            .filter(|failure| seen.insert(failure.document_id.clone()))
            .collect();

        if cluster_ack.documents_accepted + errors.len() < submitted.len() {
            tracing::warn!(
                "Cluster acknowledged {} of {} documents in batch {} without per-document detail; failing the rest of the batch",
                cluster_ack.documents_accepted,
                submitted.len(),
                batch.id.0
            );
            for id in batch.document_ids() {
                if seen.insert(id.to_string()) {
                    errors.push(DocumentFailure {
                        document_id: id.to_string(),
                        kind: ErrorKind::NonRetryableRejection,
                        cause: "not acknowledged by the cluster".to_string(),
                    });
                }
            }
            return Self {
                documents_accepted: 0,
                errors,
            };
        }

        let documents_accepted = submitted.len() - errors.len();
        if documents_accepted != cluster_ack.documents_accepted {
            tracing::warn!(
                "Cluster acknowledged {} documents of batch {} but accounting gives {}",
                cluster_ack.documents_accepted,
                batch.id.0,
                documents_accepted
            );
        }

        Self {
            documents_accepted,
            errors,
        }
    }

    pub fn merge(&mut self, other: AckResult) {
        self.documents_accepted += other.documents_accepted;
        self.errors.extend(other.errors);
    }

    pub fn failed_ids(&self) -> HashSet<&str> {
        self.errors
            .iter()
            .map(|failure| failure.document_id.as_str())
            .collect()
    }

    pub fn failures_of(&self, kind: ErrorKind) -> impl Iterator<Item = &DocumentFailure> {
        self.errors.iter().filter(move |failure| failure.kind == kind)
    }

    pub fn total_accounted(&self) -> usize {
        self.documents_accepted + self.failed_ids().len()
    }

    pub fn is_clean(&self) -> bool {
        self.errors.is_empty()
    }
}

/// What one partition's indexing call produced.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexOutcome {
    pub ack: AckResult,
    pub batches: usize,
    pub commits: usize,
    pub commit_failures: usize,
    pub cancelled: bool,
}

impl IndexOutcome {
    pub fn merge(&mut self, other: IndexOutcome) {
        self.ack.merge(other.ack);
        self.batches += other.batches;
        self.commits += other.commits;
        self.commit_failures += other.commit_failures;
        self.cancelled |= other.cancelled;
    }
}
