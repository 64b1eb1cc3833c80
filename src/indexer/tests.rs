//! Batch Indexer Tests
//!
//! ## Test Scopes
//! - **Accounting**: accepted plus failed always covers every record.
//! - **Retries**: transient failures retried, exhaustion reported per document.
//! - **Concurrency**: in-flight submissions never exceed the configured bound.
//! - **Routing & commits**: explicit shard batching, periodic commits, cancellation.

#[cfg(test)]
mod tests {
    use crate::cluster::client::{ClusterAdmin, ClusterClient, CollectionSpec};
    use crate::cluster::memory::InMemoryCluster;
    use crate::codec::codec::DocumentCodec;
    use crate::codec::fixture::FixtureLineParser;
    use crate::codec::types::{Document, FieldValue, Record};
    use crate::commit::policy::CommitPolicy;
    use crate::config::IndexerConfig;
    use crate::error::{BridgeError, ErrorKind, Result};
    use crate::indexer::indexer::{BatchIndexer, InFlightBatches};
    use crate::indexer::retry::RetryPolicy;
    use crate::indexer::types::{AckResult, Batch};
    use crate::pipeline::cancel::CancellationSignal;
    use crate::query::types::{PageRequest, QueryPage};
    use crate::routing::router::{RouteDecision, RouteMode};
    use crate::routing::table::{ReplicaState, RoutingTable};

    use async_trait::async_trait;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    async fn setup(shards: usize) -> Arc<InMemoryCluster> {
        let cluster = Arc::new(InMemoryCluster::new(2));
        cluster
            .create_collection(&CollectionSpec::for_verification("c1", shards))
            .await
            .unwrap();
        cluster
    }

    fn config(batch_size: usize, max_concurrency: usize) -> IndexerConfig {
        IndexerConfig {
            batch_size,
            max_concurrency,
            route_mode: RouteMode::ClusterRouted,
            retry: RetryPolicy::immediate(3),
        }
    }

    async fn indexer(cluster: &Arc<InMemoryCluster>, config: IndexerConfig) -> BatchIndexer {
        let table = Arc::new(cluster.routing_table("c1").await.unwrap());
        let parser = FixtureLineParser::default();
        BatchIndexer::new(cluster.clone(), "c1", table, config)
            .with_codec(Arc::new(DocumentCodec::new(parser.schema())))
    }

    fn records(lines: &[&str]) -> Vec<Record> {
        let parser = FixtureLineParser::default();
        lines.iter().map(|line| parser.parse(line)).collect()
    }

    fn generated(count: usize) -> Vec<Record> {
        let parser = FixtureLineParser::default();
        (1..=count)
            .map(|n| parser.parse(&format!("c1-{},foo {},bar {},{}", n, n, n, n)))
            .collect()
    }

    /// Acknowledges at most `accept` documents per batch and never says which.
    struct ShortAck {
        accept: usize,
    }

    #[async_trait]
    impl ClusterClient for ShortAck {
        async fn routing_table(&self, collection: &str) -> Result<RoutingTable> {
            Ok(RoutingTable::with_even_ranges(collection, 1, 1, &["node-0".to_string()]))
        }

        async fn submit_batch(&self, _c: &str, batch: &Batch, _r: &RouteDecision) -> Result<AckResult> {
            Ok(AckResult::accepted(self.accept.min(batch.len())))
        }

        async fn commit(&self, _collection: &str, _hard: bool) -> Result<()> {
            Ok(())
        }

        async fn query_page(&self, _collection: &str, _request: &PageRequest) -> Result<QueryPage> {
            Err(BridgeError::QueryExecution("not readable".into()))
        }

        async fn count_only(&self, _collection: &str, _expression: &str) -> Result<u64> {
            Ok(0)
        }
    }

    fn plain_docs(count: usize) -> Vec<Document> {
        (1..=count)
            .map(|n| {
                Document::builder("id", format!("d-{}", n))
                    .field("field3_i", FieldValue::Integer(n as i64))
                    .build()
            })
            .collect()
    }

    // ============================================================
    // ACCOUNTING
    // ============================================================

    #[tokio::test]
    async fn test_short_ack_without_detail_fails_the_batch() {
        let client = Arc::new(ShortAck { accept: 1 });
        let table = Arc::new(client.routing_table("c1").await.unwrap());
        let indexer = BatchIndexer::new(client, "c1", table, config(3, 1));

        let outcome = indexer.submit_documents(0, plain_docs(3)).await;

        assert_eq!(outcome.ack.documents_accepted, 0);
        assert_eq!(outcome.ack.total_accounted(), 3);
        let unacknowledged: Vec<_> = outcome
            .ack
            .failures_of(ErrorKind::NonRetryableRejection)
            .collect();
        assert_eq!(unacknowledged.len(), 3);
        assert!(unacknowledged.iter().all(|f| f.cause.contains("not acknowledged")));
    }

    #[test]
    fn test_reconcile_keeps_detailed_failures_and_full_acks() {
        let batch = Batch::new(0, 0, plain_docs(3));
        let mut detailed = AckResult::accepted(2);
        detailed.record_failure("d-2", ErrorKind::NonRetryableRejection, "bad field");
        detailed.record_failure("elsewhere", ErrorKind::NonRetryableRejection, "not ours");

        let reconciled = AckResult::reconcile(&batch, detailed);
        let full = AckResult::reconcile(&batch, AckResult::accepted(3));

        assert_eq!(reconciled.documents_accepted, 2);
        assert_eq!(reconciled.errors.len(), 1);
        assert_eq!(reconciled.errors[0].document_id, "d-2");
        assert_eq!(full, AckResult::accepted(3));
    }

    #[tokio::test]
    async fn test_three_records_into_two_shards_are_all_accepted() {
        let cluster = setup(2).await;
        let indexer = indexer(&cluster, config(100, 4)).await;

        let outcome = indexer
            .submit(0, records(&["c1-1,foo,bar,1", "c1-2,foo,bar,2", "c1-3,foo,bar,3"]))
            .await;
        cluster.commit("c1", true).await.unwrap();

        assert_eq!(outcome.ack.documents_accepted, 3);
        assert!(outcome.ack.is_clean());
        assert_eq!(cluster.count_only("c1", "*:*").await.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_malformed_record_is_counted_not_fatal() {
        let cluster = setup(2).await;
        let indexer = indexer(&cluster, config(100, 4)).await;

        let outcome = indexer
            .submit(
                0,
                records(&["c1-1,foo,bar,1", "c1-2,foo,bar,2", "c1-4,foo,bar,notanumber"]),
            )
            .await;

        assert_eq!(outcome.ack.documents_accepted, 2);
        assert_eq!(outcome.ack.errors.len(), 1);
        let failure = &outcome.ack.errors[0];
        assert_eq!(failure.document_id, "c1-4");
        assert_eq!(failure.kind, ErrorKind::MalformedRecord);
        assert_eq!(outcome.ack.total_accounted(), 3);
    }

    #[tokio::test]
    async fn test_record_without_id_gets_positional_placeholder() {
        let cluster = setup(1).await;
        let indexer = indexer(&cluster, config(100, 4)).await;

        let outcome = indexer.submit(7, records(&["c1-1,foo,bar,1", ",foo,bar,2"])).await;

        assert_eq!(outcome.ack.documents_accepted, 1);
        assert_eq!(outcome.ack.errors[0].document_id, "<partition 7 record 1>");
    }

    #[tokio::test]
    async fn test_cluster_side_rejection_is_reported_per_document() {
        let cluster = setup(2).await;
        cluster.reject_document("c1-3");
        let indexer = indexer(&cluster, config(2, 2)).await;

        let outcome = indexer.submit(0, generated(5)).await;

        assert_eq!(outcome.ack.documents_accepted, 4);
        assert_eq!(
            outcome.ack.failures_of(ErrorKind::NonRetryableRejection).count(),
            1
        );
        assert_eq!(outcome.ack.total_accounted(), 5);
    }

    // ============================================================
    // RETRIES
    // ============================================================

    #[tokio::test]
    async fn test_transient_failures_are_retried() {
        let cluster = setup(1).await;
        cluster.fail_next_submissions(2);
        let indexer = indexer(&cluster, config(100, 1)).await;

        let outcome = indexer.submit(0, generated(3)).await;

        assert_eq!(outcome.ack.documents_accepted, 3);
        assert_eq!(cluster.stats().submit_calls, 3);
    }

    #[tokio::test]
    async fn test_exhausted_retries_fail_the_whole_batch() {
        let cluster = setup(1).await;
        cluster.fail_next_submissions(10);
        let indexer = indexer(&cluster, config(100, 1)).await;

        let outcome = indexer.submit(0, generated(3)).await;

        assert_eq!(outcome.ack.documents_accepted, 0);
        assert_eq!(
            outcome.ack.failures_of(ErrorKind::RetryableTransport).count(),
            3
        );
        assert_eq!(cluster.stats().submit_calls, 3);
    }

    #[tokio::test]
    async fn test_down_shard_fails_batch_with_no_live_shard() {
        let cluster = setup(1).await;
        let table = cluster.routing_table("c1").await.unwrap();
        cluster
            .set_replica_state("c1", &table.shards[0].name, ReplicaState::Down)
            .await
            .unwrap();
        let indexer = indexer(&cluster, config(100, 1)).await;

        let outcome = indexer.submit(0, generated(2)).await;

        assert_eq!(outcome.ack.failures_of(ErrorKind::NoLiveShard).count(), 2);
        assert_eq!(cluster.stats().submit_calls, 0);
    }

    #[test]
    fn test_backoff_doubles_up_to_the_cap() {
        let policy = RetryPolicy::default();

        assert_eq!(policy.backoff(0), Duration::from_millis(150));
        assert_eq!(policy.backoff(1), Duration::from_millis(300));
        assert_eq!(policy.backoff(2), Duration::from_millis(600));
        assert_eq!(policy.backoff(3), Duration::from_millis(1200));
        assert_eq!(policy.backoff(40), Duration::from_millis(1200));
        assert_eq!(policy.backoff(usize::MAX), Duration::from_millis(1200));
    }

    #[test]
    fn test_jitter_stays_below_its_bound() {
        let policy = RetryPolicy::default();

        for _ in 0..200 {
            assert!(policy.jitter() < Duration::from_millis(50));
        }
        assert_eq!(RetryPolicy::immediate(3).jitter(), Duration::ZERO);
    }

    #[tokio::test]
    async fn test_non_retryable_error_is_attempted_once() {
        let calls = AtomicUsize::new(0);

        let result: Result<()> = RetryPolicy::default()
            .run("rejected op", |_| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(BridgeError::NonRetryableRejection("schema".into())) }
            })
            .await;

        assert_eq!(result.unwrap_err().kind(), ErrorKind::NonRetryableRejection);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_retryable_error_uses_every_attempt() {
        let calls = AtomicUsize::new(0);

        let result: Result<()> = RetryPolicy::immediate(4)
            .run("flaky op", |attempt| {
                calls.fetch_add(1, Ordering::SeqCst);
                async move { Err(BridgeError::RetryableTransport(format!("attempt {}", attempt))) }
            })
            .await;

        assert!(result.unwrap_err().is_retryable());
        assert_eq!(calls.load(Ordering::SeqCst), 4);
    }

    // ============================================================
    // CONCURRENCY
    // ============================================================

    #[tokio::test]
    async fn test_aborted_batch_task_is_reported_as_cancelled() {
        let mut in_flight = InFlightBatches::default();
        in_flight.spawn(Batch::new(0, 0, plain_docs(2)), |_| async {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Ok(AckResult::default())
        });
        in_flight.abort_all();

        let (batch, result) = in_flight.join_next().await.unwrap();

        assert_eq!(batch.len(), 2);
        assert!(matches!(result, Err(BridgeError::Cancelled)));
        assert!(in_flight.join_next().await.is_none());
    }

    #[tokio::test]
    async fn test_in_flight_batches_respect_max_concurrency() {
        let cluster = setup(2).await;
        cluster.set_submit_latency(Duration::from_millis(20));
        let indexer = indexer(&cluster, config(1, 3)).await;

        let outcome = indexer.submit(0, generated(12)).await;

        assert_eq!(outcome.batches, 12);
        assert_eq!(outcome.ack.documents_accepted, 12);
        let peak = cluster.stats().peak_in_flight;
        assert!(peak <= 3, "peak in-flight was {}", peak);
        assert!(peak >= 2, "batches never overlapped");
    }

    #[tokio::test]
    async fn test_cancelled_run_issues_no_new_batches() {
        let cluster = setup(1).await;
        let cancel = CancellationSignal::new();
        cancel.cancel();
        let indexer = indexer(&cluster, config(2, 2)).await.with_cancellation(cancel);

        let outcome = indexer.submit(0, generated(5)).await;

        assert!(outcome.cancelled);
        assert_eq!(outcome.ack.documents_accepted, 0);
        assert_eq!(outcome.ack.failures_of(ErrorKind::Cancelled).count(), 5);
        assert_eq!(cluster.stats().submit_calls, 0);
    }

    // ============================================================
    // ROUTING & COMMITS
    // ============================================================

    #[tokio::test]
    async fn test_explicit_mode_sends_single_shard_batches() {
        let cluster = setup(2).await;
        let mut cfg = config(100, 2);
        cfg.route_mode = RouteMode::Explicit;
        let indexer = indexer(&cluster, cfg).await;

        let outcome = indexer.submit(0, generated(20)).await;

        // One batch per shard since each group fits in a single batch
        assert_eq!(outcome.batches, 2);
        assert_eq!(outcome.ack.documents_accepted, 20);
        assert!(outcome.ack.is_clean());
    }

    #[tokio::test]
    async fn test_periodic_policy_commits_mid_run() {
        let cluster = setup(1).await;
        let indexer = indexer(&cluster, config(1, 1))
            .await
            .with_commit_policy(CommitPolicy::periodic(2, Duration::ZERO));

        let outcome = indexer.submit(0, generated(4)).await;

        assert_eq!(outcome.commits, 2);
        assert_eq!(cluster.stats().hard_commits, 2);
        assert_eq!(cluster.count_only("c1", "*:*").await.unwrap(), 4);
    }

    #[tokio::test]
    async fn test_explicit_final_policy_leaves_commit_to_caller() {
        let cluster = setup(1).await;
        let indexer = indexer(&cluster, config(1, 2)).await;

        let outcome = indexer.submit(0, generated(3)).await;

        assert_eq!(outcome.commits, 0);
        assert_eq!(cluster.count_only("c1", "*:*").await.unwrap(), 0);
    }
}
