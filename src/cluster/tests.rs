//! Cluster Module Tests
//!
//! Exercises `InMemoryCluster` directly through the `ClusterClient` and
//! `ClusterAdmin` capabilities.
//!
//! ## Test Scopes
//! - **Provisioning**: placement capacity and duplicate collections.
//! - **Visibility**: pending writes, explicit commits, soft-commit delay.
//! - **Submission**: replayed batches, per-document rejections, injected faults.
//! - **Pagination**: cursor scans in both sort directions and per shard.

#[cfg(test)]
mod tests {
    use crate::cluster::client::{ClusterAdmin, ClusterClient, CollectionSpec};
    use crate::cluster::memory::{InMemoryCluster, MAX_REPLICAS, MAX_SHARDS};
    use crate::codec::types::{Document, FieldValue};
    use crate::error::{BridgeError, ErrorKind};
    use crate::indexer::types::Batch;
    use crate::query::types::{PageRequest, QueryCursor, SortSpec};
    use crate::routing::router::{RouteDecision, RouteMode, ShardRouter};
    use crate::routing::table::{ReplicaState, RoutingTable};
    use std::collections::HashSet;
    use std::time::Duration;

    fn doc(id: &str, n: i64) -> Document {
        Document::builder("id", id)
            .field("field1_s", FieldValue::Text(format!("foo {}", n)))
            .field("field3_i", FieldValue::Integer(n))
            .build()
    }

    fn docs(prefix: &str, count: i64) -> Vec<Document> {
        (1..=count).map(|n| doc(&format!("{}-{}", prefix, n), n)).collect()
    }

    async fn cluster_with(collection: &str, shards: usize) -> InMemoryCluster {
        let cluster = InMemoryCluster::new(2);
        cluster
            .create_collection(&CollectionSpec::for_verification(collection, shards))
            .await
            .unwrap();
        cluster
    }

    async fn submit(cluster: &InMemoryCluster, collection: &str, documents: Vec<Document>) -> usize {
        let batch = Batch::new(0, 0, documents);
        cluster
            .submit_batch(collection, &batch, &RouteDecision::cluster_routed(None))
            .await
            .unwrap()
            .documents_accepted
    }

    fn page_request(page_size: usize, cursor: QueryCursor, sort: SortSpec) -> PageRequest {
        PageRequest {
            expression: "*:*".to_string(),
            cursor,
            page_size,
            sort,
            shard: None,
        }
    }

    // ============================================================
    // PROVISIONING
    // ============================================================

    #[tokio::test]
    async fn test_create_collection_builds_routing_table() {
        let cluster = cluster_with("c1", 2).await;

        let table = cluster.routing_table("c1").await.unwrap();

        assert_eq!(table.shard_count(), 2);
        assert!(table.shards.iter().all(|shard| shard.replicas.len() == 1));
    }

    #[tokio::test]
    async fn test_create_collection_rejects_overcommitted_placement() {
        let cluster = InMemoryCluster::new(1);
        let mut spec = CollectionSpec::for_verification("c1", 4);
        spec.max_shards_per_node = 2;

        let err = cluster.create_collection(&spec).await.unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Configuration);
        assert!(err.to_string().contains("maxShardsPerNode=2"));
    }

    #[tokio::test]
    async fn test_create_collection_rejects_oversized_layouts() {
        let cluster = InMemoryCluster::new(2);

        let mut overflowing = CollectionSpec::for_verification("c1", usize::MAX / 2 + 1);
        overflowing.replication_factor = 2;
        overflowing.max_shards_per_node = usize::MAX;
        let mut too_many_shards = CollectionSpec::for_verification("c2", MAX_SHARDS + 1);
        too_many_shards.max_shards_per_node = usize::MAX;
        let mut too_many_replicas = CollectionSpec::for_verification("c3", 2);
        too_many_replicas.replication_factor = MAX_REPLICAS;
        too_many_replicas.max_shards_per_node = usize::MAX;

        for spec in [overflowing, too_many_shards, too_many_replicas] {
            let err = cluster.create_collection(&spec).await.unwrap_err();
            assert_eq!(err.kind(), ErrorKind::Configuration, "{}", spec.name);
        }
        assert!(cluster.routing_table("c1").await.is_err());
    }

    #[tokio::test]
    async fn test_create_collection_twice_fails() {
        let cluster = cluster_with("c1", 1).await;

        let err = cluster
            .create_collection(&CollectionSpec::for_verification("c1", 1))
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Configuration);
    }

    #[tokio::test]
    async fn test_unknown_collection_is_configuration_error() {
        let cluster = InMemoryCluster::new(1);

        let err = cluster.count_only("missing", "*:*").await.unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Configuration);
    }

    // ============================================================
    // VISIBILITY
    // ============================================================

    #[tokio::test]
    async fn test_writes_are_invisible_until_commit() {
        let cluster = cluster_with("c1", 2).await;

        assert_eq!(submit(&cluster, "c1", docs("c1", 3)).await, 3);
        assert_eq!(cluster.count_only("c1", "*:*").await.unwrap(), 0);
        assert_eq!(cluster.collection_stats("c1").unwrap().pending, 3);

        cluster.commit("c1", true).await.unwrap();

        assert_eq!(cluster.count_only("c1", "*:*").await.unwrap(), 3);
        assert_eq!(cluster.stats().hard_commits, 1);
    }

    #[tokio::test]
    async fn test_soft_commit_interval_exposes_writes() {
        let cluster = InMemoryCluster::new(1).with_soft_commit(Duration::from_millis(50));
        cluster
            .create_collection(&CollectionSpec::for_verification("c1", 1))
            .await
            .unwrap();

        submit(&cluster, "c1", docs("c1", 2)).await;
        assert_eq!(cluster.count_only("c1", "*:*").await.unwrap(), 0);

        tokio::time::sleep(Duration::from_millis(80)).await;

        assert_eq!(cluster.count_only("c1", "*:*").await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_same_id_overwrites_instead_of_duplicating() {
        let cluster = cluster_with("c1", 2).await;

        submit(&cluster, "c1", vec![doc("c1-1", 1)]).await;
        submit(&cluster, "c1", vec![doc("c1-1", 99)]).await;
        cluster.commit("c1", false).await.unwrap();

        assert_eq!(cluster.count_only("c1", "*:*").await.unwrap(), 1);
        assert_eq!(cluster.count_only("c1", "field3_i:99").await.unwrap(), 1);
    }

    // ============================================================
    // SUBMISSION
    // ============================================================

    #[tokio::test]
    async fn test_replayed_batch_returns_cached_ack() {
        let cluster = cluster_with("c1", 2).await;
        let batch = Batch::new(0, 0, docs("c1", 3));
        let route = RouteDecision::cluster_routed(None);

        let first = cluster.submit_batch("c1", &batch, &route).await.unwrap();
        let second = cluster.submit_batch("c1", &batch, &route).await.unwrap();
        cluster.commit("c1", true).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(cluster.count_only("c1", "*:*").await.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_type_mismatch_is_rejected_per_document() {
        let cluster = cluster_with("c1", 2).await;
        let bad = Document::builder("id", "c1-4")
            .field("field3_i", FieldValue::Text("notanumber".into()))
            .build();
        let batch = Batch::new(0, 0, vec![doc("c1-1", 1), bad]);

        let ack = cluster
            .submit_batch("c1", &batch, &RouteDecision::cluster_routed(None))
            .await
            .unwrap();

        assert_eq!(ack.documents_accepted, 1);
        assert_eq!(ack.errors.len(), 1);
        assert_eq!(ack.errors[0].document_id, "c1-4");
        assert_eq!(ack.errors[0].kind, ErrorKind::NonRetryableRejection);
    }

    #[tokio::test]
    async fn test_rejected_document_ids_fail_individually() {
        let cluster = cluster_with("c1", 2).await;
        cluster.reject_document("c1-2");

        let batch = Batch::new(0, 0, docs("c1", 3));
        let ack = cluster
            .submit_batch("c1", &batch, &RouteDecision::cluster_routed(None))
            .await
            .unwrap();

        assert_eq!(ack.documents_accepted, 2);
        assert_eq!(ack.failed_ids(), HashSet::from(["c1-2"]));
    }

    #[tokio::test]
    async fn test_injected_transient_failures_are_consumed() {
        let cluster = cluster_with("c1", 1).await;
        cluster.fail_next_submissions(1);
        let batch = Batch::new(0, 0, docs("c1", 2));
        let route = RouteDecision::cluster_routed(None);

        let err = cluster.submit_batch("c1", &batch, &route).await.unwrap_err();
        assert!(err.is_retryable());

        let ack = cluster.submit_batch("c1", &batch, &route).await.unwrap();
        assert_eq!(ack.documents_accepted, 2);
        assert_eq!(cluster.stats().submit_calls, 2);
    }

    #[tokio::test]
    async fn test_batch_rejection_is_not_retryable() {
        let cluster = cluster_with("c1", 1).await;
        cluster.reject_batches(true);

        let err = cluster
            .submit_batch("c1", &Batch::new(0, 0, docs("c1", 1)), &RouteDecision::cluster_routed(None))
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::NonRetryableRejection);
    }

    #[tokio::test]
    async fn test_explicit_route_rejects_misrouted_documents() {
        let cluster = cluster_with("c1", 2).await;
        let table = cluster.routing_table("c1").await.unwrap();
        let router = ShardRouter::new(RouteMode::Explicit);

        let documents = docs("c1", 20);
        let first_shard = router.shard_for_id(documents[0].id(), &table).unwrap().name.clone();
        let stray = documents
            .iter()
            .find(|d| router.shard_for_id(d.id(), &table).unwrap().name != first_shard)
            .cloned()
            .unwrap();

        let route = RouteDecision {
            target_shard: Some(first_shard),
            mode: RouteMode::Explicit,
            replica: None,
        };
        let batch = Batch::new(0, 0, vec![documents[0].clone(), stray.clone()]);
        let ack = cluster.submit_batch("c1", &batch, &route).await.unwrap();

        assert_eq!(ack.documents_accepted, 1);
        assert_eq!(ack.errors[0].document_id, stray.id());
    }

    #[tokio::test]
    async fn test_down_shard_fails_with_no_live_shard() {
        let cluster = cluster_with("c1", 1).await;
        let table: RoutingTable = cluster.routing_table("c1").await.unwrap();
        let shard = table.shards[0].name.clone();
        cluster
            .set_replica_state("c1", &shard, ReplicaState::Down)
            .await
            .unwrap();

        let err = cluster
            .submit_batch("c1", &Batch::new(0, 0, docs("c1", 1)), &RouteDecision::cluster_routed(None))
            .await
            .unwrap_err();

        match err {
            BridgeError::NoLiveShard { collection, shard: s } => {
                assert_eq!(collection, "c1");
                assert_eq!(s, shard.0);
            }
            other => panic!("unexpected error {:?}", other),
        }
        assert_eq!(cluster.routing_table("c1").await.unwrap().version, table.version + 1);
    }

    // ============================================================
    // PAGINATION
    // ============================================================

    #[tokio::test]
    async fn test_cursor_scan_has_no_gaps_or_duplicates() {
        let cluster = cluster_with("c1", 3).await;
        submit(&cluster, "c1", docs("c1", 25)).await;
        cluster.commit("c1", true).await.unwrap();

        let mut cursor = QueryCursor::start();
        let mut seen = Vec::new();
        let mut pages = 0;
        loop {
            let page = cluster
                .query_page("c1", &page_request(10, cursor.clone(), SortSpec::ascending("field3_i")))
                .await
                .unwrap();
            pages += 1;
            seen.extend(page.documents.iter().map(|d| d.get("field3_i").and_then(|v| v.as_integer()).unwrap()));
            match page.next_cursor {
                Some(next) => cursor = next,
                None => break,
            }
        }

        assert_eq!(pages, 3);
        assert_eq!(seen, (1..=25).collect::<Vec<i64>>());
    }

    #[tokio::test]
    async fn test_descending_scan_reverses_order() {
        let cluster = cluster_with("c1", 2).await;
        submit(&cluster, "c1", docs("c1", 5)).await;
        cluster.commit("c1", true).await.unwrap();

        let first = cluster
            .query_page("c1", &page_request(3, QueryCursor::start(), SortSpec::descending("field3_i")))
            .await
            .unwrap();
        let cursor = first.next_cursor.clone().unwrap();
        let second = cluster
            .query_page("c1", &page_request(3, cursor, SortSpec::descending("field3_i")))
            .await
            .unwrap();

        let values: Vec<i64> = first
            .documents
            .iter()
            .chain(second.documents.iter())
            .filter_map(|d| d.get("field3_i").and_then(|v| v.as_integer()))
            .collect();
        assert_eq!(values, vec![5, 4, 3, 2, 1]);
        assert!(second.next_cursor.is_none());
    }

    #[tokio::test]
    async fn test_shard_scoped_pages_partition_the_collection() {
        let cluster = cluster_with("c1", 2).await;
        submit(&cluster, "c1", docs("c1", 12)).await;
        cluster.commit("c1", true).await.unwrap();
        let table = cluster.routing_table("c1").await.unwrap();

        let mut total = 0;
        for shard in &table.shards {
            let mut request = page_request(100, QueryCursor::start(), SortSpec::default());
            request.shard = Some(shard.name.clone());
            total += cluster.query_page("c1", &request).await.unwrap().documents.len();
        }

        assert_eq!(total, 12);
    }

    #[tokio::test]
    async fn test_invalid_queries_fail_with_query_execution() {
        let cluster = cluster_with("c1", 1).await;

        let mut request = page_request(10, QueryCursor::start(), SortSpec::default());
        request.expression = "field1_s:".to_string();
        let err = cluster.query_page("c1", &request).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::QueryExecution);

        let mut request = page_request(10, QueryCursor::start(), SortSpec::default());
        request.cursor.token = "not-a-cursor".to_string();
        let err = cluster.query_page("c1", &request).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::QueryExecution);
    }
}
