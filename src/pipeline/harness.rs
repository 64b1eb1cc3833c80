//! Verification Harness
//!
//! Provisions a collection, indexes fixture lines through the full pipeline,
//! waits until the accepted documents are visible and reads them back shard
//! by shard. Replaces a fixed sleep before verification with explicit polling.

use super::run::{IndexingPipeline, RunReport};
use crate::cluster::client::{ClusterAdmin, ClusterClient, CollectionSpec};
use crate::codec::codec::DocumentCodec;
use crate::codec::fixture::FixtureLineParser;
use crate::codec::types::Document;
use crate::config::BridgeConfig;
use crate::consistency::waiter::{ConsistencyWaiter, WaitOutcome};
use crate::dataset::dataset::ParallelDataset;
use crate::dataset::local::LocalDataset;
use crate::error::Result;
use crate::query::expr::MATCH_ALL;
use crate::query::reader::QueryReader;

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;

pub const DEFAULT_SHARDS: usize = 2;

/// The three fixture rows indexed when no explicit input is given.
pub fn default_fixture_lines(collection: &str) -> Vec<String> {
    vec![
        format!("{}-1,foo,bar,1", collection),
        format!("{}-2,foo,baz,2", collection),
        format!("{}-3,bar,baz,3", collection),
    ]
}

/// `count` generated rows numbered from 0.
pub fn generated_fixture_lines(collection: &str, count: usize) -> Vec<String> {
    (0..count)
        .map(|n| format!("{}-{},foo{},bar{},{}", collection, n, n, n, n))
        .collect()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerificationReport {
    pub collection: String,
    pub run: RunReport,
    pub wait: WaitOutcome,
    /// Documents read back per shard, in routing-table order.
    pub shard_counts: Vec<usize>,
    pub documents: Vec<Document>,
}

impl VerificationReport {
    /// Everything accepted became visible and was read back exactly once.
    pub fn is_consistent(&self) -> bool {
        let distinct: HashSet<&str> = self.documents.iter().map(|doc| doc.id()).collect();
        self.wait.converged
            && distinct.len() == self.documents.len()
            && self.documents.len() == self.run.ack.documents_accepted
    }
}

pub struct VerificationHarness<C> {
    cluster: Arc<C>,
    config: BridgeConfig,
    parser: FixtureLineParser,
}

impl<C> VerificationHarness<C>
where
    C: ClusterClient + ClusterAdmin + 'static,
{
    pub fn new(cluster: Arc<C>, config: BridgeConfig) -> Self {
        Self {
            cluster,
            config,
            parser: FixtureLineParser::default(),
        }
    }

    pub fn with_parser(mut self, parser: FixtureLineParser) -> Self {
        self.parser = parser;
        self
    }

    pub async fn build_default(&self, collection: &str) -> Result<VerificationReport> {
        self.build_collection(collection, default_fixture_lines(collection), DEFAULT_SHARDS)
            .await
    }

    pub async fn build_generated(&self, collection: &str, count: usize, shard_count: usize) -> Result<VerificationReport> {
        self.build_collection(collection, generated_fixture_lines(collection, count), shard_count)
            .await
    }

    pub async fn build_collection(
        &self,
        collection: &str,
        lines: Vec<String>,
        shard_count: usize,
    ) -> Result<VerificationReport> {
        self.cluster
            .create_collection(&CollectionSpec::for_verification(collection, shard_count))
            .await?;

        let mut config = self.config.clone();
        config.collection = collection.to_string();

        let parser = self.parser.clone();
        let dataset = LocalDataset::parallelize(lines, config.parallelism).map(move |line| parser.parse(&line));

        let client: Arc<dyn ClusterClient> = self.cluster.clone();
        let pipeline = IndexingPipeline::new(client.clone(), config.clone())
            .with_codec(Arc::new(DocumentCodec::new(self.parser.schema())));
        let run = pipeline.run(dataset).await?;

        let reader = QueryReader::new(client.clone(), collection);
        let wait = ConsistencyWaiter::new(reader.clone())
            .wait_with(run.ack.documents_accepted as u64, MATCH_ALL, &config.wait)
            .await?;
        if !wait.converged {
            tracing::warn!(
                "Expected {} documents in {} but only {} became visible",
                wait.expected,
                collection,
                wait.observed
            );
        }

        let table = client.routing_table(collection).await?;
        let read_back = reader
            .read_by_shard(MATCH_ALL, config.query.page_size, &table)
            .await?;
        let shard_counts = read_back.partitions().iter().map(Vec::len).collect();

        Ok(VerificationReport {
            collection: collection.to_string(),
            run,
            wait,
            shard_counts,
            documents: read_back.collect(),
        })
    }
}
