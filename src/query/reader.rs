use super::types::{PageRequest, QueryCursor, SortSpec};
use crate::cluster::client::ClusterClient;
use crate::codec::types::Document;
use crate::dataset::local::LocalDataset;
use crate::error::{BridgeError, Result};
use crate::routing::table::{RoutingTable, ShardId};

use futures::stream::{self, BoxStream, StreamExt, TryStreamExt};
use std::collections::{HashSet, VecDeque};
use std::sync::Arc;

/// Streams documents matching an expression, page by page.
#[derive(Clone)]
pub struct QueryReader {
    client: Arc<dyn ClusterClient>,
    collection: String,
    sort: SortSpec,
}

struct ScanState {
    client: Arc<dyn ClusterClient>,
    collection: String,
    request: PageRequest,
    buffer: VecDeque<Document>,
    seen: HashSet<String>,
    finished: bool,
}

impl QueryReader {
    pub fn new(client: Arc<dyn ClusterClient>, collection: impl Into<String>) -> Self {
        Self {
            client,
            collection: collection.into(),
            sort: SortSpec::default(),
        }
    }

    pub fn with_sort(mut self, sort: SortSpec) -> Self {
        self.sort = sort;
        self
    }

    pub fn collection(&self) -> &str {
        &self.collection
    }

    /// Lazily yields every matching document. The stream ends after the first error.
    pub fn query(&self, expression: &str, page_size: usize) -> BoxStream<'static, Result<Document>> {
        self.scan(expression, page_size, None)
    }

    /// Errors from the cluster are returned as they are, so callers can tell a
    /// bad expression from an unreachable node.
    pub async fn count(&self, expression: &str) -> Result<u64> {
        self.client.count_only(&self.collection, expression).await
    }

    pub async fn read_all(&self, expression: &str, page_size: usize) -> Result<Vec<Document>> {
        self.query(expression, page_size).try_collect().await
    }

    /// Reads the full result set and spreads it over `partitions` partitions.
    pub async fn read_dataset(
        &self,
        expression: &str,
        page_size: usize,
        partitions: usize,
    ) -> Result<LocalDataset<Document>> {
        let documents = self.read_all(expression, page_size).await?;
        Ok(LocalDataset::parallelize(documents, partitions))
    }

    /// One partition per shard, in routing-table order. Shards are scanned concurrently.
    pub async fn read_by_shard(
        &self,
        expression: &str,
        page_size: usize,
        table: &RoutingTable,
    ) -> Result<LocalDataset<Document>> {
        let scans = table.shards.iter().map(|shard| {
            self.scan(expression, page_size, Some(shard.name.clone()))
                .try_collect::<Vec<_>>()
        });
        let partitions = futures::future::try_join_all(scans).await?;

        tracing::debug!(
            "Read {} documents from {} shards of {}",
            partitions.iter().map(Vec::len).sum::<usize>(),
            partitions.len(),
            self.collection
        );
        Ok(LocalDataset::from_partitions(partitions))
    }

    fn scan(
        &self,
        expression: &str,
        page_size: usize,
        shard: Option<ShardId>,
    ) -> BoxStream<'static, Result<Document>> {
        if page_size == 0 {
            return stream::once(async {
                Err(BridgeError::QueryExecution("page size must be positive".into()))
            })
            .boxed();
        }

        let state = ScanState {
            client: self.client.clone(),
            collection: self.collection.clone(),
            request: PageRequest {
                expression: expression.to_string(),
                cursor: QueryCursor::start(),
                page_size,
                sort: self.sort.clone(),
                shard,
            },
            buffer: VecDeque::new(),
            seen: HashSet::new(),
            finished: false,
        };

        stream::unfold(state, |mut state| async move {
            loop {
                if let Some(doc) = state.buffer.pop_front() {
                    return Some((Ok(doc), state));
                }
                if state.finished {
                    return None;
                }

                let page = match state
                    .client
                    .query_page(&state.collection, &state.request)
                    .await
                {
                    Ok(page) => page,
                    Err(e) => {
                        state.finished = true;
                        return Some((Err(as_query_error(e)), state));
                    }
                };

                let empty = page.documents.is_empty();
                for doc in page.documents {
                    if !state.seen.insert(doc.id().to_string()) {
                        tracing::warn!(
                            "Document {} of {} returned on more than one page",
                            doc.id(),
                            state.collection
                        );
                    }
                    state.buffer.push_back(doc);
                }

                match page.next_cursor {
                    Some(next) if !empty && next != state.request.cursor => {
                        state.request.cursor = next;
                    }
                    _ => state.finished = true,
                }
            }
        })
        .boxed()
    }
}

fn as_query_error(err: BridgeError) -> BridgeError {
    match err {
        BridgeError::QueryExecution(_) => err,
        other => BridgeError::QueryExecution(other.to_string()),
    }
}
