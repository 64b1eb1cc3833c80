use crate::codec::types::Document;
use crate::routing::table::ShardId;

use serde::{Deserialize, Serialize};

/// Sort order for a paginated scan. Ties are always broken by document id,
/// which keeps the order total and therefore stable across pages.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortSpec {
    pub field: String,
    pub descending: bool,
}

impl SortSpec {
    pub fn ascending(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            descending: false,
        }
    }

    pub fn descending(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            descending: true,
        }
    }
}

impl Default for SortSpec {
    fn default() -> Self {
        Self::ascending("id")
    }
}

/// Cluster-issued continuation token plus the last sort key it covers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryCursor {
    pub token: String,
    pub last_sort_key: Option<String>,
}

impl QueryCursor {
    pub const START_TOKEN: &'static str = "*";

    pub fn start() -> Self {
        Self {
            token: Self::START_TOKEN.to_string(),
            last_sort_key: None,
        }
    }

    pub fn is_start(&self) -> bool {
        self.token == Self::START_TOKEN
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageRequest {
    pub expression: String,
    pub cursor: QueryCursor,
    pub page_size: usize,
    pub sort: SortSpec,
    /// Restrict the page to one shard; `None` scans the whole collection.
    pub shard: Option<ShardId>,
}

/// One page of results. `next_cursor == None` marks the end of the stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryPage {
    pub documents: Vec<Document>,
    pub next_cursor: Option<QueryCursor>,
}
