//! Bridge Configuration
//!
//! One JSON document configures a whole run. Every section has defaults, so
//! `{}` is a valid configuration; `validate` rejects values that cannot work.

use crate::error::{BridgeError, Result};
use crate::indexer::retry::RetryPolicy;
use crate::routing::router::RouteMode;

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    pub collection: String,
    /// Number of compute partitions a run is split into.
    pub parallelism: usize,
    pub indexer: IndexerConfig,
    pub commit: CommitConfig,
    pub wait: WaitConfig,
    pub query: QueryConfig,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            collection: "collection1".to_string(),
            parallelism: 1,
            indexer: IndexerConfig::default(),
            commit: CommitConfig::default(),
            wait: WaitConfig::default(),
            query: QueryConfig::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexerConfig {
    pub batch_size: usize,
    /// Upper bound on in-flight submissions per indexer.
    pub max_concurrency: usize,
    pub route_mode: RouteMode,
    pub retry: RetryPolicy,
}

impl Default for IndexerConfig {
    fn default() -> Self {
        Self {
            batch_size: 100,
            max_concurrency: 4,
            route_mode: RouteMode::ClusterRouted,
            retry: RetryPolicy::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommitModeName {
    Never,
    Periodic,
    #[default]
    ExplicitFinal,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CommitConfig {
    pub mode: CommitModeName,
    /// Periodic mode: commit after every N completed batches (0 disables).
    pub every_batches: usize,
    /// Periodic mode: commit once this much time passed since the last one (0 disables).
    pub every_ms: u64,
    pub hard: bool,
}

impl Default for CommitConfig {
    fn default() -> Self {
        Self {
            mode: CommitModeName::ExplicitFinal,
            every_batches: 10,
            every_ms: 1000,
            hard: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WaitConfig {
    pub timeout_ms: u64,
    pub poll_interval_ms: u64,
}

impl Default for WaitConfig {
    fn default() -> Self {
        Self {
            timeout_ms: 5000,
            poll_interval_ms: 200,
        }
    }
}

impl WaitConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueryConfig {
    pub page_size: usize,
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self { page_size: 100 }
    }
}

impl BridgeConfig {
    pub fn from_json_str(raw: &str) -> Result<Self> {
        let config: BridgeConfig = serde_json::from_str(raw)
            .map_err(|e| BridgeError::Configuration(format!("invalid configuration: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|e| {
            BridgeError::Configuration(format!("cannot read {}: {}", path.display(), e))
        })?;
        Self::from_json_str(&raw)
    }

    pub fn validate(&self) -> Result<()> {
        let fail = |msg: &str| Err(BridgeError::Configuration(msg.to_string()));

        if self.collection.trim().is_empty() {
            return fail("collection must not be empty");
        }
        if self.parallelism == 0 {
            return fail("parallelism must be at least 1");
        }
        if self.indexer.batch_size == 0 {
            return fail("indexer.batch_size must be at least 1");
        }
        if self.indexer.max_concurrency == 0 {
            return fail("indexer.max_concurrency must be at least 1");
        }
        if self.indexer.retry.max_attempts == 0 {
            return fail("indexer.retry.max_attempts must be at least 1");
        }
        if self.commit.mode == CommitModeName::Periodic
            && self.commit.every_batches == 0
            && self.commit.every_ms == 0
        {
            return fail("periodic commits need commit.every_batches or commit.every_ms");
        }
        if self.wait.poll_interval_ms == 0 {
            return fail("wait.poll_interval_ms must be positive");
        }
        if self.query.page_size == 0 {
            return fail("query.page_size must be at least 1");
        }
        Ok(())
    }
}
