//! Cluster Indexer Library
//!
//! A bridge between a partitioned compute job and a sharded, replicated search
//! cluster: records produced by parallel workers are encoded, routed, batched
//! and submitted concurrently, then read back with cursor pagination.
//!
//! ## Architecture Modules
//! - **`codec`**: record → document encoding with schema typing and per-record failures.
//! - **`routing`**: MurmurHash3 routing over the collection's shard ranges and replica choice.
//! - **`indexer`**: batched, bounded-concurrency submission with retries and ack accounting.
//! - **`commit`**: when to force a commit versus relying on the cluster's soft commits.
//! - **`query`**: lazy, restartable cursor scans and per-shard partitioned reads.
//! - **`consistency`**: bounded polling until acknowledged writes are visible.
//! - **`dataset`**: the partitioned-dataset capability and its local implementation.
//! - **`cluster`**: the cluster capabilities, an in-memory reference cluster, and its
//!   HTTP surface and client.
//! - **`pipeline`**: whole indexing runs, cancellation and the verification harness.
//! - **`config`** / **`error`**: run configuration and the error taxonomy.

pub mod cluster;
pub mod codec;
pub mod commit;
pub mod config;
pub mod consistency;
pub mod dataset;
pub mod error;
pub mod indexer;
pub mod pipeline;
pub mod query;
pub mod routing;
