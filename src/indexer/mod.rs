//! Batch Indexer Module
//!
//! Moves documents from compute partitions into the cluster.
//!
//! ## Core Concepts
//! - **Batch**: ordered documents sent in one submission call, identified by a `BatchId`
//!   that survives retries.
//! - **Bounded concurrency**: a semaphore caps in-flight submissions per indexer.
//! - **Acknowledgement accounting**: every document is either accepted or listed as a
//!   failure with its classification; nothing is silently dropped.
//!
//! ## Submodules
//! - **`types`**: `Batch`, `AckResult` and `IndexOutcome`.
//! - **`retry`**: doubling backoff with jitter for transient transport failures.
//! - **`indexer`**: the `BatchIndexer` itself.

pub mod indexer;
pub mod retry;
pub mod types;

#[cfg(test)]
mod tests;
