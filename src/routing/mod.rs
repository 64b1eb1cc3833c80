//! Shard Routing Module
//!
//! Decides where a batch of documents is sent.
//!
//! ## Core Concepts
//! - **Routing table**: an immutable snapshot of the collection's shards, their hash ranges
//!   and replicas. Shared read-only across partitions via `Arc`; never mutated here.
//! - **Hashing**: MurmurHash3 (x86, 32-bit) over the document identifier, the same function the
//!   cluster applies, so client-side and cluster-side placement always agree.
//! - **Modes**: `ClusterRouted` hands the batch to any live replica and lets the cluster forward;
//!   `Explicit` targets the single shard every document in the batch hashes to.

pub mod hash;
pub mod router;
pub mod table;
