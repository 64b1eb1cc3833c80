//! Pipeline Module
//!
//! Wires the bridge components into whole runs.
//!
//! ## Flow
//! `Record` partitions → `DocumentCodec` → `ShardRouter` → `BatchIndexer` → `CommitPolicy`
//! → cluster → `ConsistencyWaiter` → `QueryReader`.
//!
//! ## Submodules
//! - **`cancel`**: the run-level `CancellationSignal`.
//! - **`run`**: `IndexingPipeline`, one indexing run over a `ParallelDataset` of records.
//! - **`harness`**: `VerificationHarness`, which provisions a collection, indexes fixture
//!   lines, waits for visibility and reads everything back.

pub mod cancel;
pub mod harness;
pub mod run;
