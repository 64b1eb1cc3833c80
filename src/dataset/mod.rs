//! Dataset Module
//!
//! The compute side of the bridge: a collection of records split into
//! partitions that are processed in parallel.
//!
//! ## Submodules
//! - **`dataset`**: the `ParallelDataset` capability the pipeline is written against.
//! - **`local`**: `LocalDataset`, an in-process implementation running each partition
//!   as its own tokio task and mapping with rayon.

pub mod dataset;
pub mod local;
