//! Commit Module
//!
//! Decides when the indexer forces the cluster to make pending writes visible.
//!
//! ## Modes
//! - **`Never`**: rely on the cluster's own soft-commit interval.
//! - **`Periodic`**: commit every N completed batches or every T elapsed, whichever comes first.
//! - **`ExplicitFinal`**: one commit after the last batch of the whole run.

pub mod policy;

#[cfg(test)]
mod tests;
