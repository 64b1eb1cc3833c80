//! Cluster Module
//!
//! The search cluster as seen from the bridge: two capabilities plus the
//! implementations shipped with the crate.
//!
//! ## Capabilities
//! - **`ClusterClient`**: batch submission, commits, paginated queries and counts.
//! - **`ClusterAdmin`**: collection provisioning for verification flows.
//!
//! ## Implementations
//! - **`memory`**: `InMemoryCluster`, a sharded reference cluster with pending/visible
//!   documents, soft-commit delay, cursor pagination and fault injection.
//! - **`http`**: `HttpClusterClient`, speaking the JSON protocol defined in **`protocol`**
//!   to a node that serves **`handlers`**.

pub mod client;
pub mod handlers;
pub mod http;
pub mod memory;
pub mod protocol;

#[cfg(test)]
mod tests;
