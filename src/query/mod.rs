//! Query Module
//!
//! Reads documents back out of the cluster for verification and downstream
//! processing.
//!
//! ## Core Concepts
//! - **Cursor pagination**: pages are fetched lazily with a cluster-issued cursor over a
//!   total sort order (sort field, then id), so a scan has no gaps or duplicates as long
//!   as the collection does not change underneath it.
//! - **Restartable scans**: every `query` call starts again from the first page.
//!
//! ## Submodules
//! - **`types`**: `PageRequest`, `QueryPage`, `QueryCursor`, `SortSpec`.
//! - **`expr`**: the small expression form the reference cluster evaluates.
//! - **`reader`**: `QueryReader`, the streaming/partitioned reader.

pub mod expr;
pub mod reader;
pub mod types;
