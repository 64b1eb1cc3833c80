//! Document Codec Module
//!
//! Turns worker-local raw records into the structured documents the search
//! cluster stores.
//!
//! ## Core Concepts
//! - **Record**: loosely typed named values plus an identifier field, as produced by a worker.
//! - **Document**: the typed, immutable result of encoding; always carries the identifier first.
//! - **Schema**: declares field types explicitly or through dynamic-field suffixes (`_s`, `_i`, ...).
//! - **Per-record failure**: a record that cannot be encoded yields a `MalformedRecordError`
//!   without affecting its neighbours.
//!
//! ## Submodules
//! - **`types`**: `Record`, `Document`, `FieldValue` and the `Schema` description.
//! - **`codec`**: the `DocumentCodec` encoder.
//! - **`fixture`**: the comma-separated line convention used by the verification harness.

pub mod codec;
pub mod fixture;
pub mod types;
