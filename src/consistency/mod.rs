//! Consistency Module
//!
//! Bridges the gap between "write acknowledged" and "write visible to queries".
//! The cluster's write and read paths are not linearizable, so verification
//! flows poll a count until it reaches the expected value or a deadline passes.

pub mod waiter;
