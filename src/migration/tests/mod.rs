//! Pipeline tests for the migration engine
//!
//! Exercises the batch processor, the tree builder, the runner lifecycle
//! and the domain migrations against an in-memory store with injectable
//! faults.

pub mod batch_tests;
pub mod support;
