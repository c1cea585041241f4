//! Core domain models for taskmaster.
//!
//! Subtasks, capabilities and the dependency graph that orders a batch.

pub mod dag;
pub mod subtask;

pub use dag::{sort, CycleEdge, DependencyGraph, OrderedBatch};
pub use subtask::{validate_subtasks, BatchId, Capability, Subtask};
