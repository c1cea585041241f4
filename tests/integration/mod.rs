//! Integration test suite for taskmaster.
//!
//! These tests drive the public API from request text to queue files on
//! disk. They verify that routing, decomposition, ordering and the queue
//! work together.
//!
//! # Test Categories
//!
//! - `scenarios`: End-to-end planning of representative requests
//! - `queue_roundtrip`: Records written to a directory and read back
//! - `concurrency`: Parallel dispatch into one queue, and the watcher
//!
//! # CI Compatibility
//!
//! Every test works in its own temporary directory and never touches
//! `~/.taskmaster` or the working directory.

mod fixtures;

mod concurrency;
mod queue_roundtrip;
mod scenarios;
