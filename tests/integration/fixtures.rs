//! Test fixtures for integration tests.
//!
//! Provides helpers for:
//! - Temporary queue directories
//! - Representative request texts
//! - Ordering assertions

use std::collections::HashMap;
use std::path::PathBuf;
use tempfile::TempDir;

use taskmaster::core::{Capability, OrderedBatch, Subtask};
use taskmaster::queue::DirectoryQueue;

pub const SIMPLE_REQUEST: &str = "Fix the broken submit button animation";

pub const OAUTH_REQUEST: &str = "Implement OAuth login with Google and GitHub";

pub const MEGA_REQUEST: &str = "Build a complete comedian management system with profile pages, availability calendar, booking requests, performance analytics, revenue tracking, and admin dashboard";

/// Feature areas the mega request names, by their subtask id key.
pub const MEGA_AREAS: &[&str] = &[
    "profile",
    "availability",
    "booking",
    "analytics",
    "revenue",
    "admin",
];

/// A queue directory inside a temporary directory.
pub struct TestQueue {
    /// Keeps the directory alive for the test's duration.
    pub temp_dir: TempDir,
    pub dir: PathBuf,
    pub queue: DirectoryQueue,
}

impl TestQueue {
    pub fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let dir = temp_dir.path().join(".agent-comms").join("task-queue");
        let queue = DirectoryQueue::new(&dir);
        Self {
            temp_dir,
            dir,
            queue,
        }
    }

    /// Names of every file in the queue directory, sorted.
    pub fn file_names(&self) -> Vec<String> {
        let mut names: Vec<String> = std::fs::read_dir(&self.dir)
            .expect("Failed to read queue dir")
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }
}

pub fn subtask(id: &str, deps: &[&str]) -> Subtask {
    Subtask::new(id, Capability::backend(), 2, &format!("work for {}", id))
        .depends_on(deps.iter().copied())
}

/// Assert every dependency appears strictly before its dependent.
pub fn assert_dependencies_precede(batch: &OrderedBatch) {
    let position: HashMap<&str, usize> = batch
        .iter()
        .enumerate()
        .map(|(i, s)| (s.id.as_str(), i))
        .collect();
    for subtask in batch {
        for dep in &subtask.dependencies {
            assert!(
                position[dep.as_str()] < position[subtask.id.as_str()],
                "{} should come before {} in {:?}",
                dep,
                subtask.id,
                ids(batch)
            );
        }
    }
}

pub fn ids(batch: &OrderedBatch) -> Vec<String> {
    batch.iter().map(|s| s.id.clone()).collect()
}
