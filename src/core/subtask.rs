//! Subtask data model shared by the classifier, decomposer and queue.
//!
//! A subtask is one discrete unit of work owned by a single capability.
//! Subtasks reference each other by id inside a batch; the batch as a whole
//! is identified by a [`BatchId`].

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use uuid::Uuid;

use crate::tlog_warn;

/// A worker role that owns execution of a subtask.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Capability(String);

impl Capability {
    pub fn new(name: &str) -> Self {
        Self(name.trim().to_lowercase())
    }

    pub fn frontend() -> Self {
        Self::new("frontend")
    }

    pub fn backend() -> Self {
        Self::new("backend")
    }

    pub fn testing() -> Self {
        Self::new("testing")
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Upper-case form used in queue record headers.
    pub fn label(&self) -> String {
        self.0.to_uppercase()
    }

    pub fn is_testing(&self) -> bool {
        self.0 == "testing"
    }

    /// Priority tier used when a subtask is created without a canonical stage.
    pub fn default_tier(&self) -> u8 {
        match self.0.as_str() {
            "backend" => 2,
            "frontend" => 4,
            "testing" => 7,
            _ => 5,
        }
    }

    /// Capability names end up in queue file names, so keep them to a safe alphabet.
    pub fn is_valid_name(name: &str) -> bool {
        !name.is_empty()
            && name
                .chars()
                .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
    }
}

impl std::fmt::Display for Capability {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier for the batch of subtasks derived from one request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BatchId(pub Uuid);

impl BatchId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Return first 8 characters of the UUID for display.
    pub fn short(&self) -> String {
        self.0.to_string()[..8].to_string()
    }
}

impl Default for BatchId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for BatchId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for BatchId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

/// One unit of work within a batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Subtask {
    /// Unique within its batch.
    pub id: String,
    pub capability: Capability,
    pub priority_tier: u8,
    pub description: String,
    /// Ids of subtasks in the same batch that must finish first.
    #[serde(default)]
    pub dependencies: Vec<String>,
}

impl Subtask {
    pub fn new(id: &str, capability: Capability, priority_tier: u8, description: &str) -> Self {
        Self {
            id: id.to_string(),
            capability,
            priority_tier,
            description: description.to_string(),
            dependencies: Vec::new(),
        }
    }

    /// Add dependencies, skipping ids already present.
    pub fn depends_on<I, S>(mut self, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for id in ids {
            let id = id.into();
            if !self.dependencies.contains(&id) {
                self.dependencies.push(id);
            }
        }
        self
    }

    pub fn has_dependencies(&self) -> bool {
        !self.dependencies.is_empty()
    }
}

/// Enforce the batch invariant: unique ids, no self-dependency, no dangling reference.
///
/// Offending subtasks are dropped with a warning. Dropping a subtask can leave
/// its dependents dangling, so the check repeats until nothing changes.
pub fn validate_subtasks(subtasks: Vec<Subtask>) -> Vec<Subtask> {
    let mut seen = HashSet::new();
    let mut current: Vec<Subtask> = subtasks
        .into_iter()
        .filter(|s| {
            if seen.insert(s.id.clone()) {
                true
            } else {
                tlog_warn!("Dropping subtask {}: duplicate id", s.id);
                false
            }
        })
        .collect();

    loop {
        let ids: HashSet<&str> = current.iter().map(|s| s.id.as_str()).collect();
        let mut rejected = HashSet::new();

        for subtask in &current {
            if subtask.dependencies.iter().any(|d| d == &subtask.id) {
                tlog_warn!("Dropping subtask {}: depends on itself", subtask.id);
                rejected.insert(subtask.id.clone());
            } else if let Some(missing) = subtask
                .dependencies
                .iter()
                .find(|d| !ids.contains(d.as_str()))
            {
                tlog_warn!(
                    "Dropping subtask {}: depends on unknown subtask {}",
                    subtask.id,
                    missing
                );
                rejected.insert(subtask.id.clone());
            }
        }

        if rejected.is_empty() {
            return current;
        }
        current.retain(|s| !rejected.contains(&s.id));
    }
}
