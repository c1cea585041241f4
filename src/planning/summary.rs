//! Per-capability workload summary for a planned batch.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::core::{Capability, OrderedBatch};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkloadSummary {
    pub per_capability: BTreeMap<Capability, usize>,
    pub total: usize,
    /// Rough wall-clock estimate, `total * minutes_per_task`.
    pub estimated_minutes: f64,
}

impl WorkloadSummary {
    pub fn from_batch(batch: &OrderedBatch, minutes_per_task: f64) -> Self {
        let mut per_capability = BTreeMap::new();
        for subtask in batch {
            *per_capability.entry(subtask.capability.clone()).or_insert(0) += 1;
        }
        let total = batch.len();
        Self {
            per_capability,
            total,
            estimated_minutes: total as f64 * minutes_per_task,
        }
    }

    pub fn count(&self, capability: &Capability) -> usize {
        self.per_capability.get(capability).copied().unwrap_or(0)
    }

    /// Whole minutes, rounded up.
    pub fn estimated_minutes_ceil(&self) -> u64 {
        self.estimated_minutes.ceil() as u64
    }
}

impl std::fmt::Display for WorkloadSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let parts: Vec<String> = self
            .per_capability
            .iter()
            .map(|(capability, count)| format!("{}: {}", capability, count))
            .collect();
        write!(
            f,
            "{} task(s) [{}], ~{} min",
            self.total,
            parts.join(", "),
            self.estimated_minutes_ceil()
        )
    }
}

impl Default for WorkloadSummary {
    fn default() -> Self {
        Self {
            per_capability: BTreeMap::new(),
            total: 0,
            estimated_minutes: 0.0,
        }
    }
}
