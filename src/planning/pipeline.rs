//! The request pipeline: assess, decompose, order, and optionally enqueue.

use serde::Serialize;

use crate::config::Config;
use crate::core::{BatchId, DependencyGraph, OrderedBatch, Subtask};
use crate::planning::complexity::{ComplexityAssessor, ComplexityRule, ComplexityTag};
use crate::planning::decomposer::Decomposer;
use crate::planning::summary::WorkloadSummary;
use crate::queue::{QueueRecord, QueueStore, QueueWriter, DEFAULT_CONTEXT};
use crate::routing::{Classifier, ProfileSet, RouteOutcome};
use crate::{tlog, tlog_debug, tlog_warn, Error, Result};

/// Everything derived from one request before anything is persisted.
#[derive(Debug, Clone, Serialize)]
pub struct Plan {
    pub request: String,
    pub complexity: ComplexityTag,
    pub complexity_rule: ComplexityRule,
    pub batch: OrderedBatch,
    pub summary: WorkloadSummary,
}

#[derive(Debug, Clone, Serialize)]
pub struct DispatchReport {
    pub plan: Plan,
    pub records: Vec<QueueRecord>,
}

impl DispatchReport {
    /// The line written to the queue's activity log.
    pub fn activity_line(&self) -> String {
        format!(
            "[TASKMASTER] Analyzed {} task: {} task(s) created",
            self.plan.complexity,
            self.records.len()
        )
    }
}

/// Classifier, assessor and decomposer wired together from one [`Config`].
///
/// Holds no per-request state, so a single instance can serve concurrent
/// requests.
#[derive(Debug, Clone)]
pub struct Taskmaster {
    assessor: ComplexityAssessor,
    decomposer: Decomposer,
    strict_cycles: bool,
    minutes_per_task: f64,
}

impl Taskmaster {
    pub fn new(config: &Config) -> Result<Self> {
        config.validate()?;
        let profiles = ProfileSet::from_config(&config.profiles, &config.routing)?;
        let classifier = Classifier::new(profiles, &config.routing);
        Ok(Self {
            assessor: ComplexityAssessor::new(config.complexity.clone()),
            decomposer: Decomposer::new(classifier),
            strict_cycles: config.strict_cycles,
            minutes_per_task: config.effective_minutes_per_task(),
        })
    }

    pub fn classifier(&self) -> &Classifier {
        self.decomposer.classifier()
    }

    /// Routing only, without decomposition.
    pub fn route(&self, text: &str) -> RouteOutcome {
        self.classifier().route(text)
    }

    /// Order subtasks, rejecting cycles when strict mode is on.
    pub fn order(&self, subtasks: Vec<Subtask>) -> Result<OrderedBatch> {
        let batch = DependencyGraph::from_subtasks(subtasks).sort(BatchId::new());
        if self.strict_cycles {
            if let Some(edge) = batch.tolerated_cycles.first() {
                return Err(Error::CycleRejected {
                    from: edge.dependent.clone(),
                    to: edge.dependency.clone(),
                });
            }
        }
        Ok(batch)
    }

    /// Build the ordered batch for a request. No I/O.
    pub fn plan(&self, text: &str) -> Result<Plan> {
        let request = text.trim();
        if request.is_empty() {
            return Err(Error::Validation("Request text is empty".to_string()));
        }

        let (complexity, complexity_rule) = self.assessor.assess_with_rule(request);
        let subtasks = self.decomposer.decompose(request, complexity);
        let batch = self.order(subtasks)?;
        let summary = WorkloadSummary::from_batch(&batch, self.minutes_per_task);
        tlog_debug!(
            "plan: {} ({:?}) -> batch {} with {}",
            complexity,
            complexity_rule,
            batch.batch_id.short(),
            summary
        );

        Ok(Plan {
            request: request.to_string(),
            complexity,
            complexity_rule,
            batch,
            summary,
        })
    }

    /// Plan a request and write its batch to `store`.
    pub fn dispatch(&self, text: &str, store: &dyn QueueStore) -> Result<DispatchReport> {
        let plan = self.plan(text)?;
        let context = format!("{} Original request: {}", DEFAULT_CONTEXT, plan.request);
        let records = QueueWriter::new(store)
            .with_context(context)
            .enqueue(&plan.batch)?;

        let report = DispatchReport { plan, records };
        // The batch is already durable; a missing activity line is not worth failing for.
        if let Err(e) = store.record_activity(&report.activity_line()) {
            tlog_warn!("Could not record activity: {}", e);
        }
        tlog!(
            "Dispatched {} request as batch {}: {}",
            report.plan.complexity,
            report.plan.batch.batch_id.short(),
            report.plan.summary
        );
        Ok(report)
    }
}

impl Default for Taskmaster {
    fn default() -> Self {
        Self {
            assessor: ComplexityAssessor::default(),
            decomposer: Decomposer::default(),
            strict_cycles: false,
            minutes_per_task: crate::config::DEFAULT_MINUTES_PER_TASK,
        }
    }
}
