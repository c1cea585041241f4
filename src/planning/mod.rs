//! Request planning: complexity assessment, decomposition, ordering and summaries.

pub mod complexity;
pub mod decomposer;
pub mod pipeline;
pub mod summary;

pub use complexity::{conjunction_count, ComplexityAssessor, ComplexityRule, ComplexityTag};
pub use decomposer::{Decomposer, FeatureArea, Stage, FEATURE_AREAS};
pub use pipeline::{DispatchReport, Plan, Taskmaster};
pub use summary::WorkloadSummary;
