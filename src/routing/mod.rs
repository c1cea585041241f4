//! Capability routing: profile tables and the classifier that scores them.

pub mod classifier;
pub mod profile;

pub use classifier::{
    Classifier, DecisionSource, RouteOutcome, RoutingDecision, EXAMPLE_PHRASINGS,
};
pub use profile::{CapabilityProfile, OverrideRule, ProfileSet};
