//! Capability classifier.
//!
//! Scores a request against every [`CapabilityProfile`] and picks the
//! winning role set. Override rules run first; when no profile scores, two
//! cheap heuristics route display-ish requests to frontend and data-ish
//! requests to backend before giving up as ambiguous.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;

use crate::config::RoutingConfig;
use crate::core::Capability;
use crate::routing::profile::ProfileSet;
use crate::tlog_debug;

static DISPLAY_HINT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(show|shows|display|look|looks|see|visible|appear|appears|view|colou?r|align|spacing|broken image)\b")
        .unwrap()
});

static DATA_HINT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(save|saves|saving|store|stored|persist|record|records|fetch|load|loading|data|report|export|count|total)\b")
        .unwrap()
});

/// Phrasings shown to a requester when routing is ambiguous.
pub const EXAMPLE_PHRASINGS: &[&str] = &[
    "Fix the submit button animation on the booking form",
    "Add an API endpoint that returns upcoming shows",
    "Write integration tests for the invoice flow",
    "Build a new comedian profile page with availability calendar",
];

/// How a routing decision was reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecisionSource {
    /// An override rule forced the role set.
    Override,
    /// Profile scores selected the roles.
    Scored,
    /// No profile scored; a display/data heuristic picked the role.
    Heuristic,
    /// Nothing matched.
    Ambiguous,
}

impl std::fmt::Display for DecisionSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DecisionSource::Override => write!(f, "override"),
            DecisionSource::Scored => write!(f, "scored"),
            DecisionSource::Heuristic => write!(f, "heuristic"),
            DecisionSource::Ambiguous => write!(f, "ambiguous"),
        }
    }
}

/// Which roles should own a request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoutingDecision {
    pub capabilities: Vec<Capability>,
    /// True iff nothing scored and no heuristic matched; `capabilities` is then empty.
    pub ambiguous: bool,
    pub source: DecisionSource,
    /// Profile scores in profile order. Empty when an override decided.
    #[serde(default)]
    pub scores: Vec<(Capability, u32)>,
}

impl RoutingDecision {
    fn ambiguous(scores: Vec<(Capability, u32)>) -> Self {
        Self {
            capabilities: Vec::new(),
            ambiguous: true,
            source: DecisionSource::Ambiguous,
            scores,
        }
    }

    /// First selected role, in profile order.
    pub fn primary(&self) -> Option<&Capability> {
        self.capabilities.first()
    }

    pub fn includes(&self, capability: &Capability) -> bool {
        self.capabilities.contains(capability)
    }

    pub fn score_of(&self, capability: &Capability) -> Option<u32> {
        self.scores
            .iter()
            .find(|(c, _)| c == capability)
            .map(|(_, s)| *s)
    }
}

/// Result of the routing-only entry point.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteOutcome {
    pub decision: RoutingDecision,
    /// Present only for ambiguous requests.
    pub suggestion: Option<String>,
}

/// Scores requests against a read-only [`ProfileSet`].
#[derive(Debug, Clone)]
pub struct Classifier {
    profiles: ProfileSet,
    multi_select_ratio: f64,
}

impl Classifier {
    pub fn new(profiles: ProfileSet, routing: &RoutingConfig) -> Self {
        Self {
            profiles,
            multi_select_ratio: routing.multi_select_ratio,
        }
    }

    pub fn profiles(&self) -> &ProfileSet {
        &self.profiles
    }

    /// Score every profile against `text`, in profile order.
    pub fn scores(&self, text: &str) -> Vec<(Capability, u32)> {
        self.profiles
            .profiles
            .iter()
            .map(|p| (p.name.clone(), p.score(text)))
            .collect()
    }

    pub fn classify(&self, text: &str) -> RoutingDecision {
        let mut forced: Option<Vec<Capability>> = None;
        let mut companions: Vec<Capability> = Vec::new();

        for rule in self.profiles.rules.iter().filter(|r| r.matches(text)) {
            if forced.is_none() {
                forced = rule.forced.clone();
            }
            if let Some(companion) = &rule.companion {
                if !companions.contains(companion) {
                    companions.push(companion.clone());
                }
            }
        }

        if let Some(capabilities) = forced {
            let decision = RoutingDecision {
                capabilities: with_companions(capabilities, &companions),
                ambiguous: false,
                source: DecisionSource::Override,
                scores: Vec::new(),
            };
            tlog_debug!("classify: override -> {:?}", decision.capabilities);
            return decision;
        }

        let scores = self.scores(text);
        let max = scores.iter().map(|(_, s)| *s).max().unwrap_or(0);

        let (capabilities, source) = if max == 0 {
            let mut fallback = Vec::new();
            if DISPLAY_HINT_RE.is_match(text) {
                fallback.push(Capability::frontend());
            }
            if DATA_HINT_RE.is_match(text) {
                fallback.push(Capability::backend());
            }
            (fallback, DecisionSource::Heuristic)
        } else {
            let threshold = self.multi_select_ratio * f64::from(max);
            let selected = scores
                .iter()
                .filter(|(_, s)| f64::from(*s) >= threshold)
                .map(|(c, _)| c.clone())
                .collect();
            (selected, DecisionSource::Scored)
        };

        if capabilities.is_empty() {
            if companions.is_empty() {
                tlog_debug!("classify: ambiguous, scores={:?}", scores);
                return RoutingDecision::ambiguous(scores);
            }
            // A companion alone is still a confident routing.
            return RoutingDecision {
                capabilities: companions,
                ambiguous: false,
                source: DecisionSource::Override,
                scores,
            };
        }

        let decision = RoutingDecision {
            capabilities: with_companions(capabilities, &companions),
            ambiguous: false,
            source,
            scores,
        };
        tlog_debug!(
            "classify: {} -> {:?} (scores={:?})",
            decision.source,
            decision.capabilities,
            decision.scores
        );
        decision
    }

    /// Routing-only entry point: the decision plus a hint when it is ambiguous.
    pub fn route(&self, text: &str) -> RouteOutcome {
        let decision = self.classify(text);
        let suggestion = decision.ambiguous.then(|| suggestion_message(&self.profiles));
        RouteOutcome {
            decision,
            suggestion,
        }
    }
}

impl Default for Classifier {
    fn default() -> Self {
        Self::new(ProfileSet::builtin(), &RoutingConfig::default())
    }
}

fn with_companions(mut capabilities: Vec<Capability>, companions: &[Capability]) -> Vec<Capability> {
    for companion in companions {
        if !capabilities.contains(companion) {
            capabilities.push(companion.clone());
        }
    }
    capabilities
}

fn suggestion_message(profiles: &ProfileSet) -> String {
    let roles: Vec<String> = profiles.capabilities().iter().map(|c| c.to_string()).collect();
    let mut msg = format!(
        "Could not tell which role should handle this request (known roles: {}). Try naming the part of the system involved, for example:",
        roles.join(", ")
    );
    for example in EXAMPLE_PHRASINGS {
        msg.push_str("\n  - ");
        msg.push_str(example);
    }
    msg
}
