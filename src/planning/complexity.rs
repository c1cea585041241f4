//! Complexity assessment for incoming requests.
//!
//! A keyword and length heuristic, not a parser. Borderline requests may be
//! tagged one level too high; the decomposer copes with that by producing a
//! small batch.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;

use crate::config::ComplexityConfig;
use crate::tlog_debug;

static MEGA_TRIGGER_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b(comprehensive|entire|everything|complete\s+(\w+\s+){0,3}(system|platform|overhaul)|full[\s-]+featured?)\b",
    )
    .unwrap()
});

static MULTI_TRIGGER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\b(and|with|including|also|plus)\b").unwrap());

static SEPARATOR_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[,;&+]").unwrap());

/// How much decomposition a request needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComplexityTag {
    /// One role, one subtask (plus an optional testing follow-up).
    Simple,
    /// A few roles chained together.
    Multi,
    /// Expand into canonical per-feature subtask chains.
    Mega,
}

impl std::fmt::Display for ComplexityTag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ComplexityTag::Simple => write!(f, "simple"),
            ComplexityTag::Multi => write!(f, "multi"),
            ComplexityTag::Mega => write!(f, "mega"),
        }
    }
}

/// Which rule decided the tag, in evaluation order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComplexityRule {
    MegaTrigger,
    MegaLength,
    MultiLength,
    MultiTrigger,
    ConjunctionCount,
    Default,
}

#[derive(Debug, Clone)]
pub struct ComplexityAssessor {
    thresholds: ComplexityConfig,
}

impl ComplexityAssessor {
    pub fn new(thresholds: ComplexityConfig) -> Self {
        Self { thresholds }
    }

    pub fn assess(&self, text: &str) -> ComplexityTag {
        self.assess_with_rule(text).0
    }

    pub fn assess_with_rule(&self, text: &str) -> (ComplexityTag, ComplexityRule) {
        let text = text.trim();
        let length = text.chars().count();

        let result = if MEGA_TRIGGER_RE.is_match(text) {
            (ComplexityTag::Mega, ComplexityRule::MegaTrigger)
        } else if length > self.thresholds.mega_length {
            (ComplexityTag::Mega, ComplexityRule::MegaLength)
        } else if length > self.thresholds.multi_length {
            (ComplexityTag::Multi, ComplexityRule::MultiLength)
        } else if MULTI_TRIGGER_RE.is_match(text) {
            (ComplexityTag::Multi, ComplexityRule::MultiTrigger)
        } else {
            match conjunction_count(text) {
                n if n > 3 => (ComplexityTag::Mega, ComplexityRule::ConjunctionCount),
                n if n > 1 => (ComplexityTag::Multi, ComplexityRule::ConjunctionCount),
                _ => (ComplexityTag::Simple, ComplexityRule::Default),
            }
        };
        tlog_debug!("assess: len={} -> {} via {:?}", length, result.0, result.1);
        result
    }
}

impl Default for ComplexityAssessor {
    fn default() -> Self {
        Self::new(ComplexityConfig::default())
    }
}

/// Conjunction words plus list separators.
pub fn conjunction_count(text: &str) -> usize {
    MULTI_TRIGGER_RE.find_iter(text).count() + SEPARATOR_RE.find_iter(text).count()
}
