//! Capability profiles and override rules.
//!
//! A profile is a keyword table and a pattern table for one worker role.
//! Override rules are checked before scoring: a rule with a forced set
//! decides the routing outright, a companion-only rule adds one extra role
//! to whatever the scoring produced.

use regex::{Regex, RegexBuilder};
use std::sync::LazyLock;

use crate::config::{ProfileConfig, RoutingConfig};
use crate::core::Capability;
use crate::{tlog_debug, Error, Result};

const FRONTEND_KEYWORDS: &[&str] = &[
    "button",
    "component",
    "page",
    "layout",
    "style",
    "css",
    "animation",
    "responsive",
    "mobile",
    "form",
    "modal",
    "navbar",
    "sidebar",
    "theme",
    "icon",
    "dropdown",
    "tooltip",
    "screen",
    "react",
    "tailwind",
    "frontend",
    "display",
    "render",
    "design",
    "color",
    "font",
];

const FRONTEND_PATTERNS: &[&str] = &[
    r"\b(fix|update|change|tweak|restyle)\b.*\b(button|page|form|layout|style|modal|animation)s?\b",
    r"\b(make|look)\b.*\b(pretty|nicer|cleaner|responsive|consistent)\b",
    r"\b(ui|ux)\b",
    r"\b(dark|light) mode\b",
];

const BACKEND_KEYWORDS: &[&str] = &[
    "api",
    "endpoint",
    "database",
    "schema",
    "server",
    "query",
    "migration",
    "supabase",
    "postgres",
    "table",
    "webhook",
    "cron",
    "backend",
    "storage",
    "cache",
    "index",
    "rls",
    "payload",
    "sync",
    "import",
];

const BACKEND_PATTERNS: &[&str] = &[
    r"\b(create|add|build|design)\b.*\b(api|endpoint|table|schema|migration)s?\b",
    r"\b(database|db)\b.*\b(migration|schema|query|index|policy)\b",
    r"\b(rest|graphql|sql|crud)\b",
    r"\bedge functions?\b",
];

const TESTING_KEYWORDS: &[&str] = &[
    "test",
    "coverage",
    "e2e",
    "regression",
    "verify",
    "validate",
    "jest",
    "vitest",
    "playwright",
    "assert",
    "mock",
    "fixture",
    "flaky",
];

const TESTING_PATTERNS: &[&str] = &[
    r"\b(write|add|create|fix)\b.*\btests?\b",
    r"\b(unit|integration|e2e|end-to-end|smoke)\s+tests?\b",
    r"\btest\s+(coverage|suite|plan)\b",
    r"\bqa\b",
];

/// Login-ish phrasing always needs both sides of the stack.
const AUTH_FLOW_TRIGGER: &str =
    r"\b(login|log in|sign[ -]?in|sign[ -]?up|registration|password reset|oauth)\b";

/// Explicit full-stack requests need every built-in role.
const FULL_STACK_TRIGGER: &str = r"\b(full[ -]?stack|end[ -]to[ -]end feature)\b";

/// New-feature phrasing brings a testing companion along.
const NEW_FEATURE_TRIGGER: &str =
    r"\b(new feature|(add|build|create|implement) (a |an )?new)\b";

static BUILTIN: LazyLock<ProfileSet> = LazyLock::new(|| {
    let weights = RoutingConfig::default();
    let profile = |name: Capability, keywords: &[&str], patterns: &[&str]| {
        CapabilityProfile::new(name, keywords, patterns, &weights).unwrap()
    };
    let rule = |trigger: &str| compile(trigger).unwrap();

    ProfileSet {
        profiles: vec![
            profile(Capability::frontend(), FRONTEND_KEYWORDS, FRONTEND_PATTERNS),
            profile(Capability::backend(), BACKEND_KEYWORDS, BACKEND_PATTERNS),
            profile(Capability::testing(), TESTING_KEYWORDS, TESTING_PATTERNS),
        ],
        rules: vec![
            OverrideRule {
                trigger: rule(FULL_STACK_TRIGGER),
                forced: Some(vec![
                    Capability::frontend(),
                    Capability::backend(),
                    Capability::testing(),
                ]),
                companion: None,
            },
            OverrideRule {
                trigger: rule(AUTH_FLOW_TRIGGER),
                forced: Some(vec![Capability::frontend(), Capability::backend()]),
                companion: None,
            },
            OverrideRule {
                trigger: rule(NEW_FEATURE_TRIGGER),
                forced: None,
                companion: Some(Capability::testing()),
            },
        ],
    }
});

fn compile(pattern: &str) -> Result<Regex> {
    Ok(RegexBuilder::new(pattern).case_insensitive(true).build()?)
}

/// Keyword and pattern tables for one worker role.
#[derive(Debug, Clone)]
pub struct CapabilityProfile {
    pub name: Capability,
    /// Lower-cased, deduplicated.
    pub keywords: Vec<String>,
    pub patterns: Vec<Regex>,
    pub keyword_weight: u32,
    pub pattern_weight: u32,
    /// Tier given to subtasks created for this role without a canonical stage.
    pub tier: u8,
}

impl CapabilityProfile {
    pub fn new<K, P>(
        name: Capability,
        keywords: &[K],
        patterns: &[P],
        weights: &RoutingConfig,
    ) -> Result<Self>
    where
        K: AsRef<str>,
        P: AsRef<str>,
    {
        let mut normalized: Vec<String> = Vec::with_capacity(keywords.len());
        for keyword in keywords {
            let keyword = keyword.as_ref().trim().to_lowercase();
            if !keyword.is_empty() && !normalized.contains(&keyword) {
                normalized.push(keyword);
            }
        }
        let patterns = patterns
            .iter()
            .map(|p| compile(p.as_ref()))
            .collect::<Result<Vec<_>>>()?;
        let tier = name.default_tier();

        Ok(Self {
            name,
            keywords: normalized,
            patterns,
            keyword_weight: weights.keyword_weight,
            pattern_weight: weights.pattern_weight,
            tier,
        })
    }

    /// Score `text`: each keyword found counts once, each matching pattern counts once.
    pub fn score(&self, text: &str) -> u32 {
        let lower = text.to_lowercase();
        let keyword_hits = self
            .keywords
            .iter()
            .filter(|k| lower.contains(k.as_str()))
            .count() as u32;
        let pattern_hits = self.patterns.iter().filter(|p| p.is_match(text)).count() as u32;
        keyword_hits * self.keyword_weight + pattern_hits * self.pattern_weight
    }
}

/// A phrasing that decides routing before any scoring happens.
#[derive(Debug, Clone)]
pub struct OverrideRule {
    pub trigger: Regex,
    /// When set and the trigger matches, scoring is skipped and these roles win.
    pub forced: Option<Vec<Capability>>,
    /// Extra role added whenever the trigger matches.
    pub companion: Option<Capability>,
}

impl OverrideRule {
    pub fn matches(&self, text: &str) -> bool {
        self.trigger.is_match(text)
    }
}

/// The immutable profile table the classifier scores against.
#[derive(Debug, Clone)]
pub struct ProfileSet {
    pub profiles: Vec<CapabilityProfile>,
    pub rules: Vec<OverrideRule>,
}

impl ProfileSet {
    /// The frontend/backend/testing profiles and their override rules.
    pub fn builtin() -> Self {
        BUILTIN.clone()
    }

    /// Built-in profiles re-weighted and extended with user-defined profiles.
    ///
    /// A configured profile replaces the built-in of the same name; any other
    /// name adds a new capability after the built-ins.
    pub fn from_config(extra: &[ProfileConfig], weights: &RoutingConfig) -> Result<Self> {
        let mut set = Self::builtin();
        for profile in &mut set.profiles {
            profile.keyword_weight = weights.keyword_weight;
            profile.pattern_weight = weights.pattern_weight;
        }

        for cfg in extra {
            if !Capability::is_valid_name(&cfg.name) {
                return Err(Error::Validation(format!(
                    "Invalid capability name {:?}: use lowercase letters, digits or _",
                    cfg.name
                )));
            }
            let mut profile =
                CapabilityProfile::new(Capability::new(&cfg.name), &cfg.keywords, &cfg.patterns, weights)?;
            if let Some(tier) = cfg.tier {
                profile.tier = tier;
            }
            match set.profiles.iter_mut().find(|p| p.name == profile.name) {
                Some(existing) => {
                    tlog_debug!("Profile {} replaced from config", profile.name);
                    *existing = profile;
                }
                None => {
                    tlog_debug!("Profile {} added from config", profile.name);
                    set.profiles.push(profile);
                }
            }
        }
        Ok(set)
    }

    pub fn profile(&self, name: &Capability) -> Option<&CapabilityProfile> {
        self.profiles.iter().find(|p| &p.name == name)
    }

    pub fn capabilities(&self) -> Vec<Capability> {
        self.profiles.iter().map(|p| p.name.clone()).collect()
    }

    /// Tier for a role, falling back to its default when no profile defines it.
    pub fn tier_for(&self, name: &Capability) -> u8 {
        self.profile(name)
            .map(|p| p.tier)
            .unwrap_or_else(|| name.default_tier())
    }
}

impl Default for ProfileSet {
    fn default() -> Self {
        Self::builtin()
    }
}
