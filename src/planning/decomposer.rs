//! Request decomposition into dependency-linked subtasks.
//!
//! Mega requests are scanned for feature areas; each area expands into the
//! canonical stage chain schema → api → types → components → page, followed
//! by aggregated testing subtasks. Multi requests get a short
//! backend → frontend → testing chain. Simple requests, and anything the
//! scans cannot place, fall back to the classifier.

use regex::Regex;
use std::sync::LazyLock;

use crate::core::{validate_subtasks, Capability, Subtask};
use crate::planning::complexity::ComplexityTag;
use crate::routing::{Classifier, RoutingDecision};
use crate::{tlog_debug, tlog_warn};

/// Canonical stages, in tier order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Schema,
    Api,
    Types,
    Components,
    Page,
}

impl Stage {
    pub const ALL: [Stage; 5] = [
        Stage::Schema,
        Stage::Api,
        Stage::Types,
        Stage::Components,
        Stage::Page,
    ];

    pub fn tier(self) -> u8 {
        match self {
            Stage::Schema => 1,
            Stage::Api => 2,
            Stage::Types => 3,
            Stage::Components => 4,
            Stage::Page => 5,
        }
    }

    pub fn capability(self) -> Capability {
        match self {
            Stage::Schema | Stage::Api => Capability::backend(),
            Stage::Types | Stage::Components | Stage::Page => Capability::frontend(),
        }
    }

    fn slug(self) -> &'static str {
        match self {
            Stage::Schema => "schema",
            Stage::Api => "api",
            Stage::Types => "types",
            Stage::Components => "components",
            Stage::Page => "page",
        }
    }

    fn previous(self) -> Option<Stage> {
        match self {
            Stage::Schema => None,
            Stage::Api => Some(Stage::Schema),
            Stage::Types => Some(Stage::Api),
            Stage::Components => Some(Stage::Types),
            Stage::Page => Some(Stage::Components),
        }
    }

    /// Subtask id for this stage of `area`.
    pub fn subtask_id(self, area: &str) -> String {
        format!("{}-{}-{}", self.capability(), area, self.slug())
    }
}

/// A feature area the mega scan can recognize, with a directive per stage.
pub struct FeatureArea {
    pub key: &'static str,
    signal: &'static str,
    directives: [&'static str; 5],
}

impl FeatureArea {
    pub fn directive(&self, stage: Stage) -> &'static str {
        self.directives[stage.tier() as usize - 1]
    }
}

pub const FEATURE_AREAS: &[FeatureArea] = &[
    FeatureArea {
        key: "profile",
        signal: r"\b(profiles?|bio|about)\b",
        directives: [
            "Create database schema for profiles (bio, links, preferences)",
            "Create CRUD API endpoints for profiles",
            "Create TypeScript types for profiles",
            "Build profile components (bio, links, media gallery)",
            "Create profile page with edit capabilities",
        ],
    },
    FeatureArea {
        key: "availability",
        signal: r"\b(calendars?|availability|schedul\w*)\b",
        directives: [
            "Design availability/calendar database schema",
            "Create availability management API endpoints",
            "Create TypeScript types for availability slots",
            "Build availability calendar component with date picker",
            "Integrate the availability calendar into the profile and booking views",
        ],
    },
    FeatureArea {
        key: "booking",
        signal: r"\b(bookings?|requests?|reservations?)\b",
        directives: [
            "Create booking request database schema with status workflow",
            "Implement booking request API with validation",
            "Create TypeScript types for booking requests and statuses",
            "Create booking request form with validation",
            "Build booking requests list with status management",
        ],
    },
    FeatureArea {
        key: "analytics",
        signal: r"\b(analytics|stats|statistics|metrics|performance)\b",
        directives: [
            "Create analytics aggregation tables and views",
            "Create analytics data aggregation endpoints",
            "Create TypeScript types for analytics series",
            "Build analytics chart components",
            "Create analytics dashboard page",
        ],
    },
    FeatureArea {
        key: "revenue",
        signal: r"\b(revenue|payments?|invoices?|invoicing|billing)\b",
        directives: [
            "Create revenue and payment tracking schema",
            "Implement revenue tracking and reporting API",
            "Create TypeScript types for revenue records",
            "Build revenue summary and payment history components",
            "Create revenue reporting page",
        ],
    },
    FeatureArea {
        key: "notifications",
        signal: r"\b(emails?|notifications?|alerts?|reminders?)\b",
        directives: [
            "Create notification preferences and outbox schema",
            "Implement notification dispatch API and triggers",
            "Create TypeScript types for notifications",
            "Build notification list and preference components",
            "Integrate notification center into the app shell",
        ],
    },
    FeatureArea {
        key: "mobile",
        signal: r"\b(mobile|app|responsive)\b",
        directives: [
            "Add device and session fields needed for mobile clients",
            "Expose lightweight API responses for mobile views",
            "Create shared TypeScript types for mobile layouts",
            "Make all new components mobile-responsive",
            "Verify every new page renders correctly on small screens",
        ],
    },
    FeatureArea {
        key: "admin",
        signal: r"\b(admin\w*|dashboards?|management)\b",
        directives: [
            "Create admin roles and audit log schema",
            "Implement admin management API endpoints with role checks",
            "Create TypeScript types for admin views",
            "Build admin tables and moderation components",
            "Create admin dashboard page",
        ],
    },
    FeatureArea {
        key: "social",
        signal: r"\b(social|instagram|facebook|twitter|tiktok)\b",
        directives: [
            "Create social account links and post schedule schema",
            "Implement social posting and account linking API",
            "Create TypeScript types for social posts",
            "Build social post composer and feed components",
            "Create social scheduling page",
        ],
    },
    FeatureArea {
        key: "media",
        signal: r"\b(photos?|videos?|media|gallery|galleries)\b",
        directives: [
            "Create media asset and tagging schema",
            "Implement media upload and storage API",
            "Create TypeScript types for media assets",
            "Build media upload and gallery components",
            "Create media library page",
        ],
    },
];

static AREA_SIGNALS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    FEATURE_AREAS
        .iter()
        .map(|a| Regex::new(&format!("(?i){}", a.signal)).unwrap())
        .collect()
});

static UI_SIGNAL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(ui|ux|buttons?|components?|pages?|forms?|modals?|layouts?|styles?|styling|css|display|views?|screens?|dashboards?|login|log in|sign[ -]?(in|up)|frontend|responsive|mobile|charts?|calendars?)\b").unwrap()
});

static DATA_SIGNAL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(apis?|endpoints?|database|db|schemas?|tables?|quer(y|ies)|servers?|backend|o?auth\w*|data|storage|migrations?|webhooks?|integrations?|sync|import|export|stripe|emails?)\b").unwrap()
});

static QUALITY_SIGNAL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(tests?|testing|qa|quality|critical|secure|security|payments?|validat\w*|verif\w*|reliab\w*)\b").unwrap()
});

/// Substring match, so "authentication" and "OAuth" both count.
static RISK_SIGNAL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)(critical|payment|auth|security)").unwrap());

pub const FRONTEND_TESTS_ID: &str = "testing-frontend-components";
pub const BACKEND_TESTS_ID: &str = "testing-backend-api";
pub const INTEGRATION_TESTS_ID: &str = "testing-integration";

/// Expands requests into subtasks according to their complexity tag.
#[derive(Debug, Clone)]
pub struct Decomposer {
    classifier: Classifier,
}

impl Decomposer {
    pub fn new(classifier: Classifier) -> Self {
        Self { classifier }
    }

    pub fn classifier(&self) -> &Classifier {
        &self.classifier
    }

    /// Produce the unordered subtasks for `text`, with dependencies populated.
    pub fn decompose(&self, text: &str, tag: ComplexityTag) -> Vec<Subtask> {
        let subtasks = match tag {
            ComplexityTag::Mega => self.decompose_mega(text),
            ComplexityTag::Multi => self.decompose_multi(text),
            ComplexityTag::Simple => self.decompose_simple(text),
        };
        tlog_debug!("decompose: {} -> {} subtasks", tag, subtasks.len());
        validate_subtasks(subtasks)
    }

    /// Feature areas mentioned in `text`, in table order.
    pub fn detect_areas(text: &str) -> Vec<&'static FeatureArea> {
        FEATURE_AREAS
            .iter()
            .zip(AREA_SIGNALS.iter())
            .filter(|(_, re)| re.is_match(text))
            .map(|(area, _)| area)
            .collect()
    }

    fn decompose_mega(&self, text: &str) -> Vec<Subtask> {
        let areas = Self::detect_areas(text);
        if areas.is_empty() {
            tlog_debug!("decompose_mega: no feature area matched, using classifier");
            return self.from_classifier(text);
        }

        let mut tasks = Vec::new();
        for stage in Stage::ALL {
            for area in &areas {
                let mut subtask = Subtask::new(
                    &stage.subtask_id(area.key),
                    stage.capability(),
                    stage.tier(),
                    area.directive(stage),
                );
                if let Some(previous) = stage.previous() {
                    subtask = subtask.depends_on([previous.subtask_id(area.key)]);
                }
                tasks.push(subtask);
            }
        }

        let ids_for = |tasks: &[Subtask], capability: Capability| -> Vec<String> {
            tasks
                .iter()
                .filter(|t| t.capability == capability)
                .map(|t| t.id.clone())
                .collect()
        };
        let frontend_ids = ids_for(&tasks, Capability::frontend());
        let backend_ids = ids_for(&tasks, Capability::backend());

        let mut testing_ids = Vec::new();
        if !frontend_ids.is_empty() {
            tasks.push(
                Subtask::new(
                    FRONTEND_TESTS_ID,
                    Capability::testing(),
                    7,
                    "Write comprehensive tests for all new UI components",
                )
                .depends_on(frontend_ids),
            );
            testing_ids.push(FRONTEND_TESTS_ID);
        }
        if !backend_ids.is_empty() {
            tasks.push(
                Subtask::new(
                    BACKEND_TESTS_ID,
                    Capability::testing(),
                    7,
                    "Write API tests for all new endpoints",
                )
                .depends_on(backend_ids),
            );
            testing_ids.push(BACKEND_TESTS_ID);
        }
        tasks.push(
            Subtask::new(
                INTEGRATION_TESTS_ID,
                Capability::testing(),
                8,
                "Create integration tests for the complete feature flow",
            )
            .depends_on(testing_ids),
        );
        tasks
    }

    fn decompose_multi(&self, text: &str) -> Vec<Subtask> {
        let needs_frontend = UI_SIGNAL_RE.is_match(text);
        let needs_backend = DATA_SIGNAL_RE.is_match(text);
        let quality = QUALITY_SIGNAL_RE.is_match(text);
        tlog_debug!(
            "decompose_multi: frontend={} backend={} quality={}",
            needs_frontend,
            needs_backend,
            quality
        );

        if !needs_frontend && !needs_backend && !quality {
            return self.from_classifier(text);
        }

        let mut tasks = Vec::new();
        if needs_backend {
            tasks.push(Subtask::new(
                "backend-task",
                Capability::backend(),
                Capability::backend().default_tier(),
                &format!("Implement the data layer and API changes for: {}", text),
            ));
        }
        if needs_frontend {
            let mut frontend = Subtask::new(
                "frontend-task",
                Capability::frontend(),
                Capability::frontend().default_tier(),
                &format!("Implement the user interface for: {}", text),
            );
            if needs_backend {
                frontend = frontend.depends_on(["backend-task"]);
            }
            tasks.push(frontend);
        }
        if (needs_frontend && needs_backend) || quality {
            let deps: Vec<String> = tasks.iter().map(|t| t.id.clone()).collect();
            tasks.push(
                Subtask::new(
                    "testing-task",
                    Capability::testing(),
                    Capability::testing().default_tier(),
                    &format!("Write tests covering: {}", text),
                )
                .depends_on(deps),
            );
        }
        tasks
    }

    fn decompose_simple(&self, text: &str) -> Vec<Subtask> {
        let decision = self.classifier.classify(text);
        let capability = match decision.primary() {
            Some(c) => c.clone(),
            None => {
                tlog_warn!("Ambiguous request, defaulting to frontend: {:?}", text);
                Capability::frontend()
            }
        };

        let primary = self.subtask_for(&capability, text);
        let primary_id = primary.id.clone();
        let mut tasks = vec![primary];

        if !capability.is_testing() && RISK_SIGNAL_RE.is_match(text) {
            tasks.push(
                Subtask::new(
                    "testing-task",
                    Capability::testing(),
                    self.classifier.profiles().tier_for(&Capability::testing()),
                    &format!("Verify the change with tests: {}", text),
                )
                .depends_on([primary_id]),
            );
        }
        tasks
    }

    /// One independent subtask per routed capability.
    fn from_classifier(&self, text: &str) -> Vec<Subtask> {
        let decision: RoutingDecision = self.classifier.classify(text);
        if decision.ambiguous {
            tlog_warn!("Ambiguous request, defaulting to frontend: {:?}", text);
            return vec![self.subtask_for(&Capability::frontend(), text)];
        }
        decision
            .capabilities
            .iter()
            .map(|c| self.subtask_for(c, text))
            .collect()
    }

    fn subtask_for(&self, capability: &Capability, text: &str) -> Subtask {
        Subtask::new(
            &format!("{}-task", capability),
            capability.clone(),
            self.classifier.profiles().tier_for(capability),
            text,
        )
    }
}

impl Default for Decomposer {
    fn default() -> Self {
        Self::new(Classifier::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MEGA_REQUEST: &str = "Build a complete comedian management system with profile pages, availability calendar, booking requests, performance analytics, revenue tracking, and admin dashboard";

    fn ids(tasks: &[Subtask]) -> Vec<&str> {
        tasks.iter().map(|t| t.id.as_str()).collect()
    }

    fn find<'a>(tasks: &'a [Subtask], id: &str) -> &'a Subtask {
        tasks.iter().find(|t| t.id == id).unwrap()
    }

    #[test]
    fn test_stage_ids_and_tiers() {
        assert_eq!(Stage::Schema.subtask_id("profile"), "backend-profile-schema");
        assert_eq!(Stage::Page.subtask_id("admin"), "frontend-admin-page");
        assert_eq!(Stage::Types.tier(), 3);
        assert_eq!(Stage::Api.capability(), Capability::backend());
    }

    #[test]
    fn test_detect_areas() {
        let keys: Vec<&str> = Decomposer::detect_areas(MEGA_REQUEST)
            .iter()
            .map(|a| a.key)
            .collect();
        assert_eq!(
            keys,
            vec!["profile", "availability", "booking", "analytics", "revenue", "admin"]
        );
    }

    #[test]
    fn test_mobile_area_needs_whole_word_app() {
        let keys: Vec<&str> = Decomposer::detect_areas("apply a new approach")
            .iter()
            .map(|a| a.key)
            .collect();
        assert!(!keys.contains(&"mobile"));
    }

    #[test]
    fn test_mega_chains_per_area() {
        let tasks = Decomposer::default().decompose(MEGA_REQUEST, ComplexityTag::Mega);
        // 6 areas x 5 stages + 3 testing subtasks
        assert_eq!(tasks.len(), 33);

        let api = find(&tasks, "backend-booking-api");
        assert_eq!(api.dependencies, vec!["backend-booking-schema"]);
        assert_eq!(api.priority_tier, 2);
        let schema = find(&tasks, "backend-booking-schema");
        assert!(schema.dependencies.is_empty());
        assert_eq!(
            find(&tasks, "frontend-revenue-types").dependencies,
            vec!["backend-revenue-api"]
        );
    }

    #[test]
    fn test_mega_emits_stage_major_order() {
        let tasks = Decomposer::default().decompose(MEGA_REQUEST, ComplexityTag::Mega);
        let tiers: Vec<u8> = tasks.iter().map(|t| t.priority_tier).collect();
        let mut sorted = tiers.clone();
        sorted.sort();
        assert_eq!(tiers, sorted);
    }

    #[test]
    fn test_mega_testing_aggregation() {
        let tasks = Decomposer::default().decompose(MEGA_REQUEST, ComplexityTag::Mega);
        let frontend_tests = find(&tasks, FRONTEND_TESTS_ID);
        assert_eq!(frontend_tests.dependencies.len(), 18);
        assert!(frontend_tests
            .dependencies
            .iter()
            .all(|d| d.starts_with("frontend-")));
        let backend_tests = find(&tasks, BACKEND_TESTS_ID);
        assert_eq!(backend_tests.dependencies.len(), 12);

        let integration = find(&tasks, INTEGRATION_TESTS_ID);
        assert_eq!(integration.priority_tier, 8);
        assert_eq!(
            integration.dependencies,
            vec![FRONTEND_TESTS_ID, BACKEND_TESTS_ID]
        );
        assert_eq!(tasks.last().unwrap().id, INTEGRATION_TESTS_ID);
    }

    #[test]
    fn test_mega_without_areas_uses_classifier() {
        let tasks = Decomposer::default()
            .decompose("Redo the entire navbar theme", ComplexityTag::Mega);
        assert_eq!(ids(&tasks), vec!["frontend-task"]);
        assert_eq!(tasks[0].priority_tier, 4);
    }

    #[test]
    fn test_multi_oauth_login() {
        let tasks = Decomposer::default().decompose(
            "Implement OAuth login with Google and GitHub",
            ComplexityTag::Multi,
        );
        assert_eq!(ids(&tasks), vec!["backend-task", "frontend-task", "testing-task"]);
        assert_eq!(find(&tasks, "frontend-task").dependencies, vec!["backend-task"]);
        assert_eq!(
            find(&tasks, "testing-task").dependencies,
            vec!["backend-task", "frontend-task"]
        );
    }

    #[test]
    fn test_multi_frontend_only_without_quality() {
        let tasks = Decomposer::default()
            .decompose("Restyle the modal and the navbar", ComplexityTag::Multi);
        assert_eq!(ids(&tasks), vec!["frontend-task"]);
        assert!(tasks[0].dependencies.is_empty());
    }

    #[test]
    fn test_multi_quality_adds_testing() {
        let tasks = Decomposer::default()
            .decompose("Fix the page and add tests", ComplexityTag::Multi);
        assert_eq!(ids(&tasks), vec!["frontend-task", "testing-task"]);
        assert_eq!(tasks[1].dependencies, vec!["frontend-task"]);
    }

    #[test]
    fn test_multi_nothing_detected_delegates() {
        let tasks = Decomposer::default()
            .decompose("Tidy the cron jobs and caches", ComplexityTag::Multi);
        assert_eq!(ids(&tasks), vec!["backend-task"]);
        assert!(tasks[0].dependencies.is_empty());
    }

    #[test]
    fn test_simple_single_subtask() {
        let tasks = Decomposer::default()
            .decompose("Fix the broken submit button animation", ComplexityTag::Simple);
        assert_eq!(ids(&tasks), vec!["frontend-task"]);
        assert_eq!(tasks[0].description, "Fix the broken submit button animation");
    }

    #[test]
    fn test_simple_risk_adds_dependent_testing() {
        let tasks = Decomposer::default()
            .decompose("Fix payment endpoint rounding", ComplexityTag::Simple);
        assert_eq!(ids(&tasks), vec!["backend-task", "testing-task"]);
        assert_eq!(tasks[1].dependencies, vec!["backend-task"]);
    }

    #[test]
    fn test_simple_testing_winner_gets_no_companion() {
        let tasks = Decomposer::default()
            .decompose("Write unit tests for critical code", ComplexityTag::Simple);
        assert_eq!(ids(&tasks), vec!["testing-task"]);
    }

    #[test]
    fn test_simple_ambiguous_defaults_to_frontend() {
        let tasks = Decomposer::default().decompose("make it better", ComplexityTag::Simple);
        assert_eq!(ids(&tasks), vec!["frontend-task"]);
    }

    #[test]
    fn test_over_tagged_simple_request_degrades() {
        let tasks = Decomposer::default().decompose("Fix the modal", ComplexityTag::Mega);
        assert_eq!(tasks.len(), 1);
    }
}
