//! End-to-end planning scenarios.
//!
//! Each test takes a request through assessment, decomposition and ordering
//! with the default configuration and checks the resulting batch.

use taskmaster::config::{Config, ProfileConfig};
use taskmaster::core::{sort, Capability};
use taskmaster::planning::{ComplexityTag, Taskmaster};
use taskmaster::routing::DecisionSource;

use crate::fixtures::{
    assert_dependencies_precede, ids, subtask, MEGA_AREAS, MEGA_REQUEST, OAUTH_REQUEST,
    SIMPLE_REQUEST,
};

/// Given a one-line UI bug report
/// When planned
/// Then one frontend subtask is produced and no testing follow-up
#[test]
fn test_simple_request_routes_to_frontend() {
    let taskmaster = Taskmaster::default();

    let decision = taskmaster.classifier().classify(SIMPLE_REQUEST);
    assert_eq!(decision.capabilities, vec![Capability::frontend()]);
    assert!(!decision.ambiguous);

    let plan = taskmaster.plan(SIMPLE_REQUEST).unwrap();
    assert_eq!(plan.complexity, ComplexityTag::Simple);
    assert_eq!(plan.batch.len(), 1);
    assert_eq!(plan.batch.subtasks[0].capability, Capability::frontend());
    assert_eq!(plan.summary.count(&Capability::testing()), 0);
}

/// Given a login feature touching both sides of the stack
/// When planned
/// Then backend, frontend and a dependent testing subtask are produced in order
#[test]
fn test_oauth_request_chains_backend_frontend_testing() {
    let plan = Taskmaster::default().plan(OAUTH_REQUEST).unwrap();
    assert_eq!(plan.complexity, ComplexityTag::Multi);

    let order = ids(&plan.batch);
    assert_eq!(order, vec!["backend-task", "frontend-task", "testing-task"]);

    let testing = plan.batch.get("testing-task").unwrap();
    assert!(testing.dependencies.contains(&"frontend-task".to_string()));
    assert!(testing.dependencies.contains(&"backend-task".to_string()));
    assert_dependencies_precede(&plan.batch);
}

/// Given a long request naming six feature areas
/// When planned
/// Then each area gets a full stage chain and testing closes the batch
#[test]
fn test_mega_request_expands_every_area() {
    let plan = Taskmaster::default().plan(MEGA_REQUEST).unwrap();
    assert_eq!(plan.complexity, ComplexityTag::Mega);
    assert!(!plan.batch.has_cycles());

    for area in MEGA_AREAS {
        let schema = format!("backend-{}-schema", area);
        let api = plan
            .batch
            .get(&format!("backend-{}-api", area))
            .unwrap_or_else(|| panic!("missing api subtask for {}", area));
        assert!(api.dependencies.contains(&schema));

        let schema_task = plan.batch.get(&schema).unwrap();
        assert!(!schema_task.dependencies.contains(&api.id));

        for stage in ["frontend-{}-types", "frontend-{}-components", "frontend-{}-page"] {
            let id = stage.replace("{}", area);
            assert!(plan.batch.get(&id).is_some(), "missing {}", id);
        }
    }

    let testing_ids: Vec<String> = plan
        .batch
        .iter()
        .filter(|s| s.capability.is_testing() && s.id != "testing-integration")
        .map(|s| s.id.clone())
        .collect();
    assert!(!testing_ids.is_empty());

    let integration = plan.batch.get("testing-integration").unwrap();
    assert!(!integration.dependencies.is_empty());
    for id in &testing_ids {
        assert!(integration.dependencies.contains(id));
    }
    assert_eq!(plan.batch.subtasks.last().unwrap().id, "testing-integration");
    assert_dependencies_precede(&plan.batch);

    assert_eq!(plan.summary.total, plan.batch.len());
    assert_eq!(plan.summary.count(&Capability::backend()), 12);
    assert_eq!(plan.summary.count(&Capability::frontend()), 18);
}

#[test]
fn test_every_plan_respects_dependencies() {
    let taskmaster = Taskmaster::default();
    let requests = [
        SIMPLE_REQUEST,
        OAUTH_REQUEST,
        MEGA_REQUEST,
        "Fix payment endpoint rounding",
        "Add a new modal for invoices, with tests",
        "Redesign the entire social media and photo gallery area",
    ];
    for request in requests {
        let plan = taskmaster.plan(request).unwrap();
        assert!(!plan.batch.is_empty(), "empty batch for {:?}", request);
        assert!(!plan.batch.has_cycles());
        assert_dependencies_precede(&plan.batch);
    }
}

#[test]
fn test_sort_is_repeatable() {
    let subtasks = vec![
        subtask("d", &["b", "c"]),
        subtask("c", &["a"]),
        subtask("b", &["a"]),
        subtask("a", &[]),
        subtask("e", &[]),
    ];
    let first = sort(subtasks.clone());
    let second = sort(subtasks);
    assert_eq!(ids(&first), ids(&second));
    assert_dependencies_precede(&first);
}

/// Given two subtasks that depend on each other
/// When sorted
/// Then sorting terminates and both appear exactly once
#[test]
fn test_cycle_is_tolerated() {
    let batch = sort(vec![subtask("a", &["b"]), subtask("b", &["a"])]);
    let mut order = ids(&batch);
    order.sort();
    assert_eq!(order, vec!["a", "b"]);
    assert_eq!(batch.tolerated_cycles.len(), 1);
}

#[test]
fn test_ambiguous_request_still_plans() {
    let taskmaster = Taskmaster::default();

    let outcome = taskmaster.route("make it better");
    assert!(outcome.decision.ambiguous);
    assert_eq!(outcome.decision.source, DecisionSource::Ambiguous);
    assert!(outcome.suggestion.is_some());

    let plan = taskmaster.plan("make it better").unwrap();
    assert_eq!(ids(&plan.batch), vec!["frontend-task"]);
}

#[test]
fn test_configured_profile_routes_and_sets_tier() {
    let config = Config {
        profiles: vec![ProfileConfig {
            name: "devops".to_string(),
            keywords: vec!["docker".to_string(), "deploy".to_string()],
            patterns: vec![],
            tier: Some(6),
        }],
        ..Config::default()
    };
    let plan = Taskmaster::new(&config)
        .unwrap()
        .plan("deploy the docker image")
        .unwrap();
    assert_eq!(plan.batch.len(), 1);
    let only = &plan.batch.subtasks[0];
    assert_eq!(only.capability, Capability::new("devops"));
    assert_eq!(only.priority_tier, 6);
}
