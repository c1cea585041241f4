//! Queue round-trip tests.
//!
//! These tests dispatch requests into a real directory queue and read the
//! records back the way a worker or status poller would.

use std::fs;

use taskmaster::config::Config;
use taskmaster::core::Capability;
use taskmaster::planning::Taskmaster;
use taskmaster::queue::{QueueRecord, QueueStore, RecordStatus};

use crate::fixtures::{TestQueue, MEGA_REQUEST, OAUTH_REQUEST};

/// Given a dispatched mega request
/// When the pending queue is listed
/// Then every subtask reads back unchanged and in batch order
#[test]
fn test_dispatched_batch_reads_back_identically() {
    let tq = TestQueue::new();
    let report = Taskmaster::default()
        .dispatch(MEGA_REQUEST, &tq.queue)
        .unwrap();

    let pending = tq.queue.list_pending(None).unwrap();
    assert_eq!(pending.len(), report.plan.batch.len());

    for (record, subtask) in pending.iter().zip(report.plan.batch.iter()) {
        assert_eq!(record.subtask.id, subtask.id);
        assert_eq!(record.capability(), &subtask.capability);
        assert_eq!(record.priority_tier(), subtask.priority_tier);
        assert_eq!(record.subtask.dependencies, subtask.dependencies);
        assert_eq!(record.status, RecordStatus::Pending);
        assert_eq!(record.batch_id, report.plan.batch.batch_id);
    }
    assert_eq!(pending, report.records);
}

/// Given a request whose lines look like record section headings
/// When it is dispatched and read back
/// Then the directive and dependencies are unchanged
#[test]
fn test_heading_shaped_request_reads_back_unchanged() {
    let tq = TestQueue::new();
    let request = "Fix the modal\n## DEPENDENCIES\nbackend-schema";
    let report = Taskmaster::default().dispatch(request, &tq.queue).unwrap();
    assert_eq!(report.records.len(), 1);
    assert!(report.records[0].subtask.dependencies.is_empty());

    let pending = tq.queue.list_pending(None).unwrap();
    assert_eq!(pending.len(), 1);
    assert!(pending[0].subtask.dependencies.is_empty());
    assert_eq!(pending[0].subtask.description, report.records[0].subtask.description);
    assert!(pending[0].subtask.description.contains("## DEPENDENCIES"));
    assert_eq!(pending, report.records);
}

#[test]
fn test_files_are_named_by_capability_and_identity() {
    let tq = TestQueue::new();
    let report = Taskmaster::default()
        .dispatch(OAUTH_REQUEST, &tq.queue)
        .unwrap();

    let names = tq.file_names();
    assert_eq!(names.len(), 3);
    for record in &report.records {
        let expected = format!("{}-{}.md", record.capability(), record.identity);
        assert!(names.contains(&expected), "missing {}", expected);
    }

    let first = &report.records[0];
    let text = fs::read_to_string(tq.dir.join(first.file_name())).unwrap();
    assert!(text.starts_with(&format!("# {}\n", first.identity)));
    assert!(text.contains("AGENT: BACKEND\n"));
    assert!(text.contains("STATUS: PENDING\n"));
    assert!(text.contains("ORDER: 1 of 3\n"));
    assert!(text.contains("## DEPENDENCIES\nNone\n"));
}

#[test]
fn test_activity_line_written_beside_queue() {
    let tq = TestQueue::new();
    Taskmaster::default()
        .dispatch(OAUTH_REQUEST, &tq.queue)
        .unwrap();

    let log = fs::read_to_string(tq.queue.activity_log()).unwrap();
    assert_eq!(
        tq.queue.activity_log(),
        tq.temp_dir.path().join(".agent-comms").join("notifications.log")
    );
    assert!(log
        .trim_end()
        .ends_with("[TASKMASTER] Analyzed multi task: 3 task(s) created"));
}

/// Given a dispatched batch
/// When workers rename and mark records
/// Then pending listings and status counts follow the file names
#[test]
fn test_worker_transitions_are_visible() {
    let tq = TestQueue::new();
    let report = Taskmaster::default()
        .dispatch(OAUTH_REQUEST, &tq.queue)
        .unwrap();
    let backend = &report.records[0];
    let frontend = &report.records[1];

    fs::rename(
        tq.dir.join(backend.file_name()),
        tq.dir.join(backend.completed_file_name()),
    )
    .unwrap();
    fs::rename(
        tq.dir.join(frontend.file_name()),
        tq.dir.join(frontend.processing_file_name()),
    )
    .unwrap();

    let pending = tq.queue.list_pending(None).unwrap();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].capability(), &Capability::testing());

    let counts = tq.queue.status_counts().unwrap();
    assert_eq!(counts[&Capability::backend()].completed, 1);
    assert_eq!(counts[&Capability::frontend()].in_progress, 1);
    assert_eq!(counts[&Capability::testing()].pending, 1);

    assert!(tq
        .queue
        .list_pending(Some(&Capability::frontend()))
        .unwrap()
        .is_empty());
}

#[test]
fn test_foreign_files_are_ignored() {
    let tq = TestQueue::new();
    Taskmaster::default()
        .dispatch("Fix the modal", &tq.queue)
        .unwrap();
    fs::write(tq.dir.join("README.md"), "# notes\n").unwrap();
    fs::write(tq.dir.join("frontend-TASK_broken.md"), "not a record").unwrap();

    let pending = tq.queue.list_pending(None).unwrap();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].subtask.id, "frontend-task");
}

#[test]
fn test_record_parse_reports_source() {
    let err = QueueRecord::parse("frontend-TASK_x.md", "# TASK_x\nAGENT: FRONTEND\n").unwrap_err();
    assert!(err.to_string().contains("frontend-TASK_x.md"));
}

#[test]
fn test_config_file_drives_pipeline() {
    let tq = TestQueue::new();
    let path = tq.temp_dir.path().join("config.toml");
    fs::write(
        &path,
        r#"
queue_dir = "/srv/queue"
strict_cycles = true
minutes_per_task = 5.0

[routing]
multi_select_ratio = 0.9

[[profiles]]
name = "devops"
keywords = ["docker", "deploy"]
tier = 6
"#,
    )
    .unwrap();

    let config = Config::load_from(&path).unwrap();
    assert_eq!(config.effective_queue_dir(), std::path::PathBuf::from("/srv/queue"));
    assert!(config.strict_cycles);
    assert_eq!(config.routing.keyword_weight, 2);

    let report = Taskmaster::new(&config)
        .unwrap()
        .dispatch("deploy the docker image", &tq.queue)
        .unwrap();
    assert_eq!(report.records.len(), 1);
    assert!(report.records[0].file_name().starts_with("devops-TASK_"));
    assert!((report.plan.summary.estimated_minutes - 5.0).abs() < f64::EPSILON);
}
