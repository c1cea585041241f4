//! Concurrent dispatch and queue watching.
//!
//! A single `Taskmaster` is shared across threads the way a request handler
//! would share it; batches must never collide in the queue.

use std::collections::HashSet;
use std::thread;
use std::time::Duration;

use taskmaster::planning::Taskmaster;
use taskmaster::queue::{QueueEvent, QueueMonitor, QueueStore};

use crate::fixtures::{TestQueue, MEGA_REQUEST, OAUTH_REQUEST, SIMPLE_REQUEST};

/// Given eight threads dispatching at once
/// When all batches are written
/// Then every record lands under a distinct identity
#[test]
fn test_parallel_dispatch_has_no_collisions() {
    let tq = TestQueue::new();
    let taskmaster = Taskmaster::default();
    let requests = [SIMPLE_REQUEST, OAUTH_REQUEST, MEGA_REQUEST, SIMPLE_REQUEST];

    let totals: Vec<usize> = thread::scope(|scope| {
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let taskmaster = &taskmaster;
                let queue = &tq.queue;
                let request = requests[i % requests.len()];
                scope.spawn(move || taskmaster.dispatch(request, queue).unwrap().records.len())
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });

    let expected: usize = totals.iter().sum();
    let pending = tq.queue.list_pending(None).unwrap();
    assert_eq!(pending.len(), expected);

    let identities: HashSet<&str> = pending.iter().map(|r| r.identity.as_str()).collect();
    assert_eq!(identities.len(), expected);

    let batches: HashSet<_> = pending.iter().map(|r| r.batch_id).collect();
    assert_eq!(batches.len(), 8);
}

#[test]
fn test_same_request_twice_gives_separate_batches() {
    let tq = TestQueue::new();
    let taskmaster = Taskmaster::default();
    let first = taskmaster.dispatch(OAUTH_REQUEST, &tq.queue).unwrap();
    let second = taskmaster.dispatch(OAUTH_REQUEST, &tq.queue).unwrap();
    assert_ne!(first.plan.batch.batch_id, second.plan.batch.batch_id);
    assert_eq!(tq.queue.list_pending(None).unwrap().len(), 6);
}

/// Given a monitor on an empty queue directory
/// When a batch is dispatched into it
/// Then an Enqueued event arrives for the written records
#[test]
fn test_monitor_reports_enqueued_records() {
    let tq = TestQueue::new();
    let monitor = QueueMonitor::start(&tq.dir).unwrap();

    let report = Taskmaster::default()
        .dispatch(SIMPLE_REQUEST, &tq.queue)
        .unwrap();
    let identity = report.records[0].identity.clone();

    let mut seen = false;
    while let Ok(event) = monitor.events().recv_timeout(Duration::from_secs(5)) {
        if let QueueEvent::Enqueued { identity: id, .. } = &event {
            if *id == identity {
                seen = true;
                break;
            }
        }
    }
    assert!(seen, "no Enqueued event for {}", identity);
}
