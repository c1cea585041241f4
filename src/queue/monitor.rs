//! Queue directory watcher.
//!
//! Translates file system events in the queue directory into
//! [`QueueEvent`]s delivered over a crossbeam channel. The watcher stops
//! when the [`QueueMonitor`] is dropped.

use crossbeam_channel::{Receiver, Sender};
use notify::event::{ModifyKind, RenameMode};
use notify::{Config, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::fs;
use std::path::Path;

use crate::core::Capability;
use crate::queue::record::{parse_file_name, RecordStatus};
use crate::{tlog_debug, tlog_trace, tlog_warn, Result};

/// A lifecycle change observed in the queue directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueueEvent {
    /// A pending record appeared.
    Enqueued { capability: Capability, identity: String },
    /// A worker renamed a record to `.processing.md`.
    Started { capability: Capability, identity: String },
    /// A completion marker or `.completed.md` rename appeared.
    Completed { capability: Capability, identity: String },
}

impl QueueEvent {
    /// Classify a queue file name; `None` for files that are not records.
    pub fn from_file_name(name: &str) -> Option<Self> {
        let (capability, identity, status) = parse_file_name(name)?;
        Some(match status {
            RecordStatus::Pending => QueueEvent::Enqueued {
                capability,
                identity,
            },
            RecordStatus::InProgress => QueueEvent::Started {
                capability,
                identity,
            },
            RecordStatus::Completed => QueueEvent::Completed {
                capability,
                identity,
            },
        })
    }

    pub fn identity(&self) -> &str {
        match self {
            QueueEvent::Enqueued { identity, .. }
            | QueueEvent::Started { identity, .. }
            | QueueEvent::Completed { identity, .. } => identity,
        }
    }
}

impl std::fmt::Display for QueueEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            QueueEvent::Enqueued {
                capability,
                identity,
            } => write!(f, "[{}] queued     {}", capability.label(), identity),
            QueueEvent::Started {
                capability,
                identity,
            } => write!(f, "[{}] started    {}", capability.label(), identity),
            QueueEvent::Completed {
                capability,
                identity,
            } => write!(f, "[{}] completed  {}", capability.label(), identity),
        }
    }
}

/// Whether a notify event can introduce a new file name.
fn is_arrival(kind: &EventKind) -> bool {
    matches!(
        kind,
        EventKind::Create(_)
            | EventKind::Modify(ModifyKind::Name(RenameMode::To))
            | EventKind::Modify(ModifyKind::Name(RenameMode::Both))
            | EventKind::Modify(ModifyKind::Name(RenameMode::Any))
    )
}

fn events_for(event: Event) -> Vec<QueueEvent> {
    if !is_arrival(&event.kind) {
        return Vec::new();
    }
    // For a two-path rename the new name comes last.
    let paths = match event.kind {
        EventKind::Modify(ModifyKind::Name(RenameMode::Both)) => {
            event.paths.into_iter().last().into_iter().collect()
        }
        _ => event.paths,
    };
    paths
        .iter()
        .filter(|p| p.exists())
        .filter_map(|p| p.file_name())
        .filter_map(|name| QueueEvent::from_file_name(&name.to_string_lossy()))
        .collect()
}

/// Keeps a watcher alive and hands out its event stream.
pub struct QueueMonitor {
    _watcher: RecommendedWatcher,
    events: Receiver<QueueEvent>,
}

impl QueueMonitor {
    /// Start watching `dir`, creating it when missing.
    pub fn start(dir: &Path) -> Result<Self> {
        if !dir.exists() {
            fs::create_dir_all(dir)?;
        }
        let (tx, rx): (Sender<QueueEvent>, Receiver<QueueEvent>) = crossbeam_channel::unbounded();

        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| match res {
                Ok(event) => {
                    for queue_event in events_for(event) {
                        tlog_trace!("Queue event: {}", queue_event);
                        if tx.send(queue_event).is_err() {
                            return;
                        }
                    }
                }
                Err(e) => tlog_warn!("Queue watch error: {}", e),
            },
            Config::default(),
        )?;
        watcher.watch(dir, RecursiveMode::NonRecursive)?;
        tlog_debug!("Watching queue directory {}", dir.display());

        Ok(Self {
            _watcher: watcher,
            events: rx,
        })
    }

    pub fn events(&self) -> &Receiver<QueueEvent> {
        &self.events
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use notify::event::CreateKind;
    use std::path::PathBuf;
    use tempfile::TempDir;

    #[test]
    fn test_from_file_name() {
        let event = QueueEvent::from_file_name("backend-TASK_1_0000_ab_api.md").unwrap();
        assert_eq!(
            event,
            QueueEvent::Enqueued {
                capability: Capability::backend(),
                identity: "TASK_1_0000_ab_api".to_string(),
            }
        );
        assert!(matches!(
            QueueEvent::from_file_name("backend-TASK_1_0000_ab_api.processing.md"),
            Some(QueueEvent::Started { .. })
        ));
        assert!(matches!(
            QueueEvent::from_file_name("backend-TASK_1_0000_ab_api.completed"),
            Some(QueueEvent::Completed { .. })
        ));
        assert!(QueueEvent::from_file_name("notifications.log").is_none());
    }

    #[test]
    fn test_events_for_create() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("frontend-TASK_1_0000_ab_page.md");
        fs::write(&path, "").unwrap();
        let event = Event::new(EventKind::Create(CreateKind::File)).add_path(path);
        let events = events_for(event);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].identity(), "TASK_1_0000_ab_page");
    }

    #[test]
    fn test_events_for_rename_uses_new_name() {
        let tmp = TempDir::new().unwrap();
        let from = tmp.path().join("frontend-TASK_1_0000_ab_page.md");
        let to = tmp.path().join("frontend-TASK_1_0000_ab_page.processing.md");
        fs::write(&to, "").unwrap();
        let event = Event::new(EventKind::Modify(ModifyKind::Name(RenameMode::Both)))
            .add_path(from)
            .add_path(to);
        let events = events_for(event);
        assert!(matches!(events.as_slice(), [QueueEvent::Started { .. }]));
    }

    #[test]
    fn test_events_for_ignores_removals_and_vanished_files() {
        let gone = PathBuf::from("/nonexistent/frontend-TASK_1_0000_ab_page.md");
        let event = Event::new(EventKind::Create(CreateKind::File)).add_path(gone.clone());
        assert!(events_for(event).is_empty());
        let event = Event::new(EventKind::Remove(notify::event::RemoveKind::File)).add_path(gone);
        assert!(events_for(event).is_empty());
    }

    #[test]
    fn test_display() {
        let event = QueueEvent::Completed {
            capability: Capability::testing(),
            identity: "TASK_1".to_string(),
        };
        assert_eq!(event.to_string(), "[TESTING] completed  TASK_1");
    }
}
