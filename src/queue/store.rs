//! Queue storage backends.
//!
//! The queue is append-only from this crate's point of view: records are
//! written once and only removed again when a batch write is rolled back.
//! Status transitions after that belong to the workers.

use chrono::{SecondsFormat, Utc};
use std::collections::{BTreeMap, HashSet};
use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use crate::core::Capability;
use crate::queue::record::{parse_file_name, QueueRecord, RecordStatus};
use crate::{tlog_debug, tlog_trace, tlog_warn, Error, Result};

pub const ACTIVITY_LOG_FILE: &str = "notifications.log";

/// Where queue records are persisted.
pub trait QueueStore: Send + Sync {
    /// Persist a new record. Fails with [`Error::IdentityCollision`] rather
    /// than overwriting an existing one.
    fn append(&self, record: &QueueRecord) -> Result<String>;

    /// Pending records in FIFO (identity) order, optionally for one capability.
    fn list_pending(&self, capability: Option<&Capability>) -> Result<Vec<QueueRecord>>;

    /// Remove a record this process just wrote. Missing records are not an error.
    fn discard(&self, record: &QueueRecord) -> Result<()>;

    /// Append a line to the store's activity log, if it keeps one.
    fn record_activity(&self, _line: &str) -> Result<()> {
        Ok(())
    }
}

/// Per-capability record counts by status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize)]
pub struct StatusCounts {
    pub pending: usize,
    pub in_progress: usize,
    pub completed: usize,
}

impl StatusCounts {
    pub fn total(&self) -> usize {
        self.pending + self.in_progress + self.completed
    }

    fn bump(&mut self, status: RecordStatus) {
        match status {
            RecordStatus::Pending => self.pending += 1,
            RecordStatus::InProgress => self.in_progress += 1,
            RecordStatus::Completed => self.completed += 1,
        }
    }
}

/// A directory of markdown records, one file per subtask.
#[derive(Debug, Clone)]
pub struct DirectoryQueue {
    dir: PathBuf,
    activity_log: PathBuf,
}

impl DirectoryQueue {
    /// The activity log goes next to the queue directory, matching the
    /// `.agent-comms/task-queue` + `.agent-comms/notifications.log` layout.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        let dir = dir.into();
        let activity_log = match dir.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.join(ACTIVITY_LOG_FILE),
            _ => dir.join(ACTIVITY_LOG_FILE),
        };
        Self { dir, activity_log }
    }

    pub fn with_activity_log(mut self, path: impl Into<PathBuf>) -> Self {
        self.activity_log = path.into();
        self
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn activity_log(&self) -> &Path {
        &self.activity_log
    }

    fn ensure_dir(&self) -> Result<()> {
        if !self.dir.exists() {
            fs::create_dir_all(&self.dir)?;
            tlog_debug!("Created queue directory {}", self.dir.display());
        }
        Ok(())
    }

    /// Every record-like file name with its parsed parts. A missing directory is an empty queue.
    fn scan(&self) -> Result<Vec<(String, Capability, String, RecordStatus)>> {
        let entries = match fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut files = Vec::new();
        for entry in entries {
            let entry = entry?;
            let name = entry.file_name().to_string_lossy().into_owned();
            if let Some((capability, identity, status)) = parse_file_name(&name) {
                files.push((name, capability, identity, status));
            }
        }
        Ok(files)
    }

    /// Identities that have a completion marker or a processing rename.
    fn claimed_identities(files: &[(String, Capability, String, RecordStatus)]) -> HashSet<String> {
        files
            .iter()
            .filter(|(_, _, _, status)| *status != RecordStatus::Pending)
            .map(|(_, _, identity, _)| identity.clone())
            .collect()
    }

    /// Record counts per capability and status, from file names alone.
    pub fn status_counts(&self) -> Result<BTreeMap<Capability, StatusCounts>> {
        let files = self.scan()?;
        let claimed = Self::claimed_identities(&files);
        let mut counts: BTreeMap<Capability, StatusCounts> = BTreeMap::new();
        for (_, capability, identity, status) in files {
            // A pending file left beside its completion marker is not pending.
            if status == RecordStatus::Pending && claimed.contains(&identity) {
                continue;
            }
            counts.entry(capability).or_default().bump(status);
        }
        Ok(counts)
    }
}

impl QueueStore for DirectoryQueue {
    fn append(&self, record: &QueueRecord) -> Result<String> {
        self.ensure_dir()?;
        let body = record.render();
        let published = publish(&self.dir, &record.file_name(), |file| {
            file.write_all(body.as_bytes())?;
            file.sync_all()
        });
        match published {
            Err(Error::Io(e)) if e.kind() == ErrorKind::AlreadyExists => {
                return Err(Error::IdentityCollision(record.identity.clone()));
            }
            other => other?,
        }
        tlog_debug!("Queued {}", self.dir.join(record.file_name()).display());
        tlog_trace!("{}", body);
        Ok(record.identity.clone())
    }

    fn list_pending(&self, capability: Option<&Capability>) -> Result<Vec<QueueRecord>> {
        let files = self.scan()?;
        let claimed = Self::claimed_identities(&files);

        let mut pending: Vec<(String, String)> = files
            .into_iter()
            .filter(|(_, cap, identity, status)| {
                *status == RecordStatus::Pending
                    && !claimed.contains(identity)
                    && capability.map_or(true, |c| c == cap)
            })
            .map(|(name, _, identity, _)| (identity, name))
            .collect();
        pending.sort();

        let mut records = Vec::with_capacity(pending.len());
        for (_, name) in pending {
            let text = match fs::read_to_string(self.dir.join(&name)) {
                Ok(text) => text,
                // Picked up by a worker between scan and read.
                Err(e) if e.kind() == ErrorKind::NotFound => continue,
                Err(e) => return Err(e.into()),
            };
            match QueueRecord::parse(&name, &text) {
                Ok(record) => records.push(record),
                Err(e) => tlog_warn!("Skipping unreadable queue file: {}", e),
            }
        }
        Ok(records)
    }

    fn discard(&self, record: &QueueRecord) -> Result<()> {
        match fs::remove_file(self.dir.join(record.file_name())) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    fn record_activity(&self, line: &str) -> Result<()> {
        if let Some(parent) = self.activity_log.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                fs::create_dir_all(parent)?;
            }
        }
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.activity_log)?;
        writeln!(
            file,
            "{} - {}",
            Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
            line
        )?;
        Ok(())
    }
}

/// Write `name` into `dir` so that it appears complete or not at all.
///
/// The body goes to a hidden staging file first, which is then hard-linked
/// to its final name. Linking never replaces an existing file, so a taken
/// name surfaces as `AlreadyExists`. The staging file is always removed.
fn publish<F>(dir: &Path, name: &str, write: F) -> Result<()>
where
    F: FnOnce(&mut fs::File) -> std::io::Result<()>,
{
    let staging = dir.join(format!(".{}.tmp", name));
    let mut file = OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(&staging)?;

    let result = write(&mut file).and_then(|()| {
        drop(file);
        fs::hard_link(&staging, dir.join(name))
    });
    if let Err(e) = fs::remove_file(&staging) {
        tlog_warn!("Could not remove staging file {}: {}", staging.display(), e);
    }
    result.map_err(Error::from)
}

/// In-process queue, for embedding and tests.
#[derive(Debug, Default)]
pub struct MemoryQueue {
    records: Mutex<BTreeMap<String, QueueRecord>>,
    activity: Mutex<Vec<String>>,
}

impl MemoryQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// All records regardless of status, in identity order.
    pub fn records(&self) -> Vec<QueueRecord> {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .cloned()
            .collect()
    }

    pub fn activity(&self) -> Vec<String> {
        self.activity
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl QueueStore for MemoryQueue {
    fn append(&self, record: &QueueRecord) -> Result<String> {
        let mut records = self.records.lock().unwrap_or_else(PoisonError::into_inner);
        if records.contains_key(&record.identity) {
            return Err(Error::IdentityCollision(record.identity.clone()));
        }
        records.insert(record.identity.clone(), record.clone());
        Ok(record.identity.clone())
    }

    fn list_pending(&self, capability: Option<&Capability>) -> Result<Vec<QueueRecord>> {
        let records = self.records.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(records
            .values()
            .filter(|r| r.status == RecordStatus::Pending)
            .filter(|r| capability.map_or(true, |c| c == r.capability()))
            .cloned()
            .collect())
    }

    fn discard(&self, record: &QueueRecord) -> Result<()> {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&record.identity);
        Ok(())
    }

    fn record_activity(&self, line: &str) -> Result<()> {
        self.activity
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(line.to_string());
        Ok(())
    }
}
