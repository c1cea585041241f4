//! Batch enqueueing.
//!
//! Identities are `TASK_<base-millis>_<seq>_<batch>_<subtask>`: the base
//! timestamp is taken once per batch, the sequence number keeps records of
//! one batch in order, and the batch prefix keeps two batches started in the
//! same millisecond apart.

use chrono::{SubsecRound, Utc};

use crate::core::OrderedBatch;
use crate::queue::record::{QueueRecord, RecordStatus, DEFAULT_CONTEXT};
use crate::queue::store::QueueStore;
use crate::{tlog, tlog_error, Error, Result};

pub fn identity(base_millis: i64, seq: usize, batch_short: &str, subtask_id: &str) -> String {
    format!(
        "TASK_{:013}_{:04}_{}_{}",
        base_millis, seq, batch_short, subtask_id
    )
}

pub struct QueueWriter<'a> {
    store: &'a dyn QueueStore,
    context: String,
}

impl<'a> QueueWriter<'a> {
    pub fn new(store: &'a dyn QueueStore) -> Self {
        Self {
            store,
            context: DEFAULT_CONTEXT.to_string(),
        }
    }

    /// Replace the CONTEXT section written into every record.
    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = context.into();
        self
    }

    /// Persist one pending record per subtask, in batch order.
    ///
    /// All or nothing: if any append fails, the records already written for
    /// this batch are discarded and [`Error::Enqueue`] is returned.
    pub fn enqueue(&self, batch: &OrderedBatch) -> Result<Vec<QueueRecord>> {
        let created_at = Utc::now().trunc_subsecs(3);
        let base_millis = created_at.timestamp_millis();
        let batch_short = batch.batch_id.short();
        let total = batch.len();

        let mut written: Vec<QueueRecord> = Vec::with_capacity(total);
        for (seq, subtask) in batch.iter().enumerate() {
            let record = QueueRecord {
                identity: identity(base_millis, seq, &batch_short, &subtask.id),
                batch_id: batch.batch_id,
                subtask: subtask.clone(),
                order_index: seq,
                batch_size: total,
                status: RecordStatus::Pending,
                created_at,
                context: self.context.clone(),
            };

            if let Err(e) = self.store.append(&record) {
                tlog_error!(
                    "Enqueue failed at {} of {} for batch {}: {}",
                    seq + 1,
                    total,
                    batch_short,
                    e
                );
                self.rollback(&written);
                return Err(Error::Enqueue {
                    written: written.len(),
                    total,
                    source: Box::new(e),
                });
            }
            written.push(record);
        }

        tlog!("Enqueued batch {} ({} records)", batch_short, total);
        Ok(written)
    }

    fn rollback(&self, written: &[QueueRecord]) {
        for record in written.iter().rev() {
            if let Err(e) = self.store.discard(record) {
                tlog_error!("Rollback could not remove {}: {}", record.identity, e);
            }
        }
    }
}
