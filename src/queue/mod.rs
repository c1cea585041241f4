//! Durable task queue: record format, storage backends, batch writer and watcher.

pub mod monitor;
pub mod record;
pub mod store;
pub mod writer;

pub use monitor::{QueueEvent, QueueMonitor};
pub use record::{parse_file_name, QueueRecord, RecordStatus, DEFAULT_CONTEXT};
pub use store::{DirectoryQueue, MemoryQueue, QueueStore, StatusCounts};
pub use writer::QueueWriter;
