//! Structured logging for taskmaster.
//!
//! Log levels:
//! - ERROR: Queue writes that failed and were rolled back
//! - WARN: Recoverable anomalies (dependency cycles, dropped subtasks)
//! - INFO: One line per command and per enqueued batch
//! - DEBUG: Routing scores, complexity rules, graph construction
//! - TRACE: Raw record bodies and watcher events
//!
//! Debug mode can be enabled with `--debug` flag or `TASKMASTER_DEBUG=1` env var.
//! Until [`init`] is called every macro is a no-op, so library callers and
//! tests never touch the filesystem through logging.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::OnceLock;

use crate::config::Config;

static LOG_PATH: OnceLock<PathBuf> = OnceLock::new();
static LOG_LEVEL: AtomicU8 = AtomicU8::new(LogLevel::Info as u8);

/// Log levels for filtering messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[repr(u8)]
pub enum LogLevel {
    Error = 0,
    Warn = 1,
    Info = 2,
    Debug = 3,
    Trace = 4,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Error => "ERROR",
            LogLevel::Warn => "WARN",
            LogLevel::Info => "INFO",
            LogLevel::Debug => "DEBUG",
            LogLevel::Trace => "TRACE",
        }
    }

    fn from_u8(v: u8) -> Self {
        match v {
            0 => LogLevel::Error,
            1 => LogLevel::Warn,
            2 => LogLevel::Info,
            3 => LogLevel::Debug,
            _ => LogLevel::Trace,
        }
    }

    /// Threshold for a run: `--debug` or a truthy `TASKMASTER_DEBUG` lowers it to DEBUG.
    fn for_run(debug_flag: bool, env_value: Option<&str>) -> Self {
        let env_debug = env_value.is_some_and(|v| v == "1" || v.eq_ignore_ascii_case("true"));
        if debug_flag || env_debug {
            LogLevel::Debug
        } else {
            LogLevel::Info
        }
    }
}

/// Start logging to `~/.taskmaster/taskmaster.log`.
///
/// Each CLI run appends, so the file keeps the history of earlier batches.
pub fn init(debug: bool) {
    let env_value = std::env::var("TASKMASTER_DEBUG").ok();
    let level = LogLevel::for_run(debug, env_value.as_deref());
    LOG_LEVEL.store(level as u8, Ordering::SeqCst);

    if let Ok(path) = Config::log_path() {
        if let Some(dir) = path.parent() {
            let _ = std::fs::create_dir_all(dir);
        }
        LOG_PATH.set(path).ok();
    }
}

pub fn level() -> LogLevel {
    LogLevel::from_u8(LOG_LEVEL.load(Ordering::Relaxed))
}

/// Append one line if `level` passes the threshold and logging was started.
pub fn log_at(level: LogLevel, msg: &str) {
    if level > self::level() {
        return;
    }

    if let Some(path) = LOG_PATH.get() {
        if let Ok(mut file) = OpenOptions::new().create(true).append(true).open(path) {
            let timestamp = chrono::Local::now().format("%Y-%m-%d %H:%M:%S%.3f");
            let _ = writeln!(file, "[{}] [{}] {}", timestamp, level.as_str(), msg);
        }
    }
}

#[macro_export]
macro_rules! tlog {
    ($($arg:tt)*) => {
        $crate::log::log_at($crate::log::LogLevel::Info, &format!($($arg)*))
    };
}

#[macro_export]
macro_rules! tlog_error {
    ($($arg:tt)*) => {
        $crate::log::log_at($crate::log::LogLevel::Error, &format!($($arg)*))
    };
}

#[macro_export]
macro_rules! tlog_warn {
    ($($arg:tt)*) => {
        $crate::log::log_at($crate::log::LogLevel::Warn, &format!($($arg)*))
    };
}

/// Only written when debug mode is on.
#[macro_export]
macro_rules! tlog_debug {
    ($($arg:tt)*) => {
        $crate::log::log_at($crate::log::LogLevel::Debug, &format!($($arg)*))
    };
}

/// Never written at the default thresholds; raise the level in code to see record bodies.
#[macro_export]
macro_rules! tlog_trace {
    ($($arg:tt)*) => {
        $crate::log::log_at($crate::log::LogLevel::Trace, &format!($($arg)*))
    };
}
