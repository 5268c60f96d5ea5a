//! Buffered activity log persisted to external storage.
//!
//! Entries accumulate in a small fixed-capacity buffer and flush to the
//! sink in batches, so a slow storage medium never sits in the hot path
//! of every log call. The buffer has its own lock, independent of the
//! application state lock, so log writes never block on a long-running
//! scan.

use chrono::Local;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs::OpenOptions;
use std::io::{self, Write};
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;

use crate::constants::{LOG_BUFFER_CAPACITY, LOG_ENTRY_MAX_BYTES, LOG_FALLBACK_TRACE_CAPACITY};
use crate::error::CoreError;

/// Severity of an activity-log entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Debug,
    Info,
    Warning,
    Error,
    Critical,
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LogLevel::Debug => "DEBUG",
            LogLevel::Info => "INFO",
            LogLevel::Warning => "WARNING",
            LogLevel::Error => "ERROR",
            LogLevel::Critical => "CRITICAL",
        };
        write!(f, "{}", name)
    }
}

impl FromStr for LogLevel {
    type Err = ();

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "debug" => Ok(LogLevel::Debug),
            "info" => Ok(LogLevel::Info),
            "warning" | "warn" => Ok(LogLevel::Warning),
            "error" => Ok(LogLevel::Error),
            "critical" => Ok(LogLevel::Critical),
            _ => Err(()),
        }
    }
}

/// Destination for flushed log batches.
pub trait LogSink: Send {
    fn write_lines(&mut self, lines: &[String]) -> io::Result<()>;
}

/// Appends flushed entries to a file, one line each.
pub struct FileSink {
    path: PathBuf,
}

impl FileSink {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }
}

impl LogSink for FileSink {
    fn write_lines(&mut self, lines: &[String]) -> io::Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        for line in lines {
            writeln!(file, "{}", line)?;
        }
        file.flush()
    }
}

struct LogBufferInner {
    entries: Vec<String>,
    min_level: LogLevel,
    sink: Box<dyn LogSink>,
    /// In-memory trace of entries and notices that could not reach storage.
    fallback_trace: Vec<String>,
    /// Consecutive flush failures since the last successful write.
    failed_flushes: u32,
}

/// Fixed-capacity, mutex-protected buffer of formatted log entries.
#[derive(Clone)]
pub struct LogBuffer {
    inner: Arc<Mutex<LogBufferInner>>,
}

impl LogBuffer {
    pub fn new(min_level: LogLevel, sink: Box<dyn LogSink>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(LogBufferInner {
                entries: Vec::with_capacity(LOG_BUFFER_CAPACITY),
                min_level,
                sink,
                fallback_trace: Vec::new(),
                failed_flushes: 0,
            })),
        }
    }

    pub fn set_min_level(&self, level: LogLevel) {
        self.inner.lock().min_level = level;
    }

    /// Append a formatted entry, flushing first if the buffer is full.
    ///
    /// Entries below the configured minimum level are a success no-op. An
    /// entry is never silently dropped: if the buffer is full and the
    /// implicit flush fails, the entry lands in the fallback trace and the
    /// storage error is surfaced to the caller, who proceeds.
    pub fn append(&self, level: LogLevel, module: &str, message: &str) -> Result<(), CoreError> {
        let mut inner = self.inner.lock();
        if level < inner.min_level {
            return Ok(());
        }

        let entry = format_entry(level, module, message);

        if inner.entries.len() >= LOG_BUFFER_CAPACITY {
            if let Err(e) = Self::flush_locked(&mut inner) {
                Self::trace_locked(&mut inner, format!("flush failed before append: {}", e));
                let trace_cap = inner.fallback_trace.len() < LOG_FALLBACK_TRACE_CAPACITY;
                if trace_cap {
                    inner.fallback_trace.push(entry);
                }
                return Err(CoreError::Storage(e));
            }
        }

        inner.entries.push(entry);
        Ok(())
    }

    /// Write buffered entries to storage.
    ///
    /// With `force == false` this only writes when the buffer is full. On
    /// success the buffer drains to zero and the persisted count is
    /// returned. On storage failure the entries are retained for the next
    /// flush opportunity.
    pub fn flush(&self, force: bool) -> Result<usize, CoreError> {
        let mut inner = self.inner.lock();
        if !force && inner.entries.len() < LOG_BUFFER_CAPACITY {
            return Ok(0);
        }
        if inner.entries.is_empty() {
            return Ok(0);
        }
        let count = inner.entries.len();
        match Self::flush_locked(&mut inner) {
            Ok(()) => Ok(count),
            Err(e) => {
                Self::trace_locked(&mut inner, format!("flush of {} entries failed: {}", count, e));
                Err(CoreError::Storage(e))
            }
        }
    }

    /// Number of entries currently buffered.
    pub fn buffered(&self) -> usize {
        self.inner.lock().entries.len()
    }

    /// Copy of the fallback trace accumulated across storage failures.
    pub fn fallback_trace(&self) -> Vec<String> {
        self.inner.lock().fallback_trace.clone()
    }

    fn flush_locked(inner: &mut LogBufferInner) -> io::Result<()> {
        let lines = std::mem::take(&mut inner.entries);
        match inner.sink.write_lines(&lines) {
            Ok(()) => {
                inner.failed_flushes = 0;
                Ok(())
            }
            Err(e) => {
                // Retain for the next flush opportunity
                inner.entries = lines;
                Err(e)
            }
        }
    }

    fn trace_locked(inner: &mut LogBufferInner, line: String) {
        inner.failed_flushes = inner.failed_flushes.saturating_add(1);
        if inner.fallback_trace.len() < LOG_FALLBACK_TRACE_CAPACITY {
            inner.fallback_trace.push(line);
        }
        log::warn!(
            "activity log storage failure ({} consecutive)",
            inner.failed_flushes
        );
    }
}

/// Formats `timestamp | LEVEL | module | message`, truncated to the entry
/// size cap on a character boundary.
fn format_entry(level: LogLevel, module: &str, message: &str) -> String {
    let timestamp = Local::now().format("%Y-%m-%d %H:%M:%S%.3f");
    let mut entry = format!("{} | {} | {} | {}", timestamp, level, module, message);
    if entry.len() > LOG_ENTRY_MAX_BYTES {
        let mut cut = LOG_ENTRY_MAX_BYTES;
        while !entry.is_char_boundary(cut) {
            cut -= 1;
        }
        entry.truncate(cut);
    }
    entry
}

#[cfg(test)]
pub(crate) mod test_sinks {
    use super::*;
    use std::sync::Arc;

    /// Collects flushed lines in memory for assertions.
    #[derive(Clone, Default)]
    pub struct MemorySink {
        pub lines: Arc<Mutex<Vec<String>>>,
    }

    impl LogSink for MemorySink {
        fn write_lines(&mut self, lines: &[String]) -> io::Result<()> {
            self.lines.lock().extend_from_slice(lines);
            Ok(())
        }
    }

    /// Fails every write until `healed` is set.
    #[derive(Clone, Default)]
    pub struct FailingSink {
        pub healed: Arc<Mutex<bool>>,
        pub lines: Arc<Mutex<Vec<String>>>,
    }

    impl LogSink for FailingSink {
        fn write_lines(&mut self, lines: &[String]) -> io::Result<()> {
            if *self.healed.lock() {
                self.lines.lock().extend_from_slice(lines);
                Ok(())
            } else {
                Err(io::Error::new(io::ErrorKind::Other, "storage offline"))
            }
        }
    }
}
