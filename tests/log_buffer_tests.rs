use std::fs;
use std::io;
use std::path::PathBuf;
use std::sync::Arc;

use parking_lot::Mutex;

use fieldscan::constants::LOG_BUFFER_CAPACITY;
use fieldscan::error::CoreError;
use fieldscan::logbuf::{FileSink, LogBuffer, LogLevel, LogSink};

#[derive(Clone, Default)]
struct MemorySink {
    lines: Arc<Mutex<Vec<String>>>,
}

impl LogSink for MemorySink {
    fn write_lines(&mut self, lines: &[String]) -> io::Result<()> {
        self.lines.lock().extend_from_slice(lines);
        Ok(())
    }
}

/// Fails every write until `healed` is set.
#[derive(Clone, Default)]
struct FailingSink {
    healed: Arc<Mutex<bool>>,
    lines: Arc<Mutex<Vec<String>>>,
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

fn temp_log_path() -> PathBuf {
    use std::thread;
    use std::time::{SystemTime, UNIX_EPOCH};

    let mut base = std::env::temp_dir();
    base.push("fieldscan_tests");
    base.push("logbuf");

    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos();
    let tid = format!("{:?}", thread::current().id());
    base.push(format!("t_{nanos}_{tid}"));

    let _ = fs::create_dir_all(&base);
    base.join("activity.log")
}

#[test]
fn test_forced_flush_persists_exact_count() {
    let sink = MemorySink::default();
    let buf = LogBuffer::new(LogLevel::Debug, Box::new(sink.clone()));

    for i in 0..5 {
        buf.append(LogLevel::Info, "core", &format!("entry {}", i))
            .expect("append must succeed");
    }

    let written = buf.flush(true).expect("forced flush must succeed");
    assert_eq!(written, 5);
    assert_eq!(buf.buffered(), 0);
    assert_eq!(
        sink.lines.lock().len(),
        5,
        "Persisted count must equal appended count"
    );
}

#[test]
fn test_capacity_triggers_implicit_flush() {
    let sink = MemorySink::default();
    let buf = LogBuffer::new(LogLevel::Debug, Box::new(sink.clone()));

    for i in 0..LOG_BUFFER_CAPACITY {
        buf.append(LogLevel::Info, "core", &format!("entry {}", i))
            .unwrap();
    }
    assert_eq!(buf.buffered(), LOG_BUFFER_CAPACITY);
    assert_eq!(sink.lines.lock().len(), 0, "No flush before capacity");

    // The 11th append must flush the full buffer first
    buf.append(LogLevel::Info, "core", "one more").unwrap();
    assert_eq!(
        buf.buffered(),
        1,
        "Buffer must hold only the new entry after the implicit flush"
    );
    assert_eq!(sink.lines.lock().len(), LOG_BUFFER_CAPACITY);
}

#[test]
fn test_storage_failure_retains_entries() {
    let sink = FailingSink::default();
    let buf = LogBuffer::new(LogLevel::Debug, Box::new(sink.clone()));

    buf.append(LogLevel::Error, "core", "must survive").unwrap();

    let result = buf.flush(true);
    assert!(
        matches!(result, Err(CoreError::Storage(_))),
        "Storage failure must surface as a Storage error"
    );
    assert_eq!(buf.buffered(), 1, "Failed flush must retain entries");

    // Storage comes back: the retained entry flushes on the next attempt
    *sink.healed.lock() = true;
    let written = buf.flush(true).expect("flush after heal must succeed");
    assert_eq!(written, 1);
    assert!(sink.lines.lock()[0].contains("must survive"));
}

#[test]
fn test_full_buffer_append_with_dead_storage_diverts_to_trace() {
    let sink = FailingSink::default();
    let buf = LogBuffer::new(LogLevel::Debug, Box::new(sink.clone()));

    for i in 0..LOG_BUFFER_CAPACITY {
        buf.append(LogLevel::Info, "core", &format!("entry {}", i))
            .unwrap();
    }

    let result = buf.append(LogLevel::Info, "core", "overflow entry");
    assert!(matches!(result, Err(CoreError::Storage(_))));
    assert_eq!(
        buf.buffered(),
        LOG_BUFFER_CAPACITY,
        "Buffered entries must be retained for retry"
    );

    let trace = buf.fallback_trace();
    assert!(
        trace.iter().any(|l| l.contains("overflow entry")),
        "The incoming entry must land in the fallback trace, not vanish"
    );
    assert!(
        trace.iter().any(|l| l.contains("flush failed")),
        "The storage failure itself must be traced"
    );
}

#[test]
fn test_level_filter_is_silent_success() {
    let sink = MemorySink::default();
    let buf = LogBuffer::new(LogLevel::Error, Box::new(sink.clone()));

    buf.append(LogLevel::Debug, "core", "below").unwrap();
    buf.append(LogLevel::Info, "core", "below").unwrap();
    buf.append(LogLevel::Warning, "core", "below").unwrap();
    buf.append(LogLevel::Critical, "core", "kept").unwrap();

    buf.flush(true).unwrap();
    let lines = sink.lines.lock().clone();
    assert_eq!(lines.len(), 1);
    assert!(lines[0].contains("CRITICAL"));
}

#[test]
fn test_file_sink_appends_one_line_per_entry() {
    let path = temp_log_path();
    let buf = LogBuffer::new(LogLevel::Debug, Box::new(FileSink::new(path.clone())));

    buf.append(LogLevel::Info, "SubGhz", "first").unwrap();
    buf.append(LogLevel::Warning, "NFC", "second").unwrap();
    buf.flush(true).expect("file flush must succeed");

    // Later batch appends, never truncates
    buf.append(LogLevel::Error, "BT", "third").unwrap();
    buf.flush(true).unwrap();

    let contents = fs::read_to_string(&path).expect("log file must exist");
    let lines: Vec<&str> = contents.lines().collect();
    assert_eq!(lines.len(), 3);
    assert!(lines[0].contains("| INFO | SubGhz | first"));
    assert!(lines[1].contains("| WARNING | NFC | second"));
    assert!(lines[2].contains("| ERROR | BT | third"));

    fs::remove_file(path).ok();
}
