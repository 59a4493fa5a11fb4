//! Console log capture for report attachments.
//!
//! [`ConsoleBuffer`] keeps the most recent log entries in a bounded ring.
//! The host records its console traffic here (or installs the buffer as a
//! `log` sink); at submission time [`ConsoleBuffer::render_text`] becomes
//! the `console.txt` attachment. Entries can optionally be forwarded to
//! another logger so capturing never swallows output.

use std::collections::VecDeque;
use std::fmt::Write as _;

use chrono::{DateTime, SecondsFormat, Utc};
use parking_lot::Mutex;

/// Entries kept when no explicit capacity is given.
pub const DEFAULT_CAPACITY: usize = 200;

/// One captured log line.
#[derive(Debug, Clone, PartialEq)]
pub struct LogEntry {
    pub level: log::Level,
    pub target: String,
    pub message: String,
    pub timestamp: DateTime<Utc>,
}

/// Bounded ring of recent log entries.
pub struct ConsoleBuffer {
    entries: Mutex<VecDeque<LogEntry>>,
    capacity: usize,
    forward: Option<Box<dyn log::Log>>,
}

impl ConsoleBuffer {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: Mutex::new(VecDeque::with_capacity(capacity.min(DEFAULT_CAPACITY))),
            capacity: capacity.max(1),
            forward: None,
        }
    }

    /// Also hand every record to `sink` after capturing it.
    pub fn forward_to(mut self, sink: Box<dyn log::Log>) -> Self {
        self.forward = Some(sink);
        self
    }

    /// Append an entry, evicting the oldest when the ring is full.
    pub fn record(&self, level: log::Level, target: &str, message: String) {
        let entry = LogEntry {
            level,
            target: target.to_owned(),
            message,
            timestamp: Utc::now(),
        };
        let mut entries = self.entries.lock();
        while entries.len() >= self.capacity {
            entries.pop_front();
        }
        entries.push_back(entry);
    }

    /// Copy of the current entries, oldest first.
    pub fn snapshot(&self) -> Vec<LogEntry> {
        self.entries.lock().iter().cloned().collect()
    }

    pub fn clear(&self) {
        self.entries.lock().clear();
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    /// Render the buffer as the `console.txt` payload, one line per entry.
    pub fn render_text(&self) -> String {
        let entries = self.entries.lock();
        let mut out = String::new();
        for entry in entries.iter() {
            let _ = writeln!(
                out,
                "[{}] [{}] [{}] {}",
                entry.timestamp.to_rfc3339_opts(SecondsFormat::Millis, true),
                entry.level,
                entry.target,
                entry.message
            );
        }
        out
    }
}

impl Default for ConsoleBuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl log::Log for ConsoleBuffer {
    fn enabled(&self, metadata: &log::Metadata) -> bool {
        match &self.forward {
            Some(sink) => sink.enabled(metadata),
            None => true,
        }
    }

    fn log(&self, record: &log::Record) {
        self.record(record.level(), record.target(), record.args().to_string());
        if let Some(sink) = &self.forward {
            sink.log(record);
        }
    }

    fn flush(&self) {
        if let Some(sink) = &self.forward {
            sink.flush();
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
