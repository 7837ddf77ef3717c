//! Bounded diagnostic log feed.

use std::{collections::VecDeque, sync::RwLock};

use chrono::{DateTime, Utc};

/// Default entry capacity.
const CAPACITY: usize = 500;

/// One immutable diagnostic line.
#[derive(Debug, Clone)]
pub struct LogEntry {
    pub at: DateTime<Utc>,
    pub message: String,
}

impl LogEntry {
    /// Render as a single human-readable line.
    #[must_use]
    pub fn line(&self) -> String {
        format!("[{}] {}", self.at.format("%Y-%m-%d %H:%M:%S"), self.message)
    }
}

/// Append-only ring buffer of human-readable log lines.
///
/// Fixed capacity, oldest evicted first. Diagnostic, not an audit
/// trail: it has no durability and is lost on restart.
pub struct LogBuffer {
    inner: RwLock<VecDeque<LogEntry>>,
    capacity: usize,
}

impl Default for LogBuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl LogBuffer {
    /// Create a buffer with the default capacity.
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(CAPACITY)
    }

    /// Create a buffer holding at most `capacity` entries.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            inner: RwLock::new(VecDeque::with_capacity(capacity.min(64))),
            capacity,
        }
    }

    /// Append a line, evicting the oldest entry when full.
    pub fn push<S: Into<String>>(&self, message: S) {
        let entry = LogEntry {
            at: Utc::now(),
            message: message.into(),
        };
        let mut inner = self.inner.write().unwrap();
        if inner.len() == self.capacity {
            inner.pop_front();
        }
        inner.push_back(entry);
    }

    /// Snapshot of rendered lines, newest first.
    #[must_use]
    pub fn snapshot(&self) -> Vec<String> {
        self.inner
            .read()
            .unwrap()
            .iter()
            .rev()
            .map(LogEntry::line)
            .collect()
    }

    /// Number of retained entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.read().unwrap().len()
    }

    /// Whether the buffer holds no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn evicts_oldest_first() {
        let buf = LogBuffer::with_capacity(3);
        for i in 0..5 {
            buf.push(format!("line {i}"));
        }
        let lines = buf.snapshot();
        assert_eq!(lines.len(), 3);
        // Newest first, and the two oldest lines are gone.
        assert!(lines[0].ends_with("line 4"));
        assert!(lines[2].ends_with("line 2"));
    }

    #[test]
    fn empty_buffer() {
        let buf = LogBuffer::new();
        assert!(buf.is_empty());
        assert!(buf.snapshot().is_empty());
    }
}
