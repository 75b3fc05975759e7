//! Plugin host diagnostics ring buffer.
//!
//! Plugin load and update problems are logged through `tracing` and also kept
//! here, so the panel UI can show why a plugin is missing (`get-logs`).

use serde::{Deserialize, Serialize};

pub const LOG_RING_CAPACITY: usize = 1000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Info,
    Warn,
    Error,
}

/// A single diagnostics entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogEntry {
    pub id: u64,
    pub timestamp_ms: i64,
    pub level: LogLevel,
    /// Plugin name, or "updater" / "registry" for subsystem-wide entries.
    pub source: String,
    pub message: String,
}

/// Fixed-capacity circular buffer of diagnostics entries.
pub struct LogRingBuffer {
    entries: Vec<Option<LogEntry>>,
    capacity: usize,
    write_pos: usize,
    count: usize,
    /// Monotonically increasing ID for the next entry
    next_id: u64,
}

impl LogRingBuffer {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        let mut entries = Vec::with_capacity(capacity);
        entries.resize_with(capacity, || None);
        Self {
            entries,
            capacity,
            write_pos: 0,
            count: 0,
            next_id: 1,
        }
    }

    /// Record an entry. Returns the assigned id.
    pub fn push(&mut self, level: LogLevel, source: impl Into<String>, message: impl Into<String>) -> u64 {
        let id = self.next_id;
        self.next_id += 1;

        self.entries[self.write_pos] = Some(LogEntry {
            id,
            timestamp_ms: chrono::Utc::now().timestamp_millis(),
            level,
            source: source.into(),
            message: message.into(),
        });
        self.write_pos = (self.write_pos + 1) % self.capacity;
        self.count = (self.count + 1).min(self.capacity);

        id
    }

    /// The most recent `limit` entries, oldest first. `0` returns everything.
    pub fn recent(&self, limit: usize) -> Vec<LogEntry> {
        let take = if limit == 0 { self.count } else { limit.min(self.count) };

        // write_pos points at the oldest slot once the buffer has wrapped
        let oldest = if self.count < self.capacity { 0 } else { self.write_pos };

        (self.count - take..self.count)
            .filter_map(|i| self.entries[(oldest + i) % self.capacity].clone())
            .collect()
    }
}

impl Default for LogRingBuffer {
    fn default() -> Self {
        Self::new(LOG_RING_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn push_assigns_monotonic_ids() {
        let mut buf = LogRingBuffer::new(10);
        assert_eq!(buf.push(LogLevel::Info, "updater", "first"), 1);
        assert_eq!(buf.push(LogLevel::Warn, "broken", "second"), 2);
    }

    #[test]
    fn recent_with_limit_returns_newest_in_order() {
        let mut buf = LogRingBuffer::new(10);
        for msg in ["a", "b", "c"] {
            buf.push(LogLevel::Info, "registry", msg);
        }
        let entries = buf.recent(2);
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].message, "b");
        assert_eq!(entries[1].message, "c");
    }

    #[test]
    fn wraps_and_drops_oldest() {
        let mut buf = LogRingBuffer::new(3);
        for i in 0..10 {
            buf.push(LogLevel::Warn, "registry", format!("msg-{i}"));
        }
        let messages: Vec<String> = buf.recent(0).into_iter().map(|e| e.message).collect();
        assert_eq!(messages, vec!["msg-7", "msg-8", "msg-9"]);
    }

    #[test]
    fn entry_serialises_camel_case() {
        let mut buf = LogRingBuffer::new(2);
        buf.push(LogLevel::Warn, "broken", "name is empty");
        let json = serde_json::to_value(&buf.recent(0)[0]).unwrap();
        assert_eq!(json["level"], "warn");
        assert_eq!(json["source"], "broken");
        assert!(json["timestampMs"].as_i64().unwrap() > 0);
    }
}
