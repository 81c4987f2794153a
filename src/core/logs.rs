//! Operator-facing log stream types.
//!
//! Workers emit [`LogEntry`] values over their log channel; the
//! orchestrator drains them for display. UI-specific formatting and
//! presentation are left to the frontend.

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};

/// A log entry with timestamp and message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEntry {
    pub timestamp: DateTime<Local>,
    pub message: String,
    pub level: LogLevel,
}

/// Log entry severity level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LogLevel {
    Info,
    Warning,
    Error,
}

impl LogEntry {
    /// Create a new log entry with the current timestamp.
    pub fn new(message: String, level: LogLevel) -> Self {
        Self {
            timestamp: Local::now(),
            message,
            level,
        }
    }

    /// Create an info-level log entry.
    pub fn info(message: String) -> Self {
        Self::new(message, LogLevel::Info)
    }

    /// Create a warning-level log entry.
    pub fn warning(message: String) -> Self {
        Self::new(message, LogLevel::Warning)
    }

    /// Create an error-level log entry.
    pub fn error(message: String) -> Self {
        Self::new(message, LogLevel::Error)
    }

    /// Serialize for frontends that persist or ship the log stream.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

/// A simple log buffer that stores recent log entries.
pub struct LogBuffer {
    entries: Vec<LogEntry>,
    max_entries: usize,
}

impl LogBuffer {
    /// Create a new log buffer with a maximum number of entries.
    pub fn new(max_entries: usize) -> Self {
        Self {
            entries: Vec::new(),
            max_entries,
        }
    }

    /// Add a log entry to the buffer, trimming the oldest past the cap.
    pub fn push(&mut self, entry: LogEntry) {
        self.entries.push(entry);

        if self.entries.len() > self.max_entries {
            let excess = self.entries.len() - self.max_entries;
            self.entries.drain(0..excess);
        }
    }

    /// Get all log entries.
    pub fn entries(&self) -> &[LogEntry] {
        &self.entries
    }

    /// Get the number of log entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if the buffer is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Clear all log entries.
    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

impl Default for LogBuffer {
    fn default() -> Self {
        Self::new(1000)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entries_round_trip_through_json() {
        let entry = LogEntry::warning("camera_001 stalled".to_string());
        let json = entry.to_json().expect("serialize");
        let back: LogEntry = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(back.message, entry.message);
        assert_eq!(back.level, LogLevel::Warning);
    }

    #[test]
    fn buffer_trims_oldest_entries() {
        let mut buffer = LogBuffer::new(3);
        for i in 0..5 {
            buffer.push(LogEntry::info(format!("line {i}")));
        }
        assert_eq!(buffer.len(), 3);
        assert_eq!(buffer.entries()[0].message, "line 2");
        assert_eq!(buffer.entries()[2].message, "line 4");
    }
}
