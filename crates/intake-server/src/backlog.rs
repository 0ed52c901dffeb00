//! Append-only backlog of accepted submission payloads.
//!
//! Entries live in memory for the process lifetime. The store only ever
//! grows, so any snapshot is a consistent prefix of the arrival order.

use serde_json::Value;

/// Ordered in-memory history of accepted submissions since process start.
#[derive(Debug, Default)]
pub struct BacklogStore {
    entries: Vec<Value>,
}

impl BacklogStore {
    /// Create an empty backlog.
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Append one entry at the end. Infallible; there is no I/O behind this.
    pub fn append(&mut self, entry: Value) {
        self.entries.push(entry);
    }

    /// The full ordered sequence of entries as of this call.
    ///
    /// Callers may not rely on the result reflecting entries appended after
    /// the call returns.
    pub fn snapshot(&self) -> Vec<Value> {
        self.entries.clone()
    }

    /// Number of entries stored.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no submissions have been accepted yet.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
