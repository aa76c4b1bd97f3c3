//! Process-wide list of user-facing failures.
//!
//! The log is an ordered, append-only collection; each entry can be dismissed
//! independently. It is owned by the top-level application state and handed
//! to components as a cloned [`ErrorLog`] handle.

use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::warn;
use uuid::Uuid;

/// One user-facing failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorEntry {
    /// Identifier used for dismissal (UUIDv7, time-ordered).
    pub id: Uuid,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

/// Shared handle to the error list. Cloning yields another handle to the
/// same list.
#[derive(Debug, Clone, Default)]
pub struct ErrorLog {
    entries: Arc<Mutex<Vec<ErrorEntry>>>,
}

impl ErrorLog {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<ErrorEntry>> {
        // A panic while holding the lock cannot leave the Vec half-written.
        self.entries.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Append an entry and return its id.
    pub fn add(&self, message: impl Into<String>, details: Option<String>) -> Uuid {
        let entry = ErrorEntry {
            id: Uuid::now_v7(),
            message: message.into(),
            details,
            occurred_at: Utc::now(),
        };
        warn!(
            subsystem = "wiki",
            component = "error_log",
            error = %entry.message,
            details = entry.details.as_deref().unwrap_or(""),
            "User-facing error recorded"
        );
        let id = entry.id;
        self.lock().push(entry);
        id
    }

    /// Remove one entry. Returns false if it was already gone.
    pub fn dismiss(&self, id: Uuid) -> bool {
        let mut entries = self.lock();
        let before = entries.len();
        entries.retain(|e| e.id != id);
        entries.len() != before
    }

    /// Snapshot of all entries, oldest first.
    pub fn entries(&self) -> Vec<ErrorEntry> {
        self.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn clear(&self) {
        self.lock().clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_preserves_order() {
        let log = ErrorLog::new();
        log.add("first", None);
        log.add("second", Some("step: upload".to_string()));
        let entries = log.entries();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].message, "first");
        assert_eq!(entries[1].details.as_deref(), Some("step: upload"));
    }

    #[test]
    fn test_dismiss_is_independent() {
        let log = ErrorLog::new();
        let a = log.add("a", None);
        let b = log.add("b", None);
        assert!(log.dismiss(a));
        assert!(!log.dismiss(a));
        let remaining = log.entries();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].id, b);
    }

    #[test]
    fn test_clones_share_entries() {
        let log = ErrorLog::new();
        let handle = log.clone();
        handle.add("from handle", None);
        assert_eq!(log.len(), 1);
        log.clear();
        assert!(handle.is_empty());
    }
}
