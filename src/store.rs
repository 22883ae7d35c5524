// ABOUTME: Append-only in-memory caches shared between the session runtime and HTTP handlers.
// ABOUTME: AppendLog is the injectable container backing the invite and member lists.

use serde::{Deserialize, Serialize};
use std::sync::{Arc, RwLock};

/// A member observed joining the guild. Serializes with the wire keys the
/// forwarding endpoint expects.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemberRecord {
    pub discord_id: u64,
    pub username: String,
}

/// Append-only shared list. Cloning is cheap (shared backing storage).
///
/// The session context is the sole writer; HTTP handlers read
/// concurrently. Entries are appended whole, so `last` always reflects
/// the most recent completed append.
#[derive(Debug, Clone, Default)]
pub struct AppendLog<T> {
    entries: Arc<RwLock<Vec<T>>>,
}

impl<T: Clone> AppendLog<T> {
    pub fn new() -> Self {
        Self {
            entries: Arc::new(RwLock::new(Vec::new())),
        }
    }

    pub fn append(&self, item: T) {
        self.entries.write().expect("append log lock poisoned").push(item);
    }

    pub fn last(&self) -> Option<T> {
        self.entries
            .read()
            .expect("append log lock poisoned")
            .last()
            .cloned()
    }

    /// Copy of all entries in append order.
    pub fn snapshot(&self) -> Vec<T> {
        self.entries.read().expect("append log lock poisoned").clone()
    }

    pub fn len(&self) -> usize {
        self.entries.read().expect("append log lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn append_preserves_order() {
        let log = AppendLog::new();
        log.append("a".to_string());
        log.append("b".to_string());
        log.append("c".to_string());
        assert_eq!(log.snapshot(), vec!["a", "b", "c"]);
        assert_eq!(log.last(), Some("c".to_string()));
        assert_eq!(log.len(), 3);
    }

    #[test]
    fn empty_log() {
        let log: AppendLog<String> = AppendLog::new();
        assert!(log.is_empty());
        assert!(log.last().is_none());
        assert!(log.snapshot().is_empty());
    }

    #[test]
    fn clones_share_entries() {
        let log = AppendLog::new();
        let other = log.clone();
        log.append(1u64);
        assert_eq!(other.snapshot(), vec![1]);
    }

    #[test]
    fn member_record_wire_keys() {
        let record = MemberRecord {
            discord_id: 42,
            username: "harper".to_string(),
        };
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["discord_id"], 42);
        assert_eq!(json["username"], "harper");
    }
}
