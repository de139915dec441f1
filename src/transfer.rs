//! Transfer records and the shared transfer store.
//!
//! The store is the only state mutated from more than one task: the
//! subprocess stderr consumer writes progress into it while the dashboard
//! and the caller read snapshots out of it. Every operation takes the
//! internal lock; readers always receive cloned records, never references
//! into the map.

use crate::error::FerryError;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::Duration;

/// Lifecycle status of a transfer.
///
/// `Pending -> InProgress -> {Completed | Failed}`; terminal states are
/// never left.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Status {
    Pending,
    InProgress,
    Completed,
    Failed,
}

impl Status {
    pub fn is_terminal(self) -> bool {
        matches!(self, Status::Completed | Status::Failed)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Status::Pending => "pending",
            Status::InProgress => "in_progress",
            Status::Completed => "completed",
            Status::Failed => "failed",
        }
    }
}

/// One tracked source-to-destination operation.
///
/// `bytes_copied`/`bytes_total` are advisory display fields fed by the
/// progress parser; they never gate status transitions. `bytes_total` is 0
/// while unknown.
#[derive(Debug, Clone)]
pub struct Transfer {
    pub id: String,
    pub source: String,
    pub destination: String,
    pub status: Status,
    /// Percentage in [0, 100], as last reported by rclone.
    pub progress: f64,
    pub bytes_copied: u64,
    pub bytes_total: u64,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    /// Terminal failure, present only in `Failed`.
    pub error: Option<Arc<FerryError>>,
}

impl Transfer {
    fn new(id: String, source: String, destination: String) -> Self {
        Transfer {
            id,
            source,
            destination,
            status: Status::Pending,
            progress: 0.0,
            bytes_copied: 0,
            bytes_total: 0,
            started_at: None,
            finished_at: None,
            error: None,
        }
    }

    /// Elapsed time: zero if never started, running time while live,
    /// start-to-end once terminal. Never negative.
    pub fn duration(&self) -> Duration {
        let Some(started) = self.started_at else {
            return Duration::ZERO;
        };
        let end = self.finished_at.unwrap_or_else(Utc::now);
        (end - started).to_std().unwrap_or(Duration::ZERO)
    }

    /// Average transfer speed in bytes per second.
    pub fn speed(&self) -> f64 {
        let secs = self.duration().as_secs_f64();
        if secs == 0.0 {
            return 0.0;
        }
        self.bytes_copied as f64 / secs
    }
}

/// Per-status counts across the store.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct StoreStats {
    pub pending: usize,
    pub in_progress: usize,
    pub completed: usize,
    pub failed: usize,
}

impl StoreStats {
    /// Transfers that have not reached a terminal state.
    pub fn active(&self) -> usize {
        self.pending + self.in_progress
    }
}

#[derive(Debug, Default)]
struct StoreInner {
    transfers: HashMap<String, Transfer>,
    // Insertion order for stable get_all iteration.
    order: Vec<String>,
}

/// Thread-safe store of all tracked transfers. Cloning the handle shares
/// the underlying state.
#[derive(Debug, Clone, Default)]
pub struct TransferStore {
    inner: Arc<RwLock<StoreInner>>,
}

impl TransferStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a transfer in `Pending` with zero progress.
    ///
    /// Re-adding an existing id deterministically resets the record to a
    /// fresh pending transfer while keeping its original position in
    /// iteration order; prior progress is never merged.
    pub fn add(
        &self,
        id: impl Into<String>,
        source: impl Into<String>,
        destination: impl Into<String>,
    ) -> Transfer {
        let id = id.into();
        let transfer = Transfer::new(id.clone(), source.into(), destination.into());
        let mut inner = self.write();
        if !inner.transfers.contains_key(&id) {
            inner.order.push(id.clone());
        }
        inner.transfers.insert(id, transfer.clone());
        transfer
    }

    /// Mark a transfer in progress and record its start time. No-op for
    /// unknown ids and for records already past `Pending`.
    pub fn start(&self, id: &str) {
        let mut inner = self.write();
        if let Some(t) = inner.transfers.get_mut(id) {
            if t.status == Status::Pending {
                t.status = Status::InProgress;
                t.started_at = Some(Utc::now());
            }
        }
    }

    /// Apply a parsed progress tuple. Applies to whatever status the record
    /// has; only meaningful while `InProgress`, and callers must not call
    /// it after a terminal transition.
    pub fn update_progress(&self, id: &str, progress: f64, bytes_copied: u64, bytes_total: u64) {
        let mut inner = self.write();
        if let Some(t) = inner.transfers.get_mut(id) {
            t.progress = progress;
            t.bytes_copied = bytes_copied;
            t.bytes_total = bytes_total;
        }
    }

    /// Mark a transfer completed, forcing progress to 100. No-op if the
    /// record is already terminal.
    pub fn complete(&self, id: &str) {
        let mut inner = self.write();
        if let Some(t) = inner.transfers.get_mut(id) {
            if !t.status.is_terminal() {
                t.status = Status::Completed;
                t.progress = 100.0;
                t.finished_at = Some(Utc::now());
            }
        }
    }

    /// Mark a transfer failed with its terminal error. No-op if the record
    /// is already terminal.
    pub fn fail(&self, id: &str, err: FerryError) {
        let mut inner = self.write();
        if let Some(t) = inner.transfers.get_mut(id) {
            if !t.status.is_terminal() {
                t.status = Status::Failed;
                t.finished_at = Some(Utc::now());
                t.error = Some(Arc::new(err));
            }
        }
    }

    pub fn get(&self, id: &str) -> Option<Transfer> {
        self.read().transfers.get(id).cloned()
    }

    /// Snapshot of all transfers in insertion order.
    pub fn get_all(&self) -> Vec<Transfer> {
        let inner = self.read();
        inner
            .order
            .iter()
            .filter_map(|id| inner.transfers.get(id))
            .cloned()
            .collect()
    }

    pub fn stats(&self) -> StoreStats {
        let inner = self.read();
        let mut stats = StoreStats::default();
        for t in inner.transfers.values() {
            match t.status {
                Status::Pending => stats.pending += 1,
                Status::InProgress => stats.in_progress += 1,
                Status::Completed => stats.completed += 1,
                Status::Failed => stats.failed += 1,
            }
        }
        stats
    }

    pub fn len(&self) -> usize {
        self.read().transfers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().transfers.is_empty()
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, StoreInner> {
        self.inner.read().expect("transfer store lock poisoned")
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, StoreInner> {
        self.inner.write().expect("transfer store lock poisoned")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_starts_pending() {
        let store = TransferStore::new();
        let t = store.add("t1", "/src/file", "remote:dest");
        assert_eq!(t.status, Status::Pending);
        assert_eq!(t.progress, 0.0);
        assert!(t.started_at.is_none());
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_lifecycle_success() {
        let store = TransferStore::new();
        store.add("t1", "a", "b");
        store.start("t1");

        let t = store.get("t1").unwrap();
        assert_eq!(t.status, Status::InProgress);
        assert!(t.started_at.is_some());

        store.update_progress("t1", 42.0, 420, 1000);
        store.complete("t1");

        let t = store.get("t1").unwrap();
        assert_eq!(t.status, Status::Completed);
        assert_eq!(t.progress, 100.0);
        assert!(t.finished_at.unwrap() >= t.started_at.unwrap());
    }

    #[test]
    fn test_complete_without_start_has_zero_duration() {
        let store = TransferStore::new();
        store.add("t1", "a", "b");
        store.complete("t1");

        let t = store.get("t1").unwrap();
        assert_eq!(t.status, Status::Completed);
        assert_eq!(t.duration(), Duration::ZERO);
    }

    #[test]
    fn test_fail_records_error_and_end_time() {
        let store = TransferStore::new();
        store.add("t1", "a", "b");
        store.start("t1");
        store.fail("t1", FerryError::Output("connection reset".into()));

        let t = store.get("t1").unwrap();
        assert_eq!(t.status, Status::Failed);
        assert!(t.finished_at.unwrap() >= t.started_at.unwrap());
        assert!(t.error.unwrap().to_string().contains("connection reset"));
    }

    #[test]
    fn test_terminal_states_are_final() {
        let store = TransferStore::new();
        store.add("t1", "a", "b");
        store.complete("t1");
        store.fail("t1", FerryError::Output("too late".into()));
        assert_eq!(store.get("t1").unwrap().status, Status::Completed);

        store.add("t2", "a", "b");
        store.fail("t2", FerryError::Output("boom".into()));
        store.complete("t2");
        let t2 = store.get("t2").unwrap();
        assert_eq!(t2.status, Status::Failed);
        assert!(t2.error.is_some());
    }

    #[test]
    fn test_last_update_wins() {
        let store = TransferStore::new();
        store.add("t1", "a", "b");
        store.start("t1");
        for (pct, copied) in [(10.0, 100u64), (55.0, 550), (90.0, 900)] {
            store.update_progress("t1", pct, copied, 1000);
        }
        let t = store.get("t1").unwrap();
        assert_eq!(t.progress, 90.0);
        assert_eq!(t.bytes_copied, 900);
    }

    #[test]
    fn test_get_all_keeps_insertion_order() {
        let store = TransferStore::new();
        for id in ["c", "a", "b"] {
            store.add(id, "src", "dst");
        }
        let ids: Vec<_> = store.get_all().into_iter().map(|t| t.id).collect();
        assert_eq!(ids, vec!["c", "a", "b"]);
    }

    #[test]
    fn test_re_add_resets_in_place() {
        let store = TransferStore::new();
        store.add("a", "src", "dst");
        store.add("b", "src", "dst");
        store.start("a");
        store.update_progress("a", 50.0, 500, 1000);

        store.add("a", "src2", "dst2");
        let t = store.get("a").unwrap();
        assert_eq!(t.status, Status::Pending);
        assert_eq!(t.progress, 0.0);
        assert_eq!(t.source, "src2");

        // Position is retained, not moved to the back.
        let ids: Vec<_> = store.get_all().into_iter().map(|t| t.id).collect();
        assert_eq!(ids, vec!["a", "b"]);
    }

    #[test]
    fn test_stats_counts() {
        let store = TransferStore::new();
        store.add("p", "s", "d");
        store.add("i", "s", "d");
        store.add("c", "s", "d");
        store.add("f", "s", "d");
        store.start("i");
        store.complete("c");
        store.fail("f", FerryError::Output("x".into()));

        let stats = store.stats();
        assert_eq!(stats.pending, 1);
        assert_eq!(stats.in_progress, 1);
        assert_eq!(stats.completed, 1);
        assert_eq!(stats.failed, 1);
        assert_eq!(stats.active(), 2);
    }

    #[test]
    fn test_concurrent_updates() {
        let store = TransferStore::new();
        store.add("t1", "a", "b");
        store.start("t1");

        let mut handles = Vec::new();
        for i in 0..8u64 {
            let store = store.clone();
            handles.push(std::thread::spawn(move || {
                for j in 0..100u64 {
                    store.update_progress("t1", (i * j) as f64 % 100.0, i * j, 10_000);
                    let t = store.get("t1").unwrap();
                    // Never observe a torn record.
                    assert_eq!(t.id, "t1");
                }
            }));
        }
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(store.get("t1").unwrap().status, Status::InProgress);
    }
}
