// Auto-save: debounced snapshot writes, restore-on-load and clear-after-submit.
//
// Write failures never reach the user; they are downgraded to a warning in the log.

pub mod storage;

use chrono::{DateTime, Utc};
use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::task::JoinHandle;

use crate::models::fields::{FieldSchema, FieldSnapshot};
use crate::utils::clock::Clock;
pub use storage::{FileStorage, MemoryStorage, Storage};

#[derive(Debug, thiserror::Error)]
pub enum PersistenceError {
    #[error("I/O error on {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("saved state is not valid JSON: {0}")]
    Corrupt(#[from] serde_json::Error),

    #[error("storage unavailable: {0}")]
    Unavailable(String),
}

/// The single document written to storage: one key per field plus `timestamp`.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct PersistedState {
    #[serde(flatten)]
    fields: BTreeMap<String, String>,
    timestamp: DateTime<Utc>,
}

impl PersistedState {
    fn from_snapshot(snapshot: &FieldSnapshot) -> Self {
        Self {
            fields: snapshot.values().clone(),
            timestamp: snapshot.captured_at(),
        }
    }
}

/// A saved session offered to the user at startup.
#[derive(Debug, Clone, PartialEq)]
pub struct RestoreCandidate {
    pub snapshot: FieldSnapshot,
    pub saved_at: DateTime<Utc>,
    pub age: String,
}

impl RestoreCandidate {
    pub fn prompt(&self) -> String {
        format!(
            "Found auto-saved data from {}. Would you like to restore it?",
            self.age
        )
    }
}

struct Pending {
    handle: JoinHandle<()>,
    snapshot: FieldSnapshot,
}

/// Called after every successful write with the saved snapshot's timestamp.
pub type SaveNotifier = Arc<dyn Fn(DateTime<Utc>) + Send + Sync>;

pub struct PersistenceManager {
    storage: Arc<dyn Storage>,
    clock: Arc<dyn Clock>,
    quiet_period: Duration,
    pending: Mutex<Option<Pending>>,
    on_saved: Arc<Mutex<Option<SaveNotifier>>>,
}

impl PersistenceManager {
    pub fn new(storage: Arc<dyn Storage>, clock: Arc<dyn Clock>, quiet_period: Duration) -> Self {
        Self {
            storage,
            clock,
            quiet_period,
            pending: Mutex::new(None),
            on_saved: Arc::new(Mutex::new(None)),
        }
    }

    /// Install the listener told about successful writes (the TUI's "Auto-saved" flash).
    pub fn set_on_saved(&self, notifier: SaveNotifier) {
        *self.on_saved.lock().unwrap_or_else(|e| e.into_inner()) = Some(notifier);
    }

    fn take_pending(&self) -> Option<Pending> {
        self.pending.lock().unwrap_or_else(|e| e.into_inner()).take()
    }

    /// Schedule a write of `snapshot` after the quiet period, replacing any pending write.
    pub fn record_change(&self, snapshot: FieldSnapshot) {
        if let Some(previous) = self.take_pending() {
            previous.handle.abort();
        }

        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            // No runtime (plain sync caller): write through.
            write_state(self.storage.as_ref(), &snapshot, &self.on_saved);
            return;
        };

        let storage = self.storage.clone();
        let on_saved = self.on_saved.clone();
        let quiet = self.quiet_period;
        let to_write = snapshot.clone();
        let handle = runtime.spawn(async move {
            tokio::time::sleep(quiet).await;
            write_state(storage.as_ref(), &to_write, &on_saved);
        });

        *self.pending.lock().unwrap_or_else(|e| e.into_inner()) = Some(Pending { handle, snapshot });
    }

    /// Write immediately. Failures are logged, never returned.
    pub fn write(&self, snapshot: &FieldSnapshot) {
        write_state(self.storage.as_ref(), snapshot, &self.on_saved);
    }

    /// Write a still-pending snapshot now (used on quit).
    pub fn flush(&self) {
        if let Some(pending) = self.take_pending() {
            if !pending.handle.is_finished() {
                pending.handle.abort();
                write_state(self.storage.as_ref(), &pending.snapshot, &self.on_saved);
            }
        }
    }

    /// Read the saved session, if any. Corrupt content is treated as absent.
    pub fn restore(&self, schema: &FieldSchema) -> Option<RestoreCandidate> {
        let raw = match self.storage.load() {
            Ok(Some(raw)) => raw,
            Ok(None) => return None,
            Err(e) => {
                warn!("[PHASE: autosave] [STEP: restore] Could not read saved state: {}", e);
                return None;
            }
        };

        let state: PersistedState = match serde_json::from_str(&raw) {
            Ok(s) => s,
            Err(e) => {
                warn!(
                    "[PHASE: autosave] [STEP: restore] Ignoring corrupt saved state: {}",
                    PersistenceError::from(e)
                );
                return None;
            }
        };

        let snapshot = FieldSnapshot::new(state.fields, state.timestamp).normalized(schema);
        let age = relative_age(state.timestamp, self.clock.now());
        info!("[PHASE: autosave] [STEP: restore] Found saved state from {}", age);
        Some(RestoreCandidate {
            snapshot,
            saved_at: state.timestamp,
            age,
        })
    }

    /// Drop any pending write and delete the saved state.
    pub fn clear(&self) {
        if let Some(pending) = self.take_pending() {
            pending.handle.abort();
        }
        match self.storage.remove() {
            Ok(()) => info!("[PHASE: autosave] [STEP: clear] Saved state cleared"),
            Err(e) => warn!("[PHASE: autosave] [STEP: clear] Could not clear saved state: {}", e),
        }
    }
}

fn write_state(
    storage: &dyn Storage,
    snapshot: &FieldSnapshot,
    on_saved: &Mutex<Option<SaveNotifier>>,
) {
    let state = PersistedState::from_snapshot(snapshot);
    let result = serde_json::to_string(&state)
        .map_err(PersistenceError::from)
        .and_then(|json| storage.save(&json));
    match result {
        Ok(()) => {
            let notifier = on_saved.lock().unwrap_or_else(|e| e.into_inner()).clone();
            if let Some(notify) = notifier {
                notify(state.timestamp);
            }
        }
        Err(e) => warn!("[PHASE: autosave] [STEP: write] Auto-save skipped: {}", e),
    }
}

/// Coarse, human-readable age of a saved state.
pub fn relative_age(saved: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let seconds = (now - saved).num_seconds();
    if seconds < 60 {
        return "just now".to_string();
    }
    let minutes = seconds / 60;
    if minutes < 60 {
        return plural(minutes, "minute");
    }
    let hours = minutes / 60;
    if hours < 24 {
        return plural(hours, "hour");
    }
    plural(hours / 24, "day")
}

fn plural(n: i64, unit: &str) -> String {
    if n == 1 {
        format!("1 {} ago", unit)
    } else {
        format!("{} {}s ago", n, unit)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::fields::{FieldStore, BIO_KI67, PATIENT_ID};
    use crate::utils::clock::FixedClock;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 6, 1, 10, 0, 0).unwrap()
    }

    fn manager(storage: Arc<dyn Storage>) -> PersistenceManager {
        PersistenceManager::new(storage, Arc::new(FixedClock(now())), Duration::from_millis(1000))
    }

    fn snapshot_with(id: &str) -> FieldSnapshot {
        let mut fields = FieldStore::new(Arc::new(FieldSchema::oncopredict()));
        fields.set(PATIENT_ID, id).unwrap();
        fields.snapshot(now() - chrono::Duration::minutes(5))
    }

    #[tokio::test(start_paused = true)]
    async fn burst_of_changes_writes_once_with_last_state() {
        let storage = Arc::new(MemoryStorage::new());
        let pm = manager(storage.clone());

        for id in ["P", "P-", "P-1", "P-12"] {
            pm.record_change(snapshot_with(id));
            tokio::time::sleep(Duration::from_millis(300)).await;
        }
        assert_eq!(storage.save_count(), 0);

        tokio::time::sleep(Duration::from_millis(1000)).await;
        assert_eq!(storage.save_count(), 1);
        let doc: serde_json::Value =
            serde_json::from_str(&storage.contents().unwrap()).unwrap();
        assert_eq!(doc["patientId"], "P-12");
        assert!(doc.get("timestamp").is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn saved_notifier_fires_once_per_debounced_write() {
        let storage = Arc::new(MemoryStorage::new());
        let pm = manager(storage.clone());
        let saves = Arc::new(Mutex::new(Vec::new()));
        let sink = saves.clone();
        pm.set_on_saved(Arc::new(move |at: DateTime<Utc>| sink.lock().unwrap().push(at)));

        for id in ["A", "AB", "ABC"] {
            pm.record_change(snapshot_with(id));
            tokio::time::sleep(Duration::from_millis(200)).await;
        }
        assert!(saves.lock().unwrap().is_empty());

        tokio::time::sleep(Duration::from_millis(1000)).await;
        assert_eq!(*saves.lock().unwrap(), vec![now() - chrono::Duration::minutes(5)]);

        pm.record_change(snapshot_with("ABCD"));
        tokio::time::sleep(Duration::from_millis(1100)).await;
        assert_eq!(saves.lock().unwrap().len(), 2);
        assert_eq!(storage.save_count(), 2);
    }

    #[test]
    fn failed_write_does_not_notify() {
        let pm = manager(Arc::new(MemoryStorage::failing()));
        let saves = Arc::new(Mutex::new(0));
        let sink = saves.clone();
        pm.set_on_saved(Arc::new(move |_: DateTime<Utc>| *sink.lock().unwrap() += 1));
        pm.write(&snapshot_with("P-1"));
        assert_eq!(*saves.lock().unwrap(), 0);
    }

    #[test]
    fn write_then_restore_round_trips() {
        let storage = Arc::new(MemoryStorage::new());
        let pm = manager(storage);
        let snap = snapshot_with("P-77");
        pm.write(&snap);

        let candidate = pm.restore(&FieldSchema::oncopredict()).unwrap();
        assert_eq!(candidate.snapshot, snap);
        assert_eq!(candidate.age, "5 minutes ago");
        assert_eq!(
            candidate.prompt(),
            "Found auto-saved data from 5 minutes ago. Would you like to restore it?"
        );
    }

    #[test]
    fn restore_normalizes_partial_documents() {
        let doc = r#"{"patientId":"OLD-1","timestamp":"2026-06-01T09:00:00Z","removedField":"x"}"#;
        let pm = manager(Arc::new(MemoryStorage::with_contents(doc)));
        let candidate = pm.restore(&FieldSchema::oncopredict()).unwrap();
        assert_eq!(candidate.snapshot.get(PATIENT_ID), "OLD-1");
        assert_eq!(candidate.snapshot.values().get(BIO_KI67).map(String::as_str), Some(""));
        assert!(!candidate.snapshot.values().contains_key("removedField"));
        assert_eq!(candidate.age, "1 hour ago");
    }

    #[test]
    fn corrupt_or_absent_state_is_ignored() {
        let schema = FieldSchema::oncopredict();
        assert!(manager(Arc::new(MemoryStorage::new())).restore(&schema).is_none());
        assert!(manager(Arc::new(MemoryStorage::with_contents("{not json")))
            .restore(&schema)
            .is_none());
        assert!(manager(Arc::new(MemoryStorage::with_contents(r#"{"patientId":"x"}"#)))
            .restore(&schema)
            .is_none());
    }

    #[test]
    fn failing_storage_is_silent() {
        let pm = manager(Arc::new(MemoryStorage::failing()));
        pm.write(&snapshot_with("P-1"));
        assert!(pm.restore(&FieldSchema::oncopredict()).is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn clear_cancels_pending_write() {
        let storage = Arc::new(MemoryStorage::new());
        let pm = manager(storage.clone());
        pm.write(&snapshot_with("P-1"));
        pm.record_change(snapshot_with("P-2"));
        pm.clear();

        tokio::time::sleep(Duration::from_secs(5)).await;
        assert!(storage.contents().is_none());
        assert_eq!(storage.save_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn flush_writes_pending_snapshot_immediately() {
        let storage = Arc::new(MemoryStorage::new());
        let pm = manager(storage.clone());
        pm.record_change(snapshot_with("P-9"));
        pm.flush();
        assert_eq!(storage.save_count(), 1);

        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(storage.save_count(), 1);
    }

    #[test]
    fn relative_age_pluralization() {
        let t = now();
        let ago = |s: i64| relative_age(t - chrono::Duration::seconds(s), t);
        assert_eq!(ago(0), "just now");
        assert_eq!(ago(59), "just now");
        assert_eq!(ago(60), "1 minute ago");
        assert_eq!(ago(119), "1 minute ago");
        assert_eq!(ago(120), "2 minutes ago");
        assert_eq!(ago(3600), "1 hour ago");
        assert_eq!(ago(7200), "2 hours ago");
        assert_eq!(ago(86_400), "1 day ago");
        assert_eq!(ago(3 * 86_400), "3 days ago");
        assert_eq!(relative_age(t + chrono::Duration::seconds(30), t), "just now");
    }
}
