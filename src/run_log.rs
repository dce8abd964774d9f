//! Bounded, persisted run history.
//!
//! The store keeps the 20 most recent completed runs, newest first. Every
//! mutation is persisted synchronously through the key-value collaborator
//! before the call returns; a failed persist is logged and swallowed so it
//! never fails the triggering operation. Loading tolerates absent or
//! malformed persisted data by starting empty.

use std::sync::Arc;

use crate::persist::{KvStore, load_or_default, save_logged};
use crate::types::{RUN_HISTORY_CAP, RunRecord};

/// Storage key for the persisted run history.
pub const RUN_HISTORY_KEY: &str = "run-history";

/// Append-only (plus explicit deletion) log of completed runs.
pub struct RunHistoryStore {
    records: Vec<RunRecord>,
    store: Arc<dyn KvStore>,
}

impl RunHistoryStore {
    /// Load the persisted log, substituting an empty sequence on absent or
    /// malformed data.
    #[must_use]
    pub fn load(store: Arc<dyn KvStore>) -> Self {
        let records: Vec<RunRecord> = load_or_default(store.as_ref(), RUN_HISTORY_KEY);
        Self { records, store }
    }

    /// Prepend a completed run, evicting the oldest entries beyond the cap,
    /// and persist the new sequence.
    pub fn append(&mut self, record: RunRecord) {
        self.records.insert(0, record);
        self.records.truncate(RUN_HISTORY_CAP);
        self.persist();
    }

    /// Delete the record with `id`, if present, and persist. No-op for an
    /// unknown id.
    pub fn remove(&mut self, id: &str) {
        let before = self.records.len();
        self.records.retain(|r| r.id != id);
        if self.records.len() != before {
            self.persist();
        }
    }

    /// Full contents, newest first.
    #[must_use]
    pub fn list(&self) -> &[RunRecord] {
        &self.records
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    fn persist(&self) {
        save_logged(self.store.as_ref(), RUN_HISTORY_KEY, &self.records);
    }
}
