// Shared bottle state
//
// One lock covers the bottle collection, the active bottle, the error slot and
// the running-job marker. Nothing here notifies anyone: job results reach the
// interface thread only through the point-to-point EventDispatcher, after the
// worker has finished writing here.

use crate::models::{AppState, BottleRecord, JobKind};
use camino::{Utf8Path, Utf8PathBuf};
use std::sync::{Arc, RwLock};

/// Handle to the shared [`AppState`].
///
/// Clones share the same state. The interface thread and the lifecycle
/// workers both go through this type; nothing touches [`AppState`] directly.
#[derive(Clone, Default)]
pub struct StateManager {
    state: Arc<RwLock<AppState>>,
}

impl StateManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Clone of the whole state
    pub fn snapshot(&self) -> AppState {
        self.state.read().unwrap().clone()
    }

    /// Run `f` under the read lock
    ///
    /// # Example
    /// ```ignore
    /// let count = state_manager.read(|state| state.bottles.len());
    /// ```
    pub fn read<F, R>(&self, f: F) -> R
    where
        F: FnOnce(&AppState) -> R,
    {
        let state = self.state.read().unwrap();
        f(&state)
    }

    /// Mutate the state under the write lock.
    ///
    /// Everything `update_fn` changes becomes visible to readers at once.
    pub fn update<F, R>(&self, update_fn: F) -> R
    where
        F: FnOnce(&mut AppState) -> R,
    {
        let mut state = self.state.write().unwrap();
        update_fn(&mut state)
    }

    /// Replace the bottle collection after a full scan
    pub fn replace_bottles(&self, bottles: Vec<BottleRecord>, wine_version: String) {
        self.update(|state| {
            state.replace_bottles(bottles);
            state.wine_version = wine_version;
        });
        tracing::debug!("Bottle collection replaced");
    }

    /// Insert or replace a single record
    pub fn upsert_bottle(&self, record: BottleRecord) {
        self.update(|state| state.upsert_bottle(record))
    }

    /// Remove a record, clearing the selection if it pointed at it
    pub fn remove_bottle(&self, prefix: &Utf8Path) {
        self.update(|state| {
            state.remove_bottle(prefix);
        })
    }

    /// Set the selection without validation; callers check membership first
    pub fn set_active(&self, prefix: Option<Utf8PathBuf>) {
        self.update(|state| state.active = prefix)
    }

    /// Record a failure in the error slot
    pub fn set_error(&self, message: impl Into<String>) {
        let message = message.into();
        tracing::error!("{}", message);
        self.update(|state| state.set_error(message))
    }

    /// Read and clear the error slot
    pub fn take_error(&self) -> Option<String> {
        self.update(|state| state.error_message.take())
    }

    /// Mark a lifecycle job as running
    pub fn begin_job(&self, kind: JobKind) {
        self.update(|state| state.running_job = Some(kind))
    }

    /// Clear the running job marker
    pub fn end_job(&self) {
        self.update(|state| state.running_job = None)
    }
}
