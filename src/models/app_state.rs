use crate::models::bottle::BottleRecord;
use camino::{Utf8Path, Utf8PathBuf};
use std::fmt;

/// Maximum number of lifecycle jobs (refresh/create/update/clone/delete) in flight.
///
/// Enforced by [`crate::manager::BottleManager`]: a new job is rejected while
/// the previous worker thread has not been joined.
pub const MAX_CONCURRENT_LIFECYCLE_JOBS: usize = 1;

/// Kind of a lifecycle job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JobKind {
    Refresh,
    Create,
    Update,
    Clone,
    Delete,
}

impl fmt::Display for JobKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            JobKind::Refresh => "refresh",
            JobKind::Create => "create",
            JobKind::Update => "update",
            JobKind::Clone => "clone",
            JobKind::Delete => "delete",
        };
        f.write_str(label)
    }
}

/// Single source of truth for bottle state.
///
/// Wrapped in `Arc<RwLock<AppState>>` by [`crate::state::StateManager`]; the
/// entity store, the active selection and the error slot therefore share one
/// lock and are never observed half-updated.
#[derive(Clone, Debug, Default)]
pub struct AppState {
    /// Current bottle collection, sorted by name
    pub bottles: Vec<BottleRecord>,

    /// Prefix path of the selected bottle
    pub active: Option<Utf8PathBuf>,

    /// Most recent failure, consumed by the interface
    pub error_message: Option<String>,

    /// Lifecycle job currently running, if any
    pub running_job: Option<JobKind>,

    /// Output of `wine --version` at the last scan
    pub wine_version: String,
}

impl AppState {
    /// Resolve the active id against the current collection
    pub fn active_bottle(&self) -> Option<&BottleRecord> {
        let active = self.active.as_deref()?;
        self.find(active)
    }

    pub fn find(&self, prefix: &Utf8Path) -> Option<&BottleRecord> {
        self.bottles.iter().find(|b| b.prefix == prefix)
    }

    pub fn find_by_name(&self, name: &str) -> Option<&BottleRecord> {
        self.bottles.iter().find(|b| b.name == name)
    }

    pub fn contains_name(&self, name: &str) -> bool {
        self.find_by_name(name).is_some()
    }

    /// Replace the whole collection and re-resolve the active id.
    ///
    /// The active id survives only if its prefix is still present.
    pub fn replace_bottles(&mut self, bottles: Vec<BottleRecord>) {
        self.bottles = bottles;
        if let Some(active) = self.active.take() {
            if self.find(&active).is_some() {
                self.active = Some(active);
            } else {
                tracing::debug!("Active bottle {} vanished after rescan", active);
            }
        }
    }

    /// Insert a record keeping name order, replacing any record with the same prefix
    pub fn upsert_bottle(&mut self, record: BottleRecord) {
        if let Some(existing) = self.bottles.iter_mut().find(|b| b.prefix == record.prefix) {
            *existing = record;
            return;
        }
        let pos = self
            .bottles
            .binary_search_by(|b| b.name.cmp(&record.name))
            .unwrap_or_else(|pos| pos);
        self.bottles.insert(pos, record);
    }

    /// Remove a record; clears the active id if it pointed at it
    pub fn remove_bottle(&mut self, prefix: &Utf8Path) -> Option<BottleRecord> {
        let pos = self.bottles.iter().position(|b| b.prefix == prefix)?;
        if self.active.as_deref() == Some(prefix) {
            self.active = None;
        }
        Some(self.bottles.remove(pos))
    }

    /// Overwrite the error slot (last write wins)
    pub fn set_error(&mut self, message: impl Into<String>) {
        self.error_message = Some(message.into());
    }
}
