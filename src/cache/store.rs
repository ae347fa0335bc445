//! Shared cache store
//!
//! The store owns the only shared mutable state in the process: the
//! source → cache map plus the global count of in-flight refreshes.
//! All mutation goes through the methods here, behind one mutex, and
//! no await point is ever reached while the lock is held. Readers
//! receive whole snapshots; a snapshot is replaced wholesale, never
//! field by field.

use crate::error::{CanopyError, CanopyResult};
use crate::rows;
use crate::tree::TreeIndex;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// One committed build result for a source.
#[derive(Debug)]
pub struct TreeSnapshot {
    /// Source mtime observed when the build pass started
    pub source_modified_at: DateTime<Utc>,

    /// When the build pass completed
    pub built_at: DateTime<Utc>,

    /// Frozen id → node index
    pub index: TreeIndex,
}

/// Outcome of asking to start a refresh.
///
/// Every non-`Admitted` outcome is a silent no-op for the caller; the
/// request path answers from a scoped build either way.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshAdmission {
    /// Caller owns the rebuild and must report back via `finish_refresh`
    Admitted,

    /// Global refresh ceiling reached
    AtCeiling,

    /// Another rebuild of this source is already in flight
    InProgress,

    /// Source name is not configured
    UnknownSource,
}

struct SourceEntry {
    path: PathBuf,
    snapshot: Option<Arc<TreeSnapshot>>,
    refreshing: bool,
}

struct StoreState {
    sources: HashMap<String, SourceEntry>,
    active_refreshes: usize,
}

/// Source → cache map shared between the query path and background
/// refresh tasks.
pub struct CacheStore {
    state: Mutex<StoreState>,
}

impl CacheStore {
    /// Create a store with one empty entry per configured source.
    ///
    /// Entries start with no snapshot and no refresh in flight; the
    /// staleness rule then forces a first build per source.
    pub fn new(sources: &HashMap<String, PathBuf>) -> Self {
        let sources = sources
            .iter()
            .map(|(name, path)| {
                (
                    name.clone(),
                    SourceEntry {
                        path: path.clone(),
                        snapshot: None,
                        refreshing: false,
                    },
                )
            })
            .collect();

        Self {
            state: Mutex::new(StoreState {
                sources,
                active_refreshes: 0,
            }),
        }
    }

    fn locked(&self) -> MutexGuard<'_, StoreState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Backing path of a configured source
    pub fn source_path(&self, source: &str) -> Option<PathBuf> {
        self.locked()
            .sources
            .get(source)
            .map(|entry| entry.path.clone())
    }

    /// Names of all configured sources
    pub fn source_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.locked().sources.keys().cloned().collect();
        names.sort();
        names
    }

    /// Current snapshot of a source, if one has ever been committed
    pub fn get(&self, source: &str) -> Option<Arc<TreeSnapshot>> {
        self.locked()
            .sources
            .get(source)
            .and_then(|entry| entry.snapshot.clone())
    }

    /// Replace a source's snapshot wholesale.
    pub fn put(&self, source: &str, snapshot: TreeSnapshot) {
        if let Some(entry) = self.locked().sources.get_mut(source) {
            entry.snapshot = Some(Arc::new(snapshot));
        }
    }

    /// Whether a rebuild of this source is currently in flight
    pub fn is_refreshing(&self, source: &str) -> bool {
        self.locked()
            .sources
            .get(source)
            .is_some_and(|entry| entry.refreshing)
    }

    /// Number of rebuilds currently in flight across all sources
    pub fn active_refreshes(&self) -> usize {
        self.locked().active_refreshes
    }

    /// Whether a source's snapshot is missing or older than the file.
    ///
    /// Takes a fresh stat of the backing path, so a missing file
    /// surfaces here as `SourceUnavailable`. The lock is released
    /// before the stat.
    pub async fn is_stale(&self, source: &str) -> CanopyResult<bool> {
        let (path, snapshot) = {
            let state = self.locked();
            let Some(entry) = state.sources.get(source) else {
                return Err(CanopyError::UnknownSource(source.to_string()));
            };
            (entry.path.clone(), entry.snapshot.clone())
        };

        let current_mtime = rows::last_modified(&path).await?;
        Ok(super::is_stale(snapshot.as_deref(), current_mtime))
    }

    /// Atomically claim the right to rebuild a source.
    ///
    /// The per-source flag and the global counter transition in one
    /// critical section; two concurrent callers can never both pass the
    /// ceiling and flag checks.
    pub fn try_begin_refresh(&self, source: &str, ceiling: usize) -> RefreshAdmission {
        let mut guard = self.locked();
        let state = &mut *guard;

        // A ceiling of zero disables background refreshing entirely.
        if state.active_refreshes >= ceiling {
            return RefreshAdmission::AtCeiling;
        }

        let Some(entry) = state.sources.get_mut(source) else {
            return RefreshAdmission::UnknownSource;
        };
        if entry.refreshing {
            return RefreshAdmission::InProgress;
        }

        entry.refreshing = true;
        state.active_refreshes += 1;
        RefreshAdmission::Admitted
    }

    /// Report the outcome of an admitted rebuild.
    ///
    /// On success the snapshot is committed and the refreshing flag
    /// cleared in the same critical section, so a reader never observes
    /// `refreshing == false` next to pre-rebuild data. On failure the
    /// previously committed snapshot stays in place untouched.
    pub fn finish_refresh(&self, source: &str, snapshot: Option<TreeSnapshot>) {
        let mut guard = self.locked();
        let state = &mut *guard;

        if let Some(entry) = state.sources.get_mut(source) {
            if let Some(snapshot) = snapshot {
                entry.snapshot = Some(Arc::new(snapshot));
            }
            entry.refreshing = false;
        }
        state.active_refreshes = state.active_refreshes.saturating_sub(1);
    }
}
