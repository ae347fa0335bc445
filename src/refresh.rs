//! Bounded background cache refresh
//!
//! A refresh rebuilds one source's full tree off the request path. The
//! store's atomic claim enforces at most one rebuild per source plus a
//! global ceiling across sources; anything past those limits is a
//! silent no-op and the request that wanted it answers from a scoped
//! build instead.

use crate::cache::{CacheStore, RefreshAdmission, TreeSnapshot};
use crate::error::CanopyResult;
use crate::rows;
use crate::tree::{self, BuildScope};
use chrono::Utc;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Admission-controlled launcher for background rebuild tasks.
pub struct RefreshDispatcher {
    store: Arc<CacheStore>,
    max_workers: usize,
}

impl RefreshDispatcher {
    /// `max_workers` is the global rebuild ceiling; zero disables
    /// background refreshing entirely.
    pub fn new(store: Arc<CacheStore>, max_workers: usize) -> Self {
        Self { store, max_workers }
    }

    /// Kick off a background rebuild of one source, if admitted.
    ///
    /// Never blocks. A deferred refresh returns immediately with no
    /// side effect; the next request may try again. An admitted refresh
    /// runs to completion or failure, with no cancellation and no
    /// timeout.
    pub fn request_refresh(&self, source: &str) -> RefreshAdmission {
        let Some(path) = self.store.source_path(source) else {
            return RefreshAdmission::UnknownSource;
        };

        let admission = self.store.try_begin_refresh(source, self.max_workers);
        match admission {
            RefreshAdmission::Admitted => {
                let store = Arc::clone(&self.store);
                let source = source.to_string();
                tokio::spawn(async move {
                    run_rebuild(store, source, path).await;
                });
            }
            _ => {
                debug!(source, ?admission, "refresh deferred");
            }
        }

        admission
    }
}

async fn run_rebuild(store: Arc<CacheStore>, source: String, path: PathBuf) {
    info!(source = %source, "rebuilding cache");

    match rebuild(&path).await {
        Ok(snapshot) => {
            info!(source = %source, nodes = snapshot.index.len(), "cache rebuilt");
            store.finish_refresh(&source, Some(snapshot));
        }
        Err(e) => {
            warn!(source = %source, error = %e, "cache rebuild failed");
            store.finish_refresh(&source, None);
        }
    }
}

/// Full build of one source into a replacement snapshot.
///
/// The source mtime is recorded before the pass starts, so an edit that
/// lands mid-build leaves the new snapshot stale on the next check.
async fn rebuild(path: &Path) -> CanopyResult<TreeSnapshot> {
    let source_modified_at = rows::last_modified(path).await?;
    let index = tree::build_tree(path, BuildScope::Full).await?;

    Ok(TreeSnapshot {
        source_modified_at,
        built_at: Utc::now(),
        index,
    })
}
