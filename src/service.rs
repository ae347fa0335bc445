//! Query façade
//!
//! The one entry point the transport layer calls: a lookup that serves
//! from a warm cache when it can, and otherwise answers from a scoped
//! build over the file while a background rebuild warms the cache for
//! later requests. The scoped pass and the background rebuild read the
//! source independently and share no partial state.

use crate::cache::CacheStore;
use crate::config::Config;
use crate::error::{CanopyError, CanopyResult};
use crate::refresh::RefreshDispatcher;
use crate::tree::{self, BuildScope, Node};
use std::sync::Arc;
use tracing::debug;

/// Tree lookup service over a set of configured sources.
pub struct TreeService {
    store: Arc<CacheStore>,
    dispatcher: RefreshDispatcher,
}

impl TreeService {
    /// Build the service from loaded configuration. Constructed once
    /// at startup and shared behind an `Arc`.
    pub fn new(config: &Config) -> Self {
        let store = Arc::new(CacheStore::new(&config.sources));
        let dispatcher = RefreshDispatcher::new(Arc::clone(&store), config.refresh.max_workers);
        Self { store, dispatcher }
    }

    /// Shared cache store, for inspection
    pub fn store(&self) -> &CacheStore {
        &self.store
    }

    /// Look up the subtree rooted at `id` within a named source.
    ///
    /// `Ok(None)` is the normal negative result for an id that does not
    /// exist. An unconfigured name or a missing backing file is an
    /// error; so is a decode failure during a scoped pass.
    pub async fn lookup(&self, source: &str, id: u64) -> CanopyResult<Option<Arc<Node>>> {
        let path = self
            .store
            .source_path(source)
            .ok_or_else(|| CanopyError::UnknownSource(source.to_string()))?;

        // The staleness probe stats the backing file, so a vanished
        // source fails here before any build work starts.
        if !self.store.is_stale(source).await? {
            if let Some(snapshot) = self.store.get(source) {
                debug!(source, id, "serving from cache");
                return Ok(snapshot.index.get(id));
            }
        }

        // Cold or stale: warm the cache in the background (admission
        // controlled, non-blocking) and answer this request from a
        // scoped pass.
        self.dispatcher.request_refresh(source);

        debug!(source, id, "serving from scoped build");
        let index = tree::build_tree(&path, BuildScope::Subtree(id)).await?;
        Ok(index.get(id))
    }
}
