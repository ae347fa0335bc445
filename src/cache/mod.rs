//! Per-source tree caches with staleness detection

pub mod store;

pub use store::{CacheStore, RefreshAdmission, TreeSnapshot};

use chrono::{DateTime, Utc};

/// Staleness detector.
///
/// A source with no committed snapshot is always stale, which forces at
/// least one build attempt before the first cached serve. Otherwise the
/// cache is stale when the file's current mtime is newer than the mtime
/// recorded when the snapshot's build pass started.
pub fn is_stale(snapshot: Option<&TreeSnapshot>, current_mtime: DateTime<Utc>) -> bool {
    match snapshot {
        None => true,
        Some(snapshot) => current_mtime > snapshot.source_modified_at,
    }
}
