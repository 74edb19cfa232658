//! Sync options, outcome statistics, and the pass-level error type.

use thiserror::Error;

use crate::cache::StoreError;
use crate::gitea::GiteaError;

/// Default bound on concurrently running repository index tasks.
///
/// This caps logical tasks, not raw HTTP requests; those are additionally
/// capped by the client's own request limit.
pub const DEFAULT_INDEX_CONCURRENCY: usize = 5;

/// What to do when the persisted document exists but cannot be decoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CorruptSnapshotPolicy {
    /// Fail the pass. A corrupt snapshot may mask data loss, so nothing is
    /// overwritten until an operator looks at it. This is the default.
    #[default]
    Fail,
    /// Log a warning, start from an empty document, and re-index everything.
    StartEmpty,
}

/// Tunables for a sync pass.
#[derive(Debug, Clone)]
pub struct SyncOptions {
    /// Maximum number of repositories indexed concurrently.
    pub concurrency: usize,
    /// Policy for a malformed persisted document.
    pub corrupt_snapshot: CorruptSnapshotPolicy,
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self {
            concurrency: DEFAULT_INDEX_CONCURRENCY,
            corrupt_snapshot: CorruptSnapshotPolicy::default(),
        }
    }
}

/// Statistics from one successful pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncOutcome {
    /// Repositories reported by the live listing.
    pub repos: usize,
    /// Repositories whose tags and branches were re-fetched this pass.
    pub reindexed: usize,
    /// Repositories carried forward untouched.
    pub unchanged: usize,
    /// Stale entries removed from the document.
    pub pruned: usize,
}

/// A failed pass. There is no partial commit: whatever the cause, the
/// previously persisted snapshot remains authoritative and the next
/// scheduled pass retries from it.
#[derive(Debug, Error)]
pub enum SyncError {
    /// A remote listing or indexing call failed.
    #[error(transparent)]
    Remote(#[from] GiteaError),

    /// The cache document could not be read or written.
    #[error(transparent)]
    Store(#[from] StoreError),
}
