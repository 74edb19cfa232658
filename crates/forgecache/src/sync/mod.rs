//! Synchronization engine: one pass keeps the cache document consistent
//! with the remote listing.

mod engine;
mod types;

pub use engine::SyncEngine;
pub use types::{
    CorruptSnapshotPolicy, DEFAULT_INDEX_CONCURRENCY, SyncError, SyncOptions, SyncOutcome,
};
