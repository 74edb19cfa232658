//! Forgecache - an incremental Gitea metadata cache synchronizer.
//!
//! Keeps a Redis-held cache of an organization's repositories consistent
//! with a Gitea instance. Each pass lists the organization's repositories,
//! re-indexes (tags + branches) only those that are new or whose
//! `updated_at` changed, prunes entries for repositories that disappeared,
//! and atomically replaces the persisted snapshot.
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use forgecache::{
//!     CacheStore, GiteaClient, RedisBackend, SyncEngine, SyncOptions,
//!     DEFAULT_PAGE_SIZE, DEFAULT_REQUEST_LIMIT,
//! };
//!
//! let client = GiteaClient::new(
//!     "https://git.almalinux.org",
//!     DEFAULT_REQUEST_LIMIT,
//!     DEFAULT_PAGE_SIZE,
//! )?;
//! let backend = RedisBackend::connect("redis://redis:6379").await?;
//! let store = CacheStore::new(Arc::new(backend), "gitea_cache");
//!
//! let engine = SyncEngine::new(client, store, SyncOptions::default());
//! let outcome = engine.run("rpms").await?;
//! println!("reindexed {} of {} repos", outcome.reindexed, outcome.repos);
//! ```

pub mod cache;
pub mod gitea;
pub mod http;
pub mod sync;

pub use cache::{CacheBackend, CacheDocument, CacheStore, RedisBackend, RepoRecord, StoreError};
pub use gitea::{DEFAULT_PAGE_SIZE, DEFAULT_REQUEST_LIMIT, GiteaClient, GiteaError, RepoIndex};
pub use sync::{
    CorruptSnapshotPolicy, DEFAULT_INDEX_CONCURRENCY, SyncEngine, SyncError, SyncOptions,
    SyncOutcome,
};
