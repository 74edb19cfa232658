//! The persisted cache document and its key-value store.
//!
//! The entire cache is one serialized JSON document held under a single key
//! in a key-value backend (Redis in production). The document maps each
//! repository's full name to the metadata snapshot taken for it; it is the
//! only state that survives across sync passes.

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Cached metadata for a single repository.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepoRecord {
    /// Short repository name.
    pub name: String,
    /// Full name including owner; identical to the document key.
    pub full_name: String,
    /// Opaque last-modification token from the remote. Compared for
    /// equality only.
    pub updated_at: String,
    /// HTTP clone URL.
    pub clone_url: String,
    /// Tag names in remote order. Only refreshed when `updated_at` changes.
    #[serde(default)]
    pub tags: Vec<String>,
    /// Branch names in remote order. Only refreshed when `updated_at`
    /// changes.
    #[serde(default)]
    pub branches: Vec<String>,
}

/// The whole persisted cache: full name -> record.
///
/// A BTreeMap keeps serialization deterministic, so two passes over an
/// unchanged remote persist byte-identical documents.
pub type CacheDocument = BTreeMap<String, RepoRecord>;

/// Errors from loading or saving the cache document.
///
/// A missing document is not an error; [`CacheStore::load`] returns an empty
/// document for it. A document that exists but cannot be decoded is
/// reported as [`StoreError::Serialization`] and never silently replaced.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The backing store failed to read or write.
    #[error("persistence error: {0}")]
    Persistence(String),

    /// The stored document is not valid JSON for [`CacheDocument`].
    #[error("malformed cache document: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Key-value backend holding the serialized document.
#[async_trait]
pub trait CacheBackend: Send + Sync {
    /// Read the raw bytes under `key`. Absence is `Ok(None)`.
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError>;

    /// Overwrite the bytes under `key`.
    async fn set(&self, key: &str, value: Vec<u8>) -> Result<(), StoreError>;
}

/// Redis-backed implementation of [`CacheBackend`].
#[derive(Clone)]
pub struct RedisBackend {
    connection: redis::aio::ConnectionManager,
}

impl RedisBackend {
    /// Connect to Redis at `url` (e.g., "redis://redis:6379").
    ///
    /// The connection manager reconnects automatically, so one backend can
    /// serve the daemon for its whole lifetime.
    pub async fn connect(url: &str) -> Result<Self, StoreError> {
        let client =
            redis::Client::open(url).map_err(|e| StoreError::Persistence(e.to_string()))?;
        let connection = client
            .get_connection_manager()
            .await
            .map_err(|e| StoreError::Persistence(e.to_string()))?;
        Ok(Self { connection })
    }
}

#[async_trait]
impl CacheBackend for RedisBackend {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        let mut conn = self.connection.clone();
        redis::cmd("GET")
            .arg(key)
            .query_async(&mut conn)
            .await
            .map_err(|e| StoreError::Persistence(e.to_string()))
    }

    async fn set(&self, key: &str, value: Vec<u8>) -> Result<(), StoreError> {
        let mut conn = self.connection.clone();
        redis::cmd("SET")
            .arg(key)
            .arg(value)
            .query_async::<()>(&mut conn)
            .await
            .map_err(|e| StoreError::Persistence(e.to_string()))
    }
}

/// Loads and saves the cache document under a fixed key.
#[derive(Clone)]
pub struct CacheStore {
    backend: std::sync::Arc<dyn CacheBackend>,
    key: String,
}

impl CacheStore {
    pub fn new(backend: std::sync::Arc<dyn CacheBackend>, key: impl Into<String>) -> Self {
        Self {
            backend,
            key: key.into(),
        }
    }

    /// The logical key the document lives under.
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Load the document, or an empty one if none has been persisted yet.
    pub async fn load(&self) -> Result<CacheDocument, StoreError> {
        match self.backend.get(&self.key).await? {
            Some(bytes) => Ok(serde_json::from_slice(&bytes)?),
            None => Ok(CacheDocument::new()),
        }
    }

    /// Serialize and persist the document, replacing any prior value.
    ///
    /// Not transactional: a crash before this completes leaves the previous
    /// snapshot untouched and authoritative.
    pub async fn save(&self, document: &CacheDocument) -> Result<(), StoreError> {
        let bytes = serde_json::to_vec(document)?;
        self.backend.set(&self.key, bytes).await
    }
}

// ---------- Test-only in-memory backend ----------

#[cfg(test)]
pub(crate) use memory::MemoryBackend;
