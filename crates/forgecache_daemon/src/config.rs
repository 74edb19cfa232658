//! Configuration for the daemon.
//!
//! Settings are loaded with the following precedence (highest to lowest):
//! 1. CLI flags
//! 2. Environment variables prefixed with `FORGECACHE_`
//!    (e.g., `FORGECACHE_REDIS_URL`, `FORGECACHE_ORGANIZATION`)
//! 3. Config file (`~/.config/forgecache/forgecache.toml` or
//!    `./forgecache.toml`)
//! 4. Built-in defaults
//!
//! Example config file:
//! ```toml
//! redis_url = "redis://redis:6379"
//! gitea_host = "https://git.almalinux.org"
//! cache_key = "gitea_cache"
//! organization = "rpms"
//! interval_secs = 600
//! concurrency = 5
//! page_size = 50
//! start_empty_on_corrupt = false
//! ```

use std::path::Path;

use config::{Config as ConfigBuilder, Environment, File};
use directories::ProjectDirs;
use serde::Deserialize;

/// Daemon settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Redis connection URL holding the cache document.
    pub redis_url: String,
    /// Base URL of the Gitea instance.
    pub gitea_host: String,
    /// Key the serialized cache document lives under.
    pub cache_key: String,
    /// Organization whose repositories are tracked.
    pub organization: String,
    /// Seconds between sync passes.
    pub interval_secs: u64,
    /// Concurrency limit, applied both to in-flight HTTP requests and to
    /// repository index tasks.
    pub concurrency: usize,
    /// Page size for list endpoints (the Gitea maximum is 50).
    pub page_size: usize,
    /// Start from an empty document instead of failing the pass when the
    /// persisted snapshot is malformed.
    pub start_empty_on_corrupt: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            redis_url: "redis://redis:6379".to_string(),
            gitea_host: "https://git.almalinux.org".to_string(),
            cache_key: "gitea_cache".to_string(),
            organization: "rpms".to_string(),
            interval_secs: 600,
            concurrency: forgecache::DEFAULT_REQUEST_LIMIT,
            page_size: forgecache::DEFAULT_PAGE_SIZE,
            start_empty_on_corrupt: false,
        }
    }
}

impl Settings {
    /// Load settings, optionally forcing a specific config file.
    ///
    /// An explicitly passed file must exist; the well-known locations are
    /// optional.
    pub fn load(explicit_file: Option<&Path>) -> Result<Self, config::ConfigError> {
        let mut builder = ConfigBuilder::builder();

        if let Some(dirs) = ProjectDirs::from("", "", "forgecache") {
            let path = dirs.config_dir().join("forgecache.toml");
            builder = builder.add_source(File::from(path).required(false));
        }
        builder = builder.add_source(File::with_name("forgecache").required(false));

        if let Some(path) = explicit_file {
            builder = builder.add_source(File::from(path.to_path_buf()).required(true));
        }

        builder = builder.add_source(Environment::with_prefix("FORGECACHE"));

        builder.build()?.try_deserialize()
    }
}
