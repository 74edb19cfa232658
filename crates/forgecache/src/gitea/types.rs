//! Gitea API data types.

use serde::Deserialize;

/// Gitea repository - the fields we need from the API response.
///
/// Only the fields this crate consumes are defined, which keeps
/// deserialization resilient to API additions.
#[derive(Debug, Clone, Deserialize)]
pub struct GiteaRepo {
    /// Short repository name.
    pub name: String,
    /// Full name including owner (e.g., "rpms/bash").
    pub full_name: String,
    /// Last-modification timestamp as reported by the API.
    ///
    /// Treated as an opaque token: compared for equality to detect changes,
    /// never parsed.
    pub updated_at: String,
    /// HTTP clone URL.
    pub clone_url: String,
}

/// Gitea tag - name only.
#[derive(Debug, Clone, Deserialize)]
pub struct GiteaTag {
    pub name: String,
}

/// Gitea branch - name only.
#[derive(Debug, Clone, Deserialize)]
pub struct GiteaBranch {
    pub name: String,
}

/// Result of indexing a single repository: its tag and branch names.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepoIndex {
    pub full_name: String,
    pub tags: Vec<String>,
    pub branches: Vec<String>,
}
