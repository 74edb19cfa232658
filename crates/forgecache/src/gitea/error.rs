//! Error types for Gitea API operations.

use thiserror::Error;

use crate::http::HttpError;

/// Errors that can occur when talking to the Gitea API.
///
/// None of these are retried at this layer; they abort the listing or
/// indexing operation in progress and propagate to the sync pass boundary.
#[derive(Debug, Error)]
pub enum GiteaError {
    /// Transport-level failure (connect, timeout, invalid URL).
    #[error("HTTP transport error: {0}")]
    Transport(String),

    /// API returned a non-success status.
    #[error("API error ({status}) for {url}")]
    Api { status: u16, url: String },

    /// Response body was not the expected JSON.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl From<HttpError> for GiteaError {
    fn from(err: HttpError) -> Self {
        GiteaError::Transport(err.to_string())
    }
}
