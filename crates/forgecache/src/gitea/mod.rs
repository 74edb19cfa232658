//! Gitea API client: rate-limited requests, pagination, repository indexing.

mod client;
mod error;
mod types;

pub use client::{DEFAULT_PAGE_SIZE, DEFAULT_REQUEST_LIMIT, GiteaClient};
pub use error::GiteaError;
pub use types::{GiteaBranch, GiteaRepo, GiteaTag, RepoIndex};
