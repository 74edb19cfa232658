//! Gitea API client with a global in-flight request cap.

use std::sync::Arc;

use tokio::sync::Semaphore;

use super::error::GiteaError;
use super::types::{GiteaBranch, GiteaRepo, GiteaTag, RepoIndex};
use crate::http::{HttpRequest, HttpResponse, HttpTransport, ReqwestTransport};

/// Default maximum number of in-flight HTTP requests.
pub const DEFAULT_REQUEST_LIMIT: usize = 5;

/// Default page size for list endpoints. This is the Gitea maximum; the
/// default is 30.
pub const DEFAULT_PAGE_SIZE: usize = 50;

/// Gitea API client.
///
/// All requests from all clones of one client share a single semaphore, so
/// at most `request_limit` HTTP requests are outstanding at any instant,
/// regardless of how many listing or indexing operations are in flight. The
/// permit is held around each individual request, never across a whole
/// pagination loop.
#[derive(Clone)]
pub struct GiteaClient {
    transport: Arc<dyn HttpTransport>,
    host: String,
    requests: Arc<Semaphore>,
    page_size: usize,
}

impl GiteaClient {
    /// Create a client for `host` (e.g., "https://git.almalinux.org").
    pub fn new(host: &str, request_limit: usize, page_size: usize) -> Result<Self, GiteaError> {
        let transport = ReqwestTransport::with_timeout(ReqwestTransport::DEFAULT_TIMEOUT)
            .map_err(|e| GiteaError::Transport(e.to_string()))?;
        Ok(Self::new_with_transport(
            host,
            request_limit,
            page_size,
            Arc::new(transport),
        ))
    }

    pub fn new_with_transport(
        host: &str,
        request_limit: usize,
        page_size: usize,
        transport: Arc<dyn HttpTransport>,
    ) -> Self {
        Self {
            transport,
            host: host.trim_end_matches('/').to_string(),
            requests: Arc::new(Semaphore::new(request_limit.max(1))),
            page_size: page_size.max(1),
        }
    }

    /// Get the host URL.
    pub fn host(&self) -> &str {
        &self.host
    }

    /// Make a GET request against the API, holding one concurrency permit
    /// for the duration of the call.
    async fn get<T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        query: Vec<(String, String)>,
    ) -> Result<T, GiteaError> {
        let url = format!("{}/api/v1{}", self.host, path);
        let request = HttpRequest {
            url,
            query,
            headers: vec![
                ("Accept".to_string(), "application/json".to_string()),
                ("User-Agent".to_string(), "forgecache".to_string()),
            ],
        };
        let full_url = request.full_url();
        tracing::debug!(url = %full_url, "making API request");

        let response: HttpResponse = {
            let _permit = self
                .requests
                .acquire()
                .await
                .expect("request semaphore is never closed");
            self.transport.send(request).await?
        };

        if !(200..300).contains(&response.status) {
            return Err(GiteaError::Api {
                status: response.status,
                url: full_url,
            });
        }

        serde_json::from_slice(&response.body).map_err(GiteaError::Json)
    }

    /// Fetch every page of a list endpoint.
    ///
    /// Pages are requested strictly in order, each after the previous
    /// completes. A page shorter than the page size is the only termination
    /// signal the API offers, so a listing whose length is an exact multiple
    /// of the page size costs one extra empty request.
    async fn list_all_pages<T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
    ) -> Result<Vec<T>, GiteaError> {
        let mut items = Vec::new();
        let mut page = 1usize;

        loop {
            let batch: Vec<T> = self
                .get(
                    path,
                    vec![
                        ("limit".to_string(), self.page_size.to_string()),
                        ("page".to_string(), page.to_string()),
                    ],
                )
                .await?;

            let count = batch.len();
            items.extend(batch);

            if count < self.page_size {
                break;
            }
            page += 1;
        }

        Ok(items)
    }

    /// List all repositories of an organization.
    pub async fn list_repos(&self, organization: &str) -> Result<Vec<GiteaRepo>, GiteaError> {
        self.list_all_pages(&format!("/orgs/{organization}/repos"))
            .await
    }

    /// List all tags of a repository (by full name, e.g., "rpms/bash").
    pub async fn list_tags(&self, full_name: &str) -> Result<Vec<GiteaTag>, GiteaError> {
        self.list_all_pages(&format!("/repos/{full_name}/tags")).await
    }

    /// List all branches of a repository.
    pub async fn list_branches(&self, full_name: &str) -> Result<Vec<GiteaBranch>, GiteaError> {
        self.list_all_pages(&format!("/repos/{full_name}/branches"))
            .await
    }

    /// Fetch tag and branch names for one repository.
    ///
    /// Tags and branches are listed sequentially for the same repository;
    /// concurrency happens across repositories, not within one.
    pub async fn index_repo(&self, full_name: &str) -> Result<RepoIndex, GiteaError> {
        let tags = self.list_tags(full_name).await?;
        let branches = self.list_branches(full_name).await?;
        Ok(RepoIndex {
            full_name: full_name.to_string(),
            tags: tags.into_iter().map(|t| t.name).collect(),
            branches: branches.into_iter().map(|b| b.name).collect(),
        })
    }
}
