//! One-shot synchronization of the cache document against the remote.
//!
//! A pass is load -> diff -> concurrent re-index -> prune -> save. The
//! engine holds no state between passes; the persisted document is the only
//! thing that survives, and it is only replaced after every step of a pass
//! has succeeded.

use std::collections::BTreeSet;
use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use super::types::{CorruptSnapshotPolicy, SyncError, SyncOptions, SyncOutcome};
use crate::cache::{CacheDocument, CacheStore, RepoRecord, StoreError};
use crate::gitea::{GiteaClient, GiteaError, RepoIndex};

/// Runs synchronization passes. Stateless across invocations; callers must
/// not run two passes concurrently against the same cache key.
pub struct SyncEngine {
    client: GiteaClient,
    store: CacheStore,
    options: SyncOptions,
}

impl SyncEngine {
    pub fn new(client: GiteaClient, store: CacheStore, options: SyncOptions) -> Self {
        Self {
            client,
            store,
            options,
        }
    }

    /// Run one complete pass for `organization`.
    ///
    /// On any failure the pass aborts before saving, so the previously
    /// persisted snapshot stays authoritative; the caller's next scheduled
    /// invocation retries from it.
    pub async fn run(&self, organization: &str) -> Result<SyncOutcome, SyncError> {
        let mut document = self.load_document().await?;
        let known: BTreeSet<String> = document.keys().cloned().collect();

        let live = self.client.list_repos(organization).await?;
        tracing::debug!(
            organization,
            live = live.len(),
            cached = known.len(),
            "diffing live listing against cache"
        );

        let mut seen = BTreeSet::new();
        let mut pending = Vec::new();
        for repo in live {
            seen.insert(repo.full_name.clone());

            let changed = match document.get(&repo.full_name) {
                None => true,
                Some(record) => record.updated_at != repo.updated_at,
            };
            if !changed {
                continue;
            }

            // Tags and branches stay empty until the index result lands;
            // the pass never persists without it.
            pending.push(repo.full_name.clone());
            document.insert(
                repo.full_name.clone(),
                RepoRecord {
                    name: repo.name,
                    full_name: repo.full_name,
                    updated_at: repo.updated_at,
                    clone_url: repo.clone_url,
                    tags: Vec::new(),
                    branches: Vec::new(),
                },
            );
        }

        for index in self.index_pending(&pending).await? {
            if let Some(record) = document.get_mut(&index.full_name) {
                record.tags = index.tags;
                record.branches = index.branches;
            }
        }

        let stale: Vec<String> = known.difference(&seen).cloned().collect();
        for full_name in &stale {
            document.remove(full_name);
        }

        self.store.save(&document).await?;

        Ok(SyncOutcome {
            repos: seen.len(),
            reindexed: pending.len(),
            unchanged: seen.len().saturating_sub(pending.len()),
            pruned: stale.len(),
        })
    }

    /// Load the persisted document, applying the corrupt-snapshot policy.
    async fn load_document(&self) -> Result<CacheDocument, SyncError> {
        match self.store.load().await {
            Ok(document) => Ok(document),
            Err(StoreError::Serialization(err))
                if self.options.corrupt_snapshot == CorruptSnapshotPolicy::StartEmpty =>
            {
                tracing::warn!(
                    key = self.store.key(),
                    error = %err,
                    "persisted cache document is malformed; starting empty and re-indexing everything"
                );
                Ok(CacheDocument::new())
            }
            Err(err) => Err(err.into()),
        }
    }

    /// Index every pending repository, at most `options.concurrency` at a
    /// time.
    ///
    /// The semaphore bounds logical indexing tasks, so a very large pending
    /// set cannot pile up spawned tasks; the client's own request limit
    /// additionally caps raw HTTP concurrency. The first failure aborts the
    /// whole batch and discards sibling results.
    async fn index_pending(&self, pending: &[String]) -> Result<Vec<RepoIndex>, SyncError> {
        if pending.is_empty() {
            return Ok(Vec::new());
        }

        let concurrency = self.options.concurrency.clamp(1, pending.len());
        let semaphore = Arc::new(Semaphore::new(concurrency));
        let mut tasks = JoinSet::new();

        for full_name in pending {
            let client = self.client.clone();
            let semaphore = Arc::clone(&semaphore);
            let full_name = full_name.clone();
            tasks.spawn(async move {
                let _permit = semaphore
                    .acquire_owned()
                    .await
                    .expect("index semaphore is never closed");
                client.index_repo(&full_name).await
            });
        }

        let mut results = Vec::with_capacity(pending.len());
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(Ok(index)) => results.push(index),
                Ok(Err(err)) => {
                    tasks.shutdown().await;
                    return Err(err.into());
                }
                Err(join_err) if join_err.is_panic() => {
                    std::panic::resume_unwind(join_err.into_panic())
                }
                Err(join_err) => {
                    tasks.shutdown().await;
                    return Err(GiteaError::Transport(format!(
                        "index task aborted: {join_err}"
                    ))
                    .into());
                }
            }
        }

        Ok(results)
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::cache::MemoryBackend;
    use crate::http::{HttpResponse, MockTransport};

    const HOST: &str = "https://git.example.org";
    const KEY: &str = "gitea_cache";

    struct Harness {
        transport: MockTransport,
        backend: MemoryBackend,
    }

    impl Harness {
        fn new() -> Self {
            Self {
                transport: MockTransport::new(),
                backend: MemoryBackend::new(),
            }
        }

        fn with_latency(latency: Duration) -> Self {
            Self {
                transport: MockTransport::with_latency(latency),
                backend: MemoryBackend::new(),
            }
        }

        fn engine(&self, options: SyncOptions) -> SyncEngine {
            self.engine_with_request_limit(options, 5)
        }

        fn engine_with_request_limit(&self, options: SyncOptions, limit: usize) -> SyncEngine {
            let client = GiteaClient::new_with_transport(
                HOST,
                limit,
                50,
                Arc::new(self.transport.clone()),
            );
            let store = CacheStore::new(Arc::new(self.backend.clone()), KEY);
            SyncEngine::new(client, store, options)
        }

        fn push_repo_listing(&self, org: &str, repos: &[(&str, &str)]) {
            let entries: Vec<String> = repos
                .iter()
                .map(|(full_name, updated_at)| {
                    let name = full_name.rsplit('/').next().unwrap();
                    format!(
                        r#"{{"name":"{name}","full_name":"{full_name}","updated_at":"{updated_at}","clone_url":"https://git.example.org/{full_name}.git"}}"#
                    )
                })
                .collect();
            self.transport.push_json(
                format!("{HOST}/api/v1/orgs/{org}/repos?limit=50&page=1"),
                &format!("[{}]", entries.join(",")),
            );
        }

        fn push_index(&self, full_name: &str, tags: &[&str], branches: &[&str]) {
            let tag_entries: Vec<String> =
                tags.iter().map(|n| format!(r#"{{"name":"{n}"}}"#)).collect();
            let branch_entries: Vec<String> = branches
                .iter()
                .map(|n| format!(r#"{{"name":"{n}"}}"#))
                .collect();
            self.transport.push_json(
                format!("{HOST}/api/v1/repos/{full_name}/tags?limit=50&page=1"),
                &format!("[{}]", tag_entries.join(",")),
            );
            self.transport.push_json(
                format!("{HOST}/api/v1/repos/{full_name}/branches?limit=50&page=1"),
                &format!("[{}]", branch_entries.join(",")),
            );
        }

        async fn saved_document(&self) -> CacheDocument {
            let store = CacheStore::new(Arc::new(self.backend.clone()), KEY);
            store.load().await.expect("load saved document")
        }
    }

    #[tokio::test]
    async fn initial_pass_indexes_every_repo() {
        let harness = Harness::new();
        harness.push_repo_listing("rpms", &[("rpms/a", "t1"), ("rpms/b", "t1")]);
        harness.push_index("rpms/a", &["v1"], &["main"]);
        harness.push_index("rpms/b", &[], &["main"]);

        let outcome = harness
            .engine(SyncOptions::default())
            .run("rpms")
            .await
            .expect("pass succeeds");

        assert_eq!(outcome.repos, 2);
        assert_eq!(outcome.reindexed, 2);
        assert_eq!(outcome.unchanged, 0);
        assert_eq!(outcome.pruned, 0);

        let doc = harness.saved_document().await;
        assert_eq!(doc.keys().collect::<Vec<_>>(), vec!["rpms/a", "rpms/b"]);
        assert_eq!(doc["rpms/a"].tags, vec!["v1".to_string()]);
        assert_eq!(doc["rpms/a"].branches, vec!["main".to_string()]);
        assert!(doc["rpms/b"].tags.is_empty());
        assert_eq!(doc["rpms/b"].branches, vec!["main".to_string()]);
        assert_eq!(doc["rpms/a"].full_name, "rpms/a");
        assert_eq!(doc["rpms/a"].name, "a");
    }

    #[tokio::test]
    async fn unchanged_remote_triggers_no_reindex_and_persists_identical_bytes() {
        let harness = Harness::new();
        harness.push_repo_listing("rpms", &[("rpms/a", "t1")]);
        harness.push_index("rpms/a", &["v1"], &["main"]);

        let engine = harness.engine(SyncOptions::default());
        engine.run("rpms").await.expect("first pass");
        let first_bytes = harness.backend.raw(KEY).expect("saved bytes");

        // Second pass: same listing, no tag/branch responses registered.
        // Any reindex attempt would hit the mock's missing-route error.
        harness.push_repo_listing("rpms", &[("rpms/a", "t1")]);
        let outcome = engine.run("rpms").await.expect("second pass");

        assert_eq!(outcome.reindexed, 0);
        assert_eq!(outcome.unchanged, 1);
        assert_eq!(harness.transport.request_count_matching("/tags"), 1);
        assert_eq!(harness.transport.request_count_matching("/branches"), 1);
        assert_eq!(harness.backend.raw(KEY).expect("saved bytes"), first_bytes);
    }

    #[tokio::test]
    async fn changed_updated_at_reindexes_only_that_repo() {
        let harness = Harness::new();
        harness.push_repo_listing("rpms", &[("rpms/a", "t1"), ("rpms/b", "t1")]);
        harness.push_index("rpms/a", &["v1"], &["main"]);
        harness.push_index("rpms/b", &["v1"], &["main"]);

        let engine = harness.engine(SyncOptions::default());
        engine.run("rpms").await.expect("first pass");

        harness.push_repo_listing("rpms", &[("rpms/a", "t2"), ("rpms/b", "t1")]);
        harness.push_index("rpms/a", &["v1", "v2"], &["main", "next"]);
        let outcome = engine.run("rpms").await.expect("second pass");

        assert_eq!(outcome.reindexed, 1);
        assert_eq!(outcome.unchanged, 1);

        let doc = harness.saved_document().await;
        assert_eq!(doc["rpms/a"].updated_at, "t2");
        assert_eq!(doc["rpms/a"].tags, vec!["v1".to_string(), "v2".to_string()]);
        // Untouched repo keeps its prior tag/branch data.
        assert_eq!(doc["rpms/b"].tags, vec!["v1".to_string()]);
        assert_eq!(harness.transport.request_count_matching("rpms/b/tags"), 1);
    }

    #[tokio::test]
    async fn repos_missing_from_the_listing_are_pruned() {
        let harness = Harness::new();
        harness.push_repo_listing("rpms", &[("rpms/a", "t1"), ("rpms/b", "t1")]);
        harness.push_index("rpms/a", &["v1"], &["main"]);
        harness.push_index("rpms/b", &[], &["main"]);

        let engine = harness.engine(SyncOptions::default());
        engine.run("rpms").await.expect("first pass");

        harness.push_repo_listing("rpms", &[("rpms/a", "t1")]);
        let outcome = engine.run("rpms").await.expect("second pass");

        assert_eq!(outcome.pruned, 1);
        let doc = harness.saved_document().await;
        assert_eq!(doc.keys().collect::<Vec<_>>(), vec!["rpms/a"]);
    }

    #[tokio::test]
    async fn document_keys_match_the_live_listing_exactly() {
        let harness = Harness::new();
        harness.push_repo_listing("rpms", &[("rpms/b", "t1"), ("rpms/c", "t1"), ("rpms/a", "t1")]);
        for repo in ["rpms/a", "rpms/b", "rpms/c"] {
            harness.push_index(repo, &[], &["main"]);
        }

        harness
            .engine(SyncOptions::default())
            .run("rpms")
            .await
            .expect("pass");

        let doc = harness.saved_document().await;
        assert_eq!(doc.keys().collect::<Vec<_>>(), vec!["rpms/a", "rpms/b", "rpms/c"]);
        for (key, record) in &doc {
            assert_eq!(key, &record.full_name);
        }
    }

    #[tokio::test]
    async fn any_index_failure_aborts_the_pass_before_saving() {
        let harness = Harness::new();
        harness.push_repo_listing("rpms", &[("rpms/a", "t1"), ("rpms/b", "t1")]);
        harness.push_index("rpms/a", &["v1"], &["main"]);
        // rpms/b tags request fails with a server error.
        harness.transport.push_response(
            format!("{HOST}/api/v1/repos/rpms/b/tags?limit=50&page=1"),
            HttpResponse {
                status: 502,
                body: Vec::new(),
            },
        );

        let err = harness
            .engine(SyncOptions::default())
            .run("rpms")
            .await
            .expect_err("pass must fail");

        assert!(matches!(
            err,
            SyncError::Remote(GiteaError::Api { status: 502, .. })
        ));
        assert!(harness.backend.raw(KEY).is_none(), "nothing may be saved");
    }

    #[tokio::test]
    async fn listing_failure_aborts_before_any_indexing() {
        let harness = Harness::new();
        harness.transport.push_response(
            format!("{HOST}/api/v1/orgs/rpms/repos?limit=50&page=1"),
            HttpResponse {
                status: 503,
                body: Vec::new(),
            },
        );

        let err = harness
            .engine(SyncOptions::default())
            .run("rpms")
            .await
            .expect_err("pass must fail");

        assert!(matches!(err, SyncError::Remote(GiteaError::Api { .. })));
        assert_eq!(harness.transport.requests().len(), 1);
    }

    #[tokio::test]
    async fn save_failure_surfaces_as_store_error() {
        let harness = Harness::new();
        harness.push_repo_listing("rpms", &[("rpms/a", "t1")]);
        harness.push_index("rpms/a", &["v1"], &["main"]);
        harness.backend.fail_writes();

        let err = harness
            .engine(SyncOptions::default())
            .run("rpms")
            .await
            .expect_err("write failure must fail the pass");

        assert!(matches!(err, SyncError::Store(StoreError::Persistence(_))));
    }

    #[tokio::test]
    async fn corrupt_snapshot_fails_the_pass_by_default() {
        let harness = Harness::new();
        harness.backend.insert_raw(KEY, &b"{corrupt"[..]);

        let err = harness
            .engine(SyncOptions::default())
            .run("rpms")
            .await
            .expect_err("corrupt snapshot must fail");

        assert!(matches!(err, SyncError::Store(StoreError::Serialization(_))));
        // Nothing was fetched; the document was never replaced.
        assert!(harness.transport.requests().is_empty());
        assert_eq!(harness.backend.raw(KEY), Some(b"{corrupt".to_vec()));
    }

    #[tokio::test]
    async fn corrupt_snapshot_with_start_empty_policy_reindexes_everything() {
        let harness = Harness::new();
        harness.backend.insert_raw(KEY, &b"{corrupt"[..]);
        harness.push_repo_listing("rpms", &[("rpms/a", "t1")]);
        harness.push_index("rpms/a", &["v1"], &["main"]);

        let options = SyncOptions {
            corrupt_snapshot: CorruptSnapshotPolicy::StartEmpty,
            ..SyncOptions::default()
        };
        let outcome = harness
            .engine(options)
            .run("rpms")
            .await
            .expect("pass succeeds from empty");

        assert_eq!(outcome.reindexed, 1);
        let doc = harness.saved_document().await;
        assert_eq!(doc["rpms/a"].tags, vec!["v1".to_string()]);
    }

    #[tokio::test]
    async fn index_fan_out_is_bounded_by_the_configured_concurrency() {
        let harness = Harness::with_latency(Duration::from_millis(15));
        let repos: Vec<(String, String)> = (0..12)
            .map(|i| (format!("rpms/pkg{i}"), "t1".to_string()))
            .collect();
        let listing: Vec<(&str, &str)> = repos
            .iter()
            .map(|(n, t)| (n.as_str(), t.as_str()))
            .collect();
        harness.push_repo_listing("rpms", &listing);
        for (full_name, _) in &repos {
            harness.push_index(full_name, &["v1"], &["main"]);
        }

        let options = SyncOptions {
            concurrency: 3,
            ..SyncOptions::default()
        };
        // Generous HTTP limit so the task bound is what is being measured.
        harness
            .engine_with_request_limit(options, 50)
            .run("rpms")
            .await
            .expect("pass succeeds");

        assert!(
            harness.transport.max_in_flight() <= 3,
            "observed {} in-flight requests",
            harness.transport.max_in_flight()
        );
    }

    #[tokio::test]
    async fn empty_organization_persists_an_empty_document() {
        let harness = Harness::new();
        harness.push_repo_listing("rpms", &[]);

        let outcome = harness
            .engine(SyncOptions::default())
            .run("rpms")
            .await
            .expect("pass succeeds");

        assert_eq!(outcome.repos, 0);
        assert!(harness.saved_document().await.is_empty());
    }
}
