//! Forgecache daemon - keeps the Gitea metadata cache in sync.

mod config;
mod scheduler;
mod shutdown;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use forgecache::{
    CacheStore, CorruptSnapshotPolicy, GiteaClient, RedisBackend, SyncEngine, SyncOptions,
};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "forgecache")]
#[command(version)]
#[command(about = "Incremental Gitea metadata cache synchronizer")]
#[command(
    long_about = "Forgecache keeps a Redis-held cache of an organization's Gitea repositories \
up to date. Each pass lists the organization's repositories, re-indexes tags and \
branches for repositories that are new or changed, prunes removed ones, and \
replaces the persisted snapshot."
)]
struct Cli {
    /// Path to a TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Organization to track, overriding configuration
    #[arg(long)]
    organization: Option<String>,

    /// Run a single sync pass and exit
    #[arg(long)]
    once: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("forgecache=info,forgecache_daemon=info"));
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .init();

    let cli = Cli::parse();
    let settings = config::Settings::load(cli.config.as_deref())?;
    let organization = cli
        .organization
        .unwrap_or_else(|| settings.organization.clone());

    let client = GiteaClient::new(
        &settings.gitea_host,
        settings.concurrency,
        settings.page_size,
    )?;
    let backend = RedisBackend::connect(&settings.redis_url).await?;
    let store = CacheStore::new(Arc::new(backend), settings.cache_key.as_str());

    let options = SyncOptions {
        concurrency: settings.concurrency,
        corrupt_snapshot: if settings.start_empty_on_corrupt {
            CorruptSnapshotPolicy::StartEmpty
        } else {
            CorruptSnapshotPolicy::Fail
        },
    };
    let engine = SyncEngine::new(client, store, options);

    if cli.once {
        let outcome = engine.run(&organization).await?;
        tracing::info!(
            repos = outcome.repos,
            reindexed = outcome.reindexed,
            unchanged = outcome.unchanged,
            pruned = outcome.pruned,
            "sync pass complete"
        );
        return Ok(());
    }

    let shutdown = shutdown::listen();
    scheduler::run_loop(
        &engine,
        &organization,
        Duration::from_secs(settings.interval_secs),
        shutdown,
    )
    .await;

    Ok(())
}
