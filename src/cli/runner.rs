//! Main workflow runner
//!
//! Builds the stores and registry client from parsed arguments and runs
//! one sync to completion.

use std::sync::Arc;

use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::cli::args::Args;
use crate::config::{AuthConfig, RegistryConfig, SyncConfig};
use crate::error::Result;
use crate::registry::RegistryClient;
use crate::store::{ArtifactStore, MemoryStore};
use crate::sync;

pub struct Runner;

impl Runner {
    pub async fn run(args: Args) -> Result<()> {
        init_tracing(args.verbose);

        let registry = RegistryConfig::parse(&args.url, &args.repository)?;
        let auth = AuthConfig {
            username: args.username,
            password: args.password,
        };
        let config = SyncConfig {
            max_concurrent_downloads: args.concurrency,
            queue_capacity: args.queue_capacity,
        };

        let artifacts = Arc::new(ArtifactStore::open(&args.storage).await?);
        let client = Arc::new(
            RegistryClient::builder(registry.clone())
                .with_auth(auth)
                .with_artifact_store(artifacts.clone())
                .build()?,
        );
        let store = Arc::new(MemoryStore::new());

        info!(
            url = %registry.url,
            repository = %registry.repository,
            "starting sync"
        );
        let urls = client.urls().clone();
        let summary = sync::synchronize(client, urls, store, artifacts, config).await?;

        let report = summary.report;
        info!(
            version = %summary.version.id,
            content = summary.version.len(),
            tags = report.tags,
            manifest_lists = report.manifest_lists,
            manifests = report.manifests,
            blobs = report.blobs,
            deduplicated = report.deduplicated,
            legacy_skipped = report.legacy_skipped,
            "sync finished"
        );
        Ok(())
    }
}

fn init_tracing(verbose: bool) {
    let default_filter = if verbose {
        "docker_registry_mirror=debug"
    } else {
        "docker_registry_mirror=info"
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}
