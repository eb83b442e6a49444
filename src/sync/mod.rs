//! Staged sync pipeline
//!
//! Mirroring runs as a fixed pipeline of stages joined by bounded queues:
//!
//! tag list -> [download -> save artifact -> process -> save content] x 3
//!          -> interrelate
//!
//! Three download groups cover the four-level hierarchy (tag, manifest
//! list, manifest, blob); each discovery pass reveals content one level
//! deeper. Relations are committed in a final pass once every object is
//! canonical.

pub mod descriptor;
pub mod download;
pub mod list;
pub mod pipeline;
pub mod process;
pub mod relate;
pub mod report;
pub mod save;

use std::sync::Arc;

use tokio::sync::Semaphore;

use crate::config::SyncConfig;
use crate::error::Result;
use crate::registry::{Downloader, RepositoryUrls};
use crate::store::{ArtifactStore, ContentStore, RepositoryVersion, VersionBuilder};

pub use descriptor::{BlobRole, ContentDescriptor, ParentLink};
pub use pipeline::{ReplayStage, SyncPipeline, SyncStage};
pub use report::{SyncCounters, SyncReport};

/// Download groups in the pipeline. The hierarchy is four levels deep and
/// each group's discovery step reaches one level further, so three groups
/// leave every object downloaded and saved.
const GROUP_PASSES: usize = 3;

/// Outcome of a completed sync.
#[derive(Debug)]
pub struct SyncSummary {
    pub version: RepositoryVersion,
    pub report: SyncReport,
}

/// Mirror one remote repository into the given stores and produce a new
/// repository version.
///
/// Any fatal stage error tears the whole pipeline down and is returned
/// here; in that case no relations are committed and no version is built.
pub async fn synchronize(
    downloader: Arc<dyn Downloader>,
    urls: RepositoryUrls,
    store: Arc<dyn ContentStore>,
    artifacts: Arc<ArtifactStore>,
    config: SyncConfig,
) -> Result<SyncSummary> {
    let counters = Arc::new(SyncCounters::default());
    // One permit pool across all three download passes keeps the transfer
    // cap global instead of per group.
    let permits = Arc::new(Semaphore::new(config.max_concurrent_downloads.max(1)));

    let mut stages = SyncPipeline::new(config.queue_capacity);
    stages.push(list::TagListStage::new(
        downloader.clone(),
        urls.clone(),
        counters.clone(),
    ));
    for _ in 0..GROUP_PASSES {
        stages.push(download::DownloadStage::new(
            downloader.clone(),
            artifacts.clone(),
            permits.clone(),
            config.max_concurrent_downloads.max(1),
        ));
        stages.push(save::SaveArtifactStage::new(artifacts.clone()));
        stages.push(process::ProcessContentStage::new(
            urls.clone(),
            counters.clone(),
        ));
        stages.push(save::SaveContentStage::new(store.clone(), counters.clone()));
    }
    let descriptors = stages.run().await?;

    // Linking runs only against a fully drained, fully saved stream; a
    // failure above never reaches this point.
    let mut linking = SyncPipeline::new(config.queue_capacity);
    linking.push(ReplayStage::new(descriptors));
    linking.push(relate::InterrelateStage::new(store.clone()));
    let descriptors = linking.run().await?;

    let mut version = VersionBuilder::new(urls.repository());
    for descriptor in &descriptors {
        if let Some(id) = descriptor.saved {
            version.add(id);
        }
    }

    Ok(SyncSummary {
        version: version.build(),
        report: counters.snapshot(),
    })
}
