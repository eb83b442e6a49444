//! Download stage
//!
//! Fetches the representation of every pending descriptor. Transfers run
//! concurrently under a permit pool shared by all three download passes,
//! so the configured cap is global. Completed descriptors are emitted as
//! they finish; order across concurrent transfers is not preserved, which
//! downstream stages tolerate by design.

use std::sync::Arc;

use async_trait::async_trait;
use futures::stream::FuturesUnordered;
use futures_util::StreamExt;
use tokio::sync::Semaphore;
use tracing::debug;

use crate::error::{MirrorError, Result};
use crate::model::digest;
use crate::registry::{Artifact, Downloader};
use crate::store::ArtifactStore;
use crate::sync::descriptor::ContentDescriptor;
use crate::sync::pipeline::{StageReceiver, StageSender, SyncStage, send_or_abort};

pub struct DownloadStage {
    downloader: Arc<dyn Downloader>,
    artifacts: Arc<ArtifactStore>,
    permits: Arc<Semaphore>,
    /// Local bound on buffered transfers, so one pass cannot queue
    /// unbounded work while waiting for permits.
    window: usize,
}

impl DownloadStage {
    pub fn new(
        downloader: Arc<dyn Downloader>,
        artifacts: Arc<ArtifactStore>,
        permits: Arc<Semaphore>,
        window: usize,
    ) -> Self {
        Self {
            downloader,
            artifacts,
            permits,
            window: window.max(1),
        }
    }

    async fn fetch_one(
        downloader: Arc<dyn Downloader>,
        artifacts: Arc<ArtifactStore>,
        permits: Arc<Semaphore>,
        mut descriptor: ContentDescriptor,
    ) -> Result<ContentDescriptor> {
        // Permit errors cannot happen; the semaphore is never closed.
        let _permit = permits
            .acquire()
            .await
            .map_err(|_| MirrorError::Pipeline("download permit pool closed".to_string()))?;

        // A digest-addressed artifact that is already stored needs no
        // transfer.
        if let Some(expected) = &descriptor.download.expected_digest {
            let hex = digest::hex_part(expected)?.to_string();
            if artifacts.contains(&hex).await {
                let path = artifacts.path_for(&hex);
                let size = tokio::fs::metadata(&path).await?.len();
                debug!(digest = %expected, "artifact already stored, skipping transfer");
                descriptor.artifact = Some(Artifact {
                    path,
                    sha256: hex,
                    size,
                    persisted: true,
                });
                return Ok(descriptor);
            }
        }

        let artifact = downloader.fetch(&descriptor.download).await?;
        if let Some(expected) = &descriptor.download.expected_digest {
            let computed = digest::prefixed(&artifact.sha256);
            if &computed != expected {
                return Err(MirrorError::DigestMismatch {
                    url: descriptor.download.url.clone(),
                    expected: expected.clone(),
                    computed,
                });
            }
        }
        descriptor.artifact = Some(artifact);
        Ok(descriptor)
    }
}

#[async_trait]
impl SyncStage for DownloadStage {
    fn name(&self) -> &'static str {
        "download"
    }

    async fn run(self: Box<Self>, mut input: StageReceiver, output: StageSender) -> Result<()> {
        let mut in_flight = FuturesUnordered::new();

        loop {
            tokio::select! {
                received = input.recv(), if in_flight.len() < self.window => {
                    match received {
                        Some(descriptor) => {
                            // Materialized or canonical content passes
                            // straight through.
                            if descriptor.is_materialized() || descriptor.is_canonical() {
                                send_or_abort(&output, descriptor, "download").await?;
                            } else {
                                in_flight.push(Self::fetch_one(
                                    self.downloader.clone(),
                                    self.artifacts.clone(),
                                    self.permits.clone(),
                                    descriptor,
                                ));
                            }
                        }
                        None => break,
                    }
                }
                Some(finished) = in_flight.next() => {
                    send_or_abort(&output, finished?, "download").await?;
                }
            }
        }

        while let Some(finished) = in_flight.next().await {
            send_or_abort(&output, finished?, "download").await?;
        }
        Ok(())
    }
}
