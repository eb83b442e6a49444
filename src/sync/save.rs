//! Dedupe save stages
//!
//! `SaveArtifactStage` moves downloaded files into content-addressed
//! storage; `SaveContentStage` creates the canonical row per content
//! identity. Both are idempotent: already persisted artifacts and already
//! canonical descriptors pass through untouched, and a descriptor losing
//! an insert race is rebound to the winner's row instead of erroring.
//!
//! Content that has not been downloaded yet also passes through unsaved;
//! a later pipeline group picks it up once its artifact exists.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::trace;

use crate::error::Result;
use crate::store::{ArtifactStore, ContentRecord, ContentStore, SaveOutcome};
use crate::sync::pipeline::{StageReceiver, StageSender, SyncStage, send_or_abort};
use crate::sync::report::SyncCounters;

pub struct SaveArtifactStage {
    artifacts: Arc<ArtifactStore>,
}

impl SaveArtifactStage {
    pub fn new(artifacts: Arc<ArtifactStore>) -> Self {
        Self { artifacts }
    }
}

#[async_trait]
impl SyncStage for SaveArtifactStage {
    fn name(&self) -> &'static str {
        "save artifact"
    }

    async fn run(self: Box<Self>, mut input: StageReceiver, output: StageSender) -> Result<()> {
        while let Some(mut descriptor) = input.recv().await {
            if let Some(artifact) = descriptor.artifact.as_mut() {
                if !artifact.persisted {
                    artifact.path = self.artifacts.persist(&artifact.path, &artifact.sha256).await?;
                    artifact.persisted = true;
                }
            }
            send_or_abort(&output, descriptor, "save artifact").await?;
        }
        Ok(())
    }
}

pub struct SaveContentStage {
    store: Arc<dyn ContentStore>,
    counters: Arc<SyncCounters>,
}

impl SaveContentStage {
    pub fn new(store: Arc<dyn ContentStore>, counters: Arc<SyncCounters>) -> Self {
        Self { store, counters }
    }
}

#[async_trait]
impl SyncStage for SaveContentStage {
    fn name(&self) -> &'static str {
        "save content"
    }

    async fn run(self: Box<Self>, mut input: StageReceiver, output: StageSender) -> Result<()> {
        while let Some(mut descriptor) = input.recv().await {
            // Already canonical, or not yet materialized: nothing to save
            // here.
            if descriptor.is_canonical() || !descriptor.is_materialized() {
                send_or_abort(&output, descriptor, "save content").await?;
                continue;
            }

            let record = ContentRecord::new(descriptor.content.clone());
            match self.store.insert(record).await? {
                SaveOutcome::Created(id) => {
                    trace!(key = %descriptor.key(), "content saved");
                    self.counters.record_created(descriptor.kind());
                    descriptor.saved = Some(id);
                }
                SaveOutcome::Existing(id) => {
                    // Lost the race or re-syncing known content; adopt the
                    // canonical row.
                    trace!(key = %descriptor.key(), "content already known");
                    self.counters.record_deduplicated();
                    descriptor.saved = Some(id);
                }
            }
            send_or_abort(&output, descriptor, "save content").await?;
        }
        Ok(())
    }
}
