//! Interrelate stage
//!
//! Commits the parent-child edges recorded at discovery time. Runs as the
//! final pass, once every descriptor in the stream is canonical, so both
//! endpoints of every edge have durable identities. All writes are
//! idempotent upserts; feeding this stage the same descriptors in any
//! order produces the same relation graph.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::trace;

use crate::error::{MirrorError, Result};
use crate::model::{ContentKey, ContentKind};
use crate::store::{ContentId, ContentStore};
use crate::sync::descriptor::{BlobRole, ContentDescriptor, ParentLink};
use crate::sync::pipeline::{StageReceiver, StageSender, SyncStage, send_or_abort};

pub struct InterrelateStage {
    store: Arc<dyn ContentStore>,
}

impl InterrelateStage {
    pub fn new(store: Arc<dyn ContentStore>) -> Self {
        Self { store }
    }

    async fn parent_id(&self, key: &ContentKey) -> Result<ContentId> {
        match self.store.get(key).await? {
            Some(record) => Ok(record.id),
            None => Err(MirrorError::Pipeline(format!(
                "relation parent {} is not persisted",
                key
            ))),
        }
    }

    async fn relate(&self, descriptor: &ContentDescriptor) -> Result<()> {
        let Some(link) = &descriptor.parent else {
            return Ok(());
        };
        let Some(child) = descriptor.saved else {
            return Err(MirrorError::Pipeline(format!(
                "{} carries a parent link but no canonical row",
                descriptor.key()
            )));
        };
        let parent = self.parent_id(&link.parent).await?;
        trace!(child = %descriptor.key(), parent = %link.parent, "committing relation");

        match (descriptor.kind(), link) {
            (
                ContentKind::Blob,
                ParentLink {
                    parent: key,
                    blob_role,
                },
            ) if key.kind == ContentKind::Manifest => match blob_role {
                Some(BlobRole::Layer) => {
                    self.store.add_manifest_layer(parent, child).await?;
                    Ok(())
                }
                Some(BlobRole::Config) => self.store.set_manifest_config(parent, child).await,
                None => Err(MirrorError::Pipeline(format!(
                    "blob {} is linked to a manifest without a role",
                    descriptor.key()
                ))),
            },
            (ContentKind::Manifest, link) if link.parent.kind == ContentKind::Tag => {
                self.store.set_tag_manifest(parent, child).await
            }
            (ContentKind::Manifest, link) if link.parent.kind == ContentKind::ManifestList => {
                self.store.add_list_manifest(parent, child).await?;
                Ok(())
            }
            (ContentKind::ManifestList, link) if link.parent.kind == ContentKind::Tag => {
                self.store.set_tag_manifest_list(parent, child).await
            }
            (child_kind, link) => Err(MirrorError::Pipeline(format!(
                "no relation is defined from {} to {}",
                child_kind, link.parent
            ))),
        }
    }
}

#[async_trait]
impl SyncStage for InterrelateStage {
    fn name(&self) -> &'static str {
        "interrelate"
    }

    async fn run(self: Box<Self>, mut input: StageReceiver, output: StageSender) -> Result<()> {
        while let Some(descriptor) = input.recv().await {
            self.relate(&descriptor).await?;
            send_or_abort(&output, descriptor, "interrelate").await?;
        }
        Ok(())
    }
}
