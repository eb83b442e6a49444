//! Discovery stage
//!
//! Parses every freshly downloaded tag and manifest body and emits pending
//! descriptors for the content nested inside it, tagged with the parent it
//! was discovered under. Blobs carry no nested content and pass through;
//! so does anything already canonical. A manifest list can only enter the
//! pipeline through a tag, anywhere else it is a contract violation.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, trace};

use crate::error::{MirrorError, Result};
use crate::model::schema::{self, BlobRef, ManifestDoc, ManifestDocument, ManifestListDoc};
use crate::model::{
    ContentData, ContentKey, ContentKind, ImageManifest, ManifestBlob, ManifestList, digest,
    media_type,
};
use crate::registry::{Artifact, DownloadRequest, RepositoryUrls};
use crate::sync::descriptor::{ContentDescriptor, ParentLink};
use crate::sync::pipeline::{StageReceiver, StageSender, SyncStage, send_or_abort};
use crate::sync::report::SyncCounters;

pub struct ProcessContentStage {
    urls: RepositoryUrls,
    counters: Arc<SyncCounters>,
}

impl ProcessContentStage {
    pub fn new(urls: RepositoryUrls, counters: Arc<SyncCounters>) -> Self {
        Self { urls, counters }
    }

    fn pending_manifest(&self, entry: &schema::ManifestRef, parent: ContentKey) -> ContentDescriptor {
        let download = DownloadRequest::new(self.urls.manifest_url(&entry.digest))
            .with_header("Accept", media_type::v2_accept())
            .with_expected_digest(entry.digest.clone());
        ContentDescriptor::pending(
            ContentData::Manifest(ImageManifest {
                digest: entry.digest.clone(),
                schema_version: 2,
                media_type: entry.media_type.clone(),
            }),
            download,
        )
        .with_parent(ParentLink::child_of(parent))
    }

    fn pending_blob(&self, entry: &BlobRef, parent: ParentLink) -> ContentDescriptor {
        let download = DownloadRequest::new(self.urls.blob_url(&entry.digest))
            .with_expected_digest(entry.digest.clone());
        ContentDescriptor::pending(
            ContentData::Blob(ManifestBlob {
                digest: entry.digest.clone(),
                media_type: entry.media_type.clone(),
            }),
            download,
        )
        .with_parent(parent)
    }

    /// Emit pending blobs for a manifest's config and layers.
    async fn emit_manifest_children(
        &self,
        doc: &ManifestDoc,
        manifest_key: &ContentKey,
        output: &StageSender,
    ) -> Result<()> {
        if let Some(config) = &doc.config {
            let child = self.pending_blob(config, ParentLink::config_of(manifest_key.clone()));
            send_or_abort(output, child, "process content").await?;
        }
        for layer in &doc.layers {
            let child = self.pending_blob(layer, ParentLink::layer_of(manifest_key.clone()));
            send_or_abort(output, child, "process content").await?;
        }
        Ok(())
    }

    /// A tag whose body is a manifest list: the list's identity is the
    /// hash of the tag's own bytes, and every entry becomes a pending
    /// manifest fetched by digest.
    async fn process_tagged_manifest_list(
        &self,
        tag: &ContentDescriptor,
        artifact: &Artifact,
        doc: ManifestListDoc,
        output: &StageSender,
    ) -> Result<()> {
        let list = ManifestList {
            digest: digest::prefixed(&artifact.sha256),
            schema_version: doc.schema_version,
            media_type: doc.media_type.clone(),
        };
        let list_data = ContentData::ManifestList(list);
        let list_key = list_data.key();

        for entry in &doc.manifests {
            let child = self.pending_manifest(entry, list_key.clone());
            send_or_abort(output, child, "process content").await?;
        }

        let list_descriptor = ContentDescriptor::pending(list_data, tag.download.clone())
            .with_artifact(artifact.clone())
            .with_parent(ParentLink::child_of(tag.key()));
        send_or_abort(output, list_descriptor, "process content").await
    }

    /// A tag whose body is an image manifest: the tag's artifact doubles
    /// as the manifest's artifact, no second fetch happens.
    async fn process_tagged_manifest(
        &self,
        tag: &ContentDescriptor,
        artifact: &Artifact,
        doc: ManifestDoc,
        output: &StageSender,
    ) -> Result<()> {
        let manifest = ImageManifest {
            digest: digest::prefixed(&artifact.sha256),
            schema_version: doc.schema_version,
            media_type: doc.media_type.clone(),
        };
        let manifest_data = ContentData::Manifest(manifest);
        let manifest_key = manifest_data.key();

        self.emit_manifest_children(&doc, &manifest_key, output).await?;

        let manifest_descriptor = ContentDescriptor::pending(manifest_data, tag.download.clone())
            .with_artifact(artifact.clone())
            .with_parent(ParentLink::child_of(tag.key()));
        send_or_abort(output, manifest_descriptor, "process content").await
    }

    async fn process_tag(
        &self,
        descriptor: ContentDescriptor,
        artifact: Artifact,
        raw: &[u8],
        output: &StageSender,
    ) -> Result<()> {
        match schema::classify(raw)? {
            ManifestDocument::List(doc) => {
                self.process_tagged_manifest_list(&descriptor, &artifact, doc, output)
                    .await?;
                send_or_abort(output, descriptor, "process content").await
            }
            ManifestDocument::Manifest(doc) => {
                self.process_tagged_manifest(&descriptor, &artifact, doc, output)
                    .await?;
                send_or_abort(output, descriptor, "process content").await
            }
            ManifestDocument::LegacySchema1 => {
                // Schema 1 content cannot be nested into; the tag is
                // dropped from the stream and only counted.
                debug!(key = %descriptor.key(), "skipping legacy schema 1 tag");
                self.counters.record_legacy_skip();
                Ok(())
            }
        }
    }

    async fn process_manifest(
        &self,
        descriptor: ContentDescriptor,
        raw: &[u8],
        output: &StageSender,
    ) -> Result<()> {
        let doc = match schema::classify(raw)? {
            ManifestDocument::Manifest(doc) => doc,
            ManifestDocument::List(_) => {
                return Err(MirrorError::Pipeline(format!(
                    "{} resolved to a manifest list; lists may only be tagged directly",
                    descriptor.key()
                )));
            }
            ManifestDocument::LegacySchema1 => {
                return Err(MirrorError::Parse(format!(
                    "{} resolved to a legacy schema 1 document",
                    descriptor.key()
                )));
            }
        };

        self.emit_manifest_children(&doc, &descriptor.key(), output).await?;
        send_or_abort(output, descriptor, "process content").await
    }
}

#[async_trait]
impl SyncStage for ProcessContentStage {
    fn name(&self) -> &'static str {
        "process content"
    }

    async fn run(self: Box<Self>, mut input: StageReceiver, output: StageSender) -> Result<()> {
        while let Some(descriptor) = input.recv().await {
            // Saved content has been processed in an earlier pass, and
            // blobs carry no nested content.
            if descriptor.is_canonical() || matches!(descriptor.content, ContentData::Blob(_)) {
                trace!(key = %descriptor.key(), "passing through discovery");
                send_or_abort(&output, descriptor, "process content").await?;
                continue;
            }

            let Some(artifact) = descriptor.artifact.clone() else {
                return Err(MirrorError::Pipeline(format!(
                    "{} reached discovery without a downloaded artifact",
                    descriptor.key()
                )));
            };
            let raw = tokio::fs::read(&artifact.path).await?;

            match descriptor.kind() {
                ContentKind::Tag => {
                    self.process_tag(descriptor, artifact, &raw, &output).await?
                }
                ContentKind::Manifest => {
                    self.process_manifest(descriptor, &raw, &output).await?
                }
                ContentKind::ManifestList => {
                    return Err(MirrorError::Pipeline(
                        "manifest lists must be discovered through tags, not fed to the pipeline"
                            .to_string(),
                    ));
                }
                ContentKind::Blob => unreachable!("blobs pass through above"),
            }
        }
        Ok(())
    }
}
