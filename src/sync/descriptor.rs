//! Pending content descriptors
//!
//! A descriptor pairs one content object with the instruction for fetching
//! its representation and, once known, its downloaded artifact, canonical
//! row id, and parent linkage. It is the unit that flows through every
//! pipeline queue.

use crate::model::{ContentData, ContentKey, ContentKind};
use crate::registry::{Artifact, DownloadRequest};
use crate::store::ContentId;

/// How a blob relates to the manifest that declared it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlobRole {
    Layer,
    Config,
}

/// Typed parent linkage, recorded at discovery time and committed by the
/// interrelate stage once both endpoints are canonical.
#[derive(Debug, Clone)]
pub struct ParentLink {
    pub parent: ContentKey,
    /// Set only when the child is a blob.
    pub blob_role: Option<BlobRole>,
}

impl ParentLink {
    pub fn child_of(parent: ContentKey) -> Self {
        Self {
            parent,
            blob_role: None,
        }
    }

    pub fn layer_of(manifest: ContentKey) -> Self {
        Self {
            parent: manifest,
            blob_role: Some(BlobRole::Layer),
        }
    }

    pub fn config_of(manifest: ContentKey) -> Self {
        Self {
            parent: manifest,
            blob_role: Some(BlobRole::Config),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ContentDescriptor {
    pub content: ContentData,
    pub download: DownloadRequest,
    /// Present once the representation has been fetched.
    pub artifact: Option<Artifact>,
    /// Present once the content has a canonical row.
    pub saved: Option<ContentId>,
    pub parent: Option<ParentLink>,
}

impl ContentDescriptor {
    pub fn pending(content: ContentData, download: DownloadRequest) -> Self {
        Self {
            content,
            download,
            artifact: None,
            saved: None,
            parent: None,
        }
    }

    pub fn with_parent(mut self, parent: ParentLink) -> Self {
        self.parent = Some(parent);
        self
    }

    /// Reuse an already downloaded representation, as when a tag's own
    /// bytes double as its manifest's bytes.
    pub fn with_artifact(mut self, artifact: Artifact) -> Self {
        self.artifact = Some(artifact);
        self
    }

    pub fn kind(&self) -> ContentKind {
        self.content.kind()
    }

    pub fn key(&self) -> ContentKey {
        self.content.key()
    }

    pub fn is_materialized(&self) -> bool {
        self.artifact.is_some()
    }

    pub fn is_canonical(&self) -> bool {
        self.saved.is_some()
    }
}
