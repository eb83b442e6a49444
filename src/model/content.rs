//! Content entity definitions
//!
//! A repository is a four-level hierarchy: a tag points at either one image
//! manifest or one manifest list, a manifest list references platform
//! manifests, and a manifest references layer blobs plus one config blob.
//! Manifests, lists, and blobs are identified by digest; tags by name.

use std::fmt;

/// Closed set of content kinds the pipeline moves around. Every stage
/// matches on this exhaustively.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContentKind {
    Tag,
    ManifestList,
    Manifest,
    Blob,
}

impl fmt::Display for ContentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ContentKind::Tag => "tag",
            ContentKind::ManifestList => "manifest-list",
            ContentKind::Manifest => "manifest",
            ContentKind::Blob => "blob",
        };
        write!(f, "{}", name)
    }
}

/// Persistent identity of a content object: digest for manifests, lists,
/// and blobs, name for tags. Two rows may never share a key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ContentKey {
    pub kind: ContentKind,
    pub id: String,
}

impl ContentKey {
    pub fn new(kind: ContentKind, id: impl Into<String>) -> Self {
        Self {
            kind,
            id: id.into(),
        }
    }
}

impl fmt::Display for ContentKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind, self.id)
    }
}

/// Named pointer to one manifest or one manifest list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tag {
    pub name: String,
}

/// A fat manifest referencing one image manifest per platform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManifestList {
    pub digest: String,
    pub schema_version: u32,
    pub media_type: String,
}

/// A schema 2 image manifest referencing an ordered set of layer blobs and
/// one config blob.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageManifest {
    pub digest: String,
    pub schema_version: u32,
    pub media_type: String,
}

/// An opaque content-addressed payload, either a layer or a config object.
/// Leaf of the hierarchy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManifestBlob {
    pub digest: String,
    pub media_type: String,
}

/// One unit of content flowing through the pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContentData {
    Tag(Tag),
    ManifestList(ManifestList),
    Manifest(ImageManifest),
    Blob(ManifestBlob),
}

impl ContentData {
    pub fn kind(&self) -> ContentKind {
        match self {
            ContentData::Tag(_) => ContentKind::Tag,
            ContentData::ManifestList(_) => ContentKind::ManifestList,
            ContentData::Manifest(_) => ContentKind::Manifest,
            ContentData::Blob(_) => ContentKind::Blob,
        }
    }

    pub fn key(&self) -> ContentKey {
        match self {
            ContentData::Tag(tag) => ContentKey::new(ContentKind::Tag, tag.name.clone()),
            ContentData::ManifestList(list) => {
                ContentKey::new(ContentKind::ManifestList, list.digest.clone())
            }
            ContentData::Manifest(manifest) => {
                ContentKey::new(ContentKind::Manifest, manifest.digest.clone())
            }
            ContentData::Blob(blob) => ContentKey::new(ContentKind::Blob, blob.digest.clone()),
        }
    }
}
