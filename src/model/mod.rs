//! Content model for mirrored registry repositories
//!
//! Defines the four content kinds a repository is made of (tags, manifest
//! lists, image manifests, blobs), their identity keys, digest helpers, and
//! the serde types for the wire documents the registry serves.

pub mod content;
pub mod digest;
pub mod media_type;
pub mod schema;

pub use content::{
    ContentData, ContentKey, ContentKind, ImageManifest, ManifestBlob, ManifestList, Tag,
};
pub use schema::{BlobRef, ManifestDoc, ManifestDocument, ManifestListDoc, ManifestRef, TagListDoc};
