//! Wire documents served by the Docker Registry HTTP API v2
//!
//! The manifest endpoint serves either an image manifest or a manifest
//! list; the two are told apart by the `mediaType` field. Bodies without a
//! recognized media type are either legacy schema 1 manifests (tolerated
//! and skipped) or a hard error.

use serde::Deserialize;

use crate::error::{MirrorError, Result};
use crate::model::media_type;

/// Body of `GET /v2/{name}/tags/list`.
#[derive(Debug, Clone, Deserialize)]
pub struct TagListDoc {
    #[serde(default)]
    pub name: Option<String>,
    pub tags: Vec<String>,
}

/// A manifest list, one entry per platform manifest.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManifestListDoc {
    pub schema_version: u32,
    pub media_type: String,
    pub manifests: Vec<ManifestRef>,
}

/// Reference to a platform manifest inside a manifest list.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManifestRef {
    pub digest: String,
    pub media_type: String,
    #[serde(default)]
    pub size: Option<u64>,
}

/// A schema 2 image manifest.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManifestDoc {
    pub schema_version: u32,
    pub media_type: String,
    #[serde(default)]
    pub config: Option<BlobRef>,
    #[serde(default)]
    pub layers: Vec<BlobRef>,
}

/// Reference to a blob from a manifest's `layers` or `config` field.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlobRef {
    pub digest: String,
    pub media_type: String,
    #[serde(default)]
    pub size: Option<u64>,
}

/// What the body of a manifest endpoint turned out to be.
#[derive(Debug)]
pub enum ManifestDocument {
    List(ManifestListDoc),
    Manifest(ManifestDoc),
    /// Legacy schema 1 content. Not an error; callers count and skip it.
    LegacySchema1,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DocumentProbe {
    #[serde(default)]
    media_type: Option<String>,
    #[serde(default)]
    schema_version: Option<u32>,
}

/// Classify a manifest endpoint body by its `mediaType` field, falling back
/// to `schemaVersion` for legacy content. Any other media type is fatal.
pub fn classify(raw: &[u8]) -> Result<ManifestDocument> {
    let probe: DocumentProbe = serde_json::from_slice(raw)?;
    match probe.media_type.as_deref() {
        Some(media_type::MANIFEST_LIST) => {
            Ok(ManifestDocument::List(serde_json::from_slice(raw)?))
        }
        Some(media_type::MANIFEST_V2) => {
            Ok(ManifestDocument::Manifest(serde_json::from_slice(raw)?))
        }
        _ if probe.schema_version == Some(1) => Ok(ManifestDocument::LegacySchema1),
        Some(other) => Err(MirrorError::UnsupportedMediaType(other.to_string())),
        None => Err(MirrorError::Parse(
            "manifest body carries neither a mediaType nor schemaVersion 1".to_string(),
        )),
    }
}
