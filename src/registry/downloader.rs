//! Downloader boundary
//!
//! The pipeline never talks HTTP directly; it hands `DownloadRequest`s to a
//! `Downloader` and gets back a local file plus its hash. Retry and backoff
//! policies live behind this trait, not in the pipeline.

use std::path::PathBuf;

use async_trait::async_trait;

use crate::error::Result;

/// One artifact fetch: a URL plus the extra headers it must be requested
/// with, and optionally the digest the URL names.
#[derive(Debug, Clone)]
pub struct DownloadRequest {
    pub url: String,
    pub headers: Vec<(String, String)>,
    /// Prefixed digest the response bytes are expected to hash to, set when
    /// the URL itself names a digest. Verified by the download stage.
    pub expected_digest: Option<String>,
}

impl DownloadRequest {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            headers: Vec::new(),
            expected_digest: None,
        }
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn with_expected_digest(mut self, digest: impl Into<String>) -> Self {
        self.expected_digest = Some(digest.into());
        self
    }
}

/// A downloaded representation on local disk.
#[derive(Debug, Clone)]
pub struct Artifact {
    pub path: PathBuf,
    /// Bare hex sha256 of the file's bytes, computed while writing.
    pub sha256: String,
    pub size: u64,
    /// True once the file lives at its final content-addressed location.
    pub persisted: bool,
}

/// Fetches one URL into a local file. A fetch either succeeds completely or
/// fails the sync; partial downloads never reach the pipeline.
#[async_trait]
pub trait Downloader: Send + Sync {
    async fn fetch(&self, request: &DownloadRequest) -> Result<Artifact>;
}
