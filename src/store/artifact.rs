//! Content-addressed artifact storage
//!
//! Downloaded files land in a staging directory first and are renamed into
//! `blobs/sha256/<hex>` once their hash is known. Persisting an artifact
//! whose digest is already stored is a no-op; the staged duplicate is
//! discarded.

use std::path::{Path, PathBuf};

use uuid::Uuid;

use crate::error::Result;

pub struct ArtifactStore {
    root: PathBuf,
}

impl ArtifactStore {
    /// Open a store rooted at `root`, creating the directory layout if it
    /// does not exist yet.
    pub async fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        tokio::fs::create_dir_all(root.join("staging")).await?;
        tokio::fs::create_dir_all(root.join("blobs").join("sha256")).await?;
        Ok(Self { root })
    }

    /// A fresh path in the staging area for a download in progress.
    pub fn staging_path(&self) -> PathBuf {
        self.root.join("staging").join(Uuid::new_v4().to_string())
    }

    /// Final location for the given bare hex digest.
    pub fn path_for(&self, sha256_hex: &str) -> PathBuf {
        self.root.join("blobs").join("sha256").join(sha256_hex)
    }

    pub async fn contains(&self, sha256_hex: &str) -> bool {
        tokio::fs::metadata(self.path_for(sha256_hex)).await.is_ok()
    }

    /// Move a staged file to its content-addressed location. If the digest
    /// is already stored the staged copy is removed and the existing path
    /// returned.
    pub async fn persist(&self, staged: &Path, sha256_hex: &str) -> Result<PathBuf> {
        let target = self.path_for(sha256_hex);
        if tokio::fs::metadata(&target).await.is_ok() {
            tokio::fs::remove_file(staged).await?;
        } else {
            tokio::fs::rename(staged, &target).await?;
        }
        Ok(target)
    }

    pub async fn read(&self, sha256_hex: &str) -> Result<Vec<u8>> {
        Ok(tokio::fs::read(self.path_for(sha256_hex)).await?)
    }
}
