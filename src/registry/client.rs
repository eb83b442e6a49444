//! HTTP client for the Docker Registry API v2
//!
//! `RegistryClient` owns the reqwest client and implements the `Downloader`
//! boundary by streaming response bodies into the artifact store's staging
//! area while hashing them.

use std::sync::Arc;

use sha2::{Digest, Sha256};
use tokio::io::AsyncWriteExt;

use crate::config::{AuthConfig, RegistryConfig};
use crate::error::{MirrorError, Result};
use crate::registry::downloader::{Artifact, DownloadRequest, Downloader};
use crate::store::artifact::ArtifactStore;

/// Endpoint URL constructors for one repository of one registry.
#[derive(Debug, Clone)]
pub struct RepositoryUrls {
    base: String,
    repository: String,
}

impl RepositoryUrls {
    pub fn new(config: &RegistryConfig) -> Self {
        Self {
            base: config.url.clone(),
            repository: config.repository.clone(),
        }
    }

    pub fn repository(&self) -> &str {
        &self.repository
    }

    pub fn tags_url(&self) -> String {
        format!("{}/v2/{}/tags/list", self.base, self.repository)
    }

    /// Manifest endpoint; `reference` is a tag name or a prefixed digest.
    pub fn manifest_url(&self, reference: &str) -> String {
        format!("{}/v2/{}/manifests/{}", self.base, self.repository, reference)
    }

    pub fn blob_url(&self, digest: &str) -> String {
        format!("{}/v2/{}/blobs/{}", self.base, self.repository, digest)
    }
}

pub struct RegistryClientBuilder {
    config: RegistryConfig,
    auth: AuthConfig,
    artifacts: Option<Arc<ArtifactStore>>,
}

impl RegistryClientBuilder {
    pub fn new(config: RegistryConfig) -> Self {
        Self {
            config,
            auth: AuthConfig::default(),
            artifacts: None,
        }
    }

    pub fn with_auth(mut self, auth: AuthConfig) -> Self {
        self.auth = auth;
        self
    }

    pub fn with_artifact_store(mut self, artifacts: Arc<ArtifactStore>) -> Self {
        self.artifacts = Some(artifacts);
        self
    }

    pub fn build(self) -> Result<RegistryClient> {
        let artifacts = self.artifacts.ok_or_else(|| {
            MirrorError::Configuration("registry client requires an artifact store".to_string())
        })?;
        Ok(RegistryClient {
            http: reqwest::Client::new(),
            urls: RepositoryUrls::new(&self.config),
            auth: self.auth,
            artifacts,
        })
    }
}

pub struct RegistryClient {
    http: reqwest::Client,
    urls: RepositoryUrls,
    auth: AuthConfig,
    artifacts: Arc<ArtifactStore>,
}

impl RegistryClient {
    pub fn builder(config: RegistryConfig) -> RegistryClientBuilder {
        RegistryClientBuilder::new(config)
    }

    pub fn urls(&self) -> &RepositoryUrls {
        &self.urls
    }
}

#[async_trait::async_trait]
impl Downloader for RegistryClient {
    async fn fetch(&self, request: &DownloadRequest) -> Result<Artifact> {
        let mut builder = self.http.get(&request.url);
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(username) = &self.auth.username {
            builder = builder.basic_auth(username, self.auth.password.as_deref());
        }

        let mut response = builder.send().await?;
        if !response.status().is_success() {
            return Err(MirrorError::Registry(format!(
                "GET {} returned {}",
                request.url,
                response.status()
            )));
        }

        let path = self.artifacts.staging_path();
        let mut file = tokio::fs::File::create(&path).await?;
        let mut hasher = Sha256::new();
        let mut size: u64 = 0;
        while let Some(chunk) = response.chunk().await? {
            hasher.update(&chunk);
            size += chunk.len() as u64;
            file.write_all(&chunk).await?;
        }
        file.flush().await?;

        Ok(Artifact {
            path,
            sha256: hex::encode(hasher.finalize()),
            size,
            persisted: false,
        })
    }
}
