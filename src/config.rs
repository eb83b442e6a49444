//! Configuration module for registry endpoints and sync tuning

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{MirrorError, Result};

/// Location of the remote repository to mirror.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistryConfig {
    /// Normalized base URL, scheme included, no trailing slash.
    pub url: String,
    /// Repository name inside the registry, e.g. `library/alpine`.
    pub repository: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AuthConfig {
    pub username: Option<String>,
    pub password: Option<String>,
}

/// Tuning knobs for the sync pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Global cap on simultaneous in-flight transfers, shared by every
    /// download pass of the pipeline.
    pub max_concurrent_downloads: usize,
    /// Capacity of the bounded queues between stages.
    pub queue_capacity: usize,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            max_concurrent_downloads: 4,
            queue_capacity: 64,
        }
    }
}

impl RegistryConfig {
    /// Parse and normalize a registry URL. A bare host gets an `https://`
    /// scheme; a trailing slash is dropped.
    pub fn parse(url: &str, repository: &str) -> Result<Self> {
        if repository.is_empty() {
            return Err(MirrorError::Configuration(
                "repository name must not be empty".to_string(),
            ));
        }

        let candidate = if url.contains("://") {
            url.to_string()
        } else {
            format!("https://{}", url)
        };

        let parsed = Url::parse(&candidate)
            .map_err(|e| MirrorError::Configuration(format!("invalid registry URL '{}': {}", url, e)))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(MirrorError::Configuration(format!(
                "unsupported URL scheme '{}' for registry '{}'",
                parsed.scheme(),
                url
            )));
        }

        Ok(Self {
            url: candidate.trim_end_matches('/').to_string(),
            repository: repository.to_string(),
        })
    }
}

impl AuthConfig {
    pub fn has_credentials(&self) -> bool {
        self.username.is_some()
    }
}
