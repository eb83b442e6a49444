//! Remote registry interactions
//!
//! This module provides the downloader boundary and the HTTP client for the
//! Docker Registry HTTP API v2, plus the URL constructors for the three
//! endpoints a sync touches: the tag list, manifests, and blobs.

pub mod client;
pub mod downloader;

pub use client::{RegistryClient, RegistryClientBuilder, RepositoryUrls};
pub use downloader::{Artifact, DownloadRequest, Downloader};
