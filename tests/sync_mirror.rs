//! End-to-end sync tests against a fabricated remote.
//!
//! The remote is a map from URL to response body behind the `Downloader`
//! boundary, so the whole pipeline runs exactly as in production minus the
//! HTTP transport.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;

use docker_registry_mirror::config::{RegistryConfig, SyncConfig};
use docker_registry_mirror::error::{MirrorError, Result};
use docker_registry_mirror::model::{ContentKey, ContentKind, digest, media_type};
use docker_registry_mirror::registry::{Artifact, DownloadRequest, Downloader, RepositoryUrls};
use docker_registry_mirror::store::{ArtifactStore, ContentStore, MemoryStore};
use docker_registry_mirror::sync::{self, SyncSummary};

const BASE: &str = "http://registry.test";
const REPO: &str = "test/repo";

struct FakeRemote {
    bodies: HashMap<String, Vec<u8>>,
    staging: std::path::PathBuf,
    fetches: AtomicUsize,
}

#[async_trait]
impl Downloader for FakeRemote {
    async fn fetch(&self, request: &DownloadRequest) -> Result<Artifact> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        let body = self
            .bodies
            .get(&request.url)
            .ok_or_else(|| MirrorError::Registry(format!("GET {} returned 404", request.url)))?;
        let path = self.staging.join(uuid::Uuid::new_v4().to_string());
        tokio::fs::write(&path, body).await?;
        Ok(Artifact {
            path,
            sha256: digest::sha256_hex(body),
            size: body.len() as u64,
            persisted: false,
        })
    }
}

/// Builds the canned remote: URL map plus the tag list.
struct RemoteBuilder {
    urls: RepositoryUrls,
    bodies: HashMap<String, Vec<u8>>,
    tags: Vec<String>,
}

impl RemoteBuilder {
    fn new() -> Self {
        let config = RegistryConfig::parse(BASE, REPO).unwrap();
        Self {
            urls: RepositoryUrls::new(&config),
            bodies: HashMap::new(),
            tags: Vec::new(),
        }
    }

    fn blob(&mut self, content: &[u8]) -> serde_json::Value {
        let prefixed = digest::sha256_prefixed(content);
        self.bodies
            .insert(self.urls.blob_url(&prefixed), content.to_vec());
        serde_json::json!({
            "digest": prefixed,
            "mediaType": "application/vnd.docker.image.rootfs.diff.tar.gzip",
            "size": content.len()
        })
    }

    fn config_blob(&mut self, content: &[u8]) -> serde_json::Value {
        let prefixed = digest::sha256_prefixed(content);
        self.bodies
            .insert(self.urls.blob_url(&prefixed), content.to_vec());
        serde_json::json!({
            "digest": prefixed,
            "mediaType": "application/vnd.docker.container.image.v1+json",
            "size": content.len()
        })
    }

    /// Register a manifest fetched by digest; returns its list entry.
    fn manifest(&mut self, config: serde_json::Value, layers: &[serde_json::Value]) -> serde_json::Value {
        let body = serde_json::json!({
            "schemaVersion": 2,
            "mediaType": media_type::MANIFEST_V2,
            "config": config,
            "layers": layers
        })
        .to_string()
        .into_bytes();
        let prefixed = digest::sha256_prefixed(&body);
        self.bodies
            .insert(self.urls.manifest_url(&prefixed), body);
        serde_json::json!({
            "digest": prefixed,
            "mediaType": media_type::MANIFEST_V2
        })
    }

    fn tag(&mut self, name: &str, body: Vec<u8>) {
        self.bodies.insert(self.urls.manifest_url(name), body);
        self.tags.push(name.to_string());
    }

    fn tagged_manifest(&mut self, name: &str, config: serde_json::Value, layers: &[serde_json::Value]) {
        let body = serde_json::json!({
            "schemaVersion": 2,
            "mediaType": media_type::MANIFEST_V2,
            "config": config,
            "layers": layers
        })
        .to_string()
        .into_bytes();
        self.tag(name, body);
    }

    fn tagged_manifest_list(&mut self, name: &str, entries: &[serde_json::Value]) {
        let body = serde_json::json!({
            "schemaVersion": 2,
            "mediaType": media_type::MANIFEST_LIST,
            "manifests": entries
        })
        .to_string()
        .into_bytes();
        self.tag(name, body);
    }

    fn build(mut self, staging: &std::path::Path) -> Arc<FakeRemote> {
        let listing = serde_json::json!({"name": REPO, "tags": self.tags})
            .to_string()
            .into_bytes();
        self.bodies.insert(self.urls.tags_url(), listing);
        Arc::new(FakeRemote {
            bodies: self.bodies,
            staging: staging.to_path_buf(),
            fetches: AtomicUsize::new(0),
        })
    }
}

struct Harness {
    _dir: tempfile::TempDir,
    remote: Arc<FakeRemote>,
    store: Arc<MemoryStore>,
    artifacts: Arc<ArtifactStore>,
    urls: RepositoryUrls,
}

impl Harness {
    async fn new(builder: RemoteBuilder) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let urls = builder.urls.clone();
        let remote = builder.build(dir.path());
        let artifacts = Arc::new(ArtifactStore::open(dir.path().join("store")).await.unwrap());
        Self {
            _dir: dir,
            remote,
            store: Arc::new(MemoryStore::new()),
            artifacts,
            urls,
        }
    }

    async fn sync(&self) -> Result<SyncSummary> {
        sync::synchronize(
            self.remote.clone(),
            self.urls.clone(),
            self.store.clone(),
            self.artifacts.clone(),
            SyncConfig::default(),
        )
        .await
    }

    async fn id_of(&self, kind: ContentKind, id: &str) -> uuid::Uuid {
        self.store
            .get(&ContentKey::new(kind, id))
            .await
            .unwrap()
            .unwrap()
            .id
    }
}

/// A remote with one manifest-list tag (two manifests sharing a layer),
/// one plain manifest tag, and one legacy schema 1 tag.
fn full_remote() -> RemoteBuilder {
    let mut remote = RemoteBuilder::new();

    let shared = remote.blob(b"layer-shared");
    let only_a = remote.blob(b"layer-a");
    let only_b = remote.blob(b"layer-b");
    let config_a = remote.config_blob(b"{\"os\":\"linux\",\"arch\":\"amd64\"}");
    let config_b = remote.config_blob(b"{\"os\":\"linux\",\"arch\":\"arm64\"}");
    let entry_a = remote.manifest(config_a, &[shared.clone(), only_a]);
    let entry_b = remote.manifest(config_b, &[shared.clone(), only_b]);
    remote.tagged_manifest_list("multi", &[entry_a, entry_b]);

    let plain_config = remote.config_blob(b"{\"os\":\"linux\"}");
    let plain_layer = remote.blob(b"layer-plain");
    remote.tagged_manifest("simple", plain_config, &[plain_layer, shared]);

    remote.tag(
        "ancient",
        serde_json::json!({"schemaVersion": 1, "fsLayers": []})
            .to_string()
            .into_bytes(),
    );

    remote
}

#[tokio::test]
async fn sync_builds_the_complete_hierarchy() {
    let harness = Harness::new(full_remote()).await;
    let summary = harness.sync().await.unwrap();

    let store = &harness.store;
    // The legacy tag is skipped, the other two become rows.
    assert_eq!(store.count_kind(ContentKind::Tag).await, 2);
    assert_eq!(store.count_kind(ContentKind::ManifestList).await, 1);
    // Two listed manifests plus the directly tagged one.
    assert_eq!(store.count_kind(ContentKind::Manifest).await, 3);
    // Layers: shared, a, b, plain. Configs: amd64, arm64, plain.
    assert_eq!(store.count_kind(ContentKind::Blob).await, 7);

    assert_eq!(store.list_manifests().await.len(), 2);
    // Each listed manifest has two layers, the tagged one has two as well.
    assert_eq!(store.manifest_layers().await.len(), 6);

    let report = summary.report;
    assert_eq!(report.tags_listed, 3);
    assert_eq!(report.legacy_skipped, 1);
    assert_eq!(report.tags, 2);
    assert_eq!(report.manifest_lists, 1);
    assert_eq!(report.manifests, 3);
    assert_eq!(report.blobs, 7);

    // Every canonical row is part of the new version.
    assert_eq!(summary.version.len(), 13);
    assert_eq!(summary.version.repository, REPO);
}

#[tokio::test]
async fn tags_resolve_to_exactly_one_reference() {
    let harness = Harness::new(full_remote()).await;
    harness.sync().await.unwrap();

    let multi = harness.id_of(ContentKind::Tag, "multi").await;
    let (manifest_ref, list_ref) = harness.store.tag_references(multi).await;
    assert!(manifest_ref.is_none());
    assert!(list_ref.is_some());

    let simple = harness.id_of(ContentKind::Tag, "simple").await;
    let (manifest_ref, list_ref) = harness.store.tag_references(simple).await;
    assert!(manifest_ref.is_some());
    assert!(list_ref.is_none());

    // The legacy tag never became a row at all.
    assert!(
        harness
            .store
            .get(&ContentKey::new(ContentKind::Tag, "ancient"))
            .await
            .unwrap()
            .is_none()
    );
}

#[tokio::test]
async fn a_layer_shared_across_manifests_is_stored_once() {
    let harness = Harness::new(full_remote()).await;
    harness.sync().await.unwrap();

    let shared_digest = digest::sha256_prefixed(b"layer-shared");
    let blob = harness.id_of(ContentKind::Blob, &shared_digest).await;

    let edges = harness.store.manifest_layers().await;
    let referencing: Vec<_> = edges.iter().filter(|(_, b)| *b == blob).collect();
    // Both listed manifests and the tagged manifest reference it.
    assert_eq!(referencing.len(), 3);
}

#[tokio::test]
async fn manifests_keep_a_reference_to_their_config_blob() {
    let harness = Harness::new(full_remote()).await;
    harness.sync().await.unwrap();

    let plain_config = digest::sha256_prefixed(b"{\"os\":\"linux\"}");
    let config_id = harness.id_of(ContentKind::Blob, &plain_config).await;

    let simple = harness.id_of(ContentKind::Tag, "simple").await;
    let (manifest_ref, _) = harness.store.tag_references(simple).await;
    assert_eq!(
        harness.store.manifest_config(manifest_ref.unwrap()).await,
        Some(config_id)
    );
}

#[tokio::test]
async fn resyncing_an_unchanged_remote_creates_nothing_new() {
    let harness = Harness::new(full_remote()).await;
    harness.sync().await.unwrap();
    let rows_after_first = harness.store.len().await;

    let summary = harness.sync().await.unwrap();

    assert_eq!(harness.store.len().await, rows_after_first);
    let report = summary.report;
    assert_eq!(report.created_total(), 0);
    // Every saved descriptor resolved to an existing row instead.
    assert!(report.deduplicated > 0);
    assert_eq!(report.legacy_skipped, 1);
    // Edges did not duplicate either.
    assert_eq!(harness.store.manifest_layers().await.len(), 6);
    assert_eq!(harness.store.list_manifests().await.len(), 2);
    // The second version still covers the full content set.
    assert_eq!(summary.version.len(), rows_after_first);
}

#[tokio::test]
async fn an_unknown_media_type_aborts_without_partial_state() {
    let mut remote = RemoteBuilder::new();
    remote.tag(
        "broken",
        serde_json::json!({
            "schemaVersion": 2,
            "mediaType": "application/vnd.example.unknown+json"
        })
        .to_string()
        .into_bytes(),
    );
    let harness = Harness::new(remote).await;

    let error = harness.sync().await.unwrap_err();
    assert!(matches!(error, MirrorError::UnsupportedMediaType(_)));

    // Nothing was linked and no version exists; the failed tag never
    // became canonical.
    assert_eq!(harness.store.len().await, 0);
    assert!(harness.store.manifest_layers().await.is_empty());
    assert!(harness.store.list_manifests().await.is_empty());
}

#[tokio::test]
async fn a_missing_blob_fails_the_sync() {
    let mut remote = RemoteBuilder::new();
    let mut ghost = remote.blob(b"ghost");
    // Point the manifest at a digest the remote will 404 on.
    ghost["digest"] = serde_json::Value::String(digest::sha256_prefixed(b"not-served"));
    let config = remote.config_blob(b"{}");
    remote.tagged_manifest("latest", config, &[ghost]);
    let harness = Harness::new(remote).await;

    assert!(matches!(
        harness.sync().await,
        Err(MirrorError::Registry(_))
    ));
}

#[tokio::test]
async fn corrupted_blob_bytes_fail_digest_verification() {
    let mut remote = RemoteBuilder::new();
    let mut entry = remote.blob(b"true-bytes");
    // Declare a digest of different bytes and serve the original bytes at
    // that digest's URL.
    let lying = digest::sha256_prefixed(b"other-bytes");
    entry["digest"] = serde_json::Value::String(lying.clone());
    remote
        .bodies
        .insert(remote.urls.blob_url(&lying), b"true-bytes".to_vec());
    let config = remote.config_blob(b"{}");
    remote.tagged_manifest("latest", config, &[entry]);
    let harness = Harness::new(remote).await;

    assert!(matches!(
        harness.sync().await,
        Err(MirrorError::DigestMismatch { .. })
    ));
}
