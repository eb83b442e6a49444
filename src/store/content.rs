//! Canonical content rows and relation tables
//!
//! `ContentStore` is the persistence boundary of the sync pipeline. Its
//! `insert` treats "check whether this identity exists, else create it" as
//! one atomic step per identity, so two stages racing to save the same
//! digest can never both create a row; the loser adopts the winner's id.
//! Relation writes are idempotent upserts, never read-then-write.

use std::collections::{BTreeSet, HashMap};

use async_trait::async_trait;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::error::{MirrorError, Result};
use crate::model::{ContentData, ContentKey, ContentKind};

pub type ContentId = Uuid;

/// A content object as persisted, identified by a surrogate id and keyed by
/// its digest or name.
#[derive(Debug, Clone)]
pub struct ContentRecord {
    pub id: ContentId,
    pub data: ContentData,
}

impl ContentRecord {
    pub fn new(data: ContentData) -> Self {
        Self {
            id: Uuid::new_v4(),
            data,
        }
    }

    pub fn key(&self) -> ContentKey {
        self.data.key()
    }
}

/// Result of an insert attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveOutcome {
    /// The row was created; this identity was new.
    Created(ContentId),
    /// A row with this identity already existed; its id is returned and the
    /// attempted record is discarded.
    Existing(ContentId),
}

impl SaveOutcome {
    pub fn id(&self) -> ContentId {
        match self {
            SaveOutcome::Created(id) | SaveOutcome::Existing(id) => *id,
        }
    }
}

#[async_trait]
pub trait ContentStore: Send + Sync {
    /// Atomically create the row for `record`'s identity, or report the
    /// existing one.
    async fn insert(&self, record: ContentRecord) -> Result<SaveOutcome>;

    async fn get(&self, key: &ContentKey) -> Result<Option<ContentRecord>>;

    /// Upsert a manifest-to-layer-blob relation. Returns false when the
    /// edge already existed.
    async fn add_manifest_layer(&self, manifest: ContentId, blob: ContentId) -> Result<bool>;

    /// Upsert a manifest-list-to-manifest relation. Returns false when the
    /// edge already existed.
    async fn add_list_manifest(&self, list: ContentId, manifest: ContentId) -> Result<bool>;

    /// Point a tag at its image manifest. A tag resolves to exactly one of
    /// manifest or manifest list; violating that is a store error.
    async fn set_tag_manifest(&self, tag: ContentId, manifest: ContentId) -> Result<()>;

    /// Point a tag at its manifest list, under the same exclusivity rule.
    async fn set_tag_manifest_list(&self, tag: ContentId, list: ContentId) -> Result<()>;

    /// Point a manifest at its config blob.
    async fn set_manifest_config(&self, manifest: ContentId, blob: ContentId) -> Result<()>;
}

#[derive(Debug, Default)]
struct Tables {
    rows: HashMap<ContentId, ContentRecord>,
    by_key: HashMap<ContentKey, ContentId>,
    manifest_layers: BTreeSet<(ContentId, ContentId)>,
    list_manifests: BTreeSet<(ContentId, ContentId)>,
    tag_manifest: HashMap<ContentId, ContentId>,
    tag_manifest_list: HashMap<ContentId, ContentId>,
    manifest_config: HashMap<ContentId, ContentId>,
}

impl Tables {
    fn expect_kind(&self, id: ContentId, kind: ContentKind) -> Result<()> {
        match self.rows.get(&id) {
            Some(record) if record.data.kind() == kind => Ok(()),
            Some(record) => Err(MirrorError::Store(format!(
                "expected a {} row, found {} ({})",
                kind,
                record.data.kind(),
                id
            ))),
            None => Err(MirrorError::Store(format!("no content row with id {}", id))),
        }
    }

    /// Set `map[from] = to`, tolerating an identical existing value.
    fn set_reference(
        map: &mut HashMap<ContentId, ContentId>,
        from: ContentId,
        to: ContentId,
        what: &str,
    ) -> Result<()> {
        match map.get(&from) {
            Some(existing) if *existing == to => Ok(()),
            Some(existing) => Err(MirrorError::Store(format!(
                "{} already set to {}, refusing to repoint to {}",
                what, existing, to
            ))),
            None => {
                map.insert(from, to);
                Ok(())
            }
        }
    }
}

/// In-process `ContentStore`. One mutex over all tables serializes the
/// check-and-insert step, which is the mutual exclusion the dedupe contract
/// requires; a SQL implementation would use uniqueness constraints with
/// conflict handling instead.
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.tables.lock().await.rows.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.tables.lock().await.rows.is_empty()
    }

    pub async fn count_kind(&self, kind: ContentKind) -> usize {
        let tables = self.tables.lock().await;
        tables
            .rows
            .values()
            .filter(|record| record.data.kind() == kind)
            .count()
    }

    pub async fn manifest_layers(&self) -> Vec<(ContentId, ContentId)> {
        self.tables
            .lock()
            .await
            .manifest_layers
            .iter()
            .copied()
            .collect()
    }

    pub async fn list_manifests(&self) -> Vec<(ContentId, ContentId)> {
        self.tables
            .lock()
            .await
            .list_manifests
            .iter()
            .copied()
            .collect()
    }

    /// The (manifest, manifest list) references of a tag, in that order.
    pub async fn tag_references(&self, tag: ContentId) -> (Option<ContentId>, Option<ContentId>) {
        let tables = self.tables.lock().await;
        (
            tables.tag_manifest.get(&tag).copied(),
            tables.tag_manifest_list.get(&tag).copied(),
        )
    }

    pub async fn manifest_config(&self, manifest: ContentId) -> Option<ContentId> {
        self.tables
            .lock()
            .await
            .manifest_config
            .get(&manifest)
            .copied()
    }
}

#[async_trait]
impl ContentStore for MemoryStore {
    async fn insert(&self, record: ContentRecord) -> Result<SaveOutcome> {
        let mut tables = self.tables.lock().await;
        let key = record.key();
        if let Some(existing) = tables.by_key.get(&key) {
            return Ok(SaveOutcome::Existing(*existing));
        }
        let id = record.id;
        tables.by_key.insert(key, id);
        tables.rows.insert(id, record);
        Ok(SaveOutcome::Created(id))
    }

    async fn get(&self, key: &ContentKey) -> Result<Option<ContentRecord>> {
        let tables = self.tables.lock().await;
        Ok(tables
            .by_key
            .get(key)
            .and_then(|id| tables.rows.get(id))
            .cloned())
    }

    async fn add_manifest_layer(&self, manifest: ContentId, blob: ContentId) -> Result<bool> {
        let mut tables = self.tables.lock().await;
        tables.expect_kind(manifest, ContentKind::Manifest)?;
        tables.expect_kind(blob, ContentKind::Blob)?;
        Ok(tables.manifest_layers.insert((manifest, blob)))
    }

    async fn add_list_manifest(&self, list: ContentId, manifest: ContentId) -> Result<bool> {
        let mut tables = self.tables.lock().await;
        tables.expect_kind(list, ContentKind::ManifestList)?;
        tables.expect_kind(manifest, ContentKind::Manifest)?;
        Ok(tables.list_manifests.insert((list, manifest)))
    }

    async fn set_tag_manifest(&self, tag: ContentId, manifest: ContentId) -> Result<()> {
        let mut tables = self.tables.lock().await;
        tables.expect_kind(tag, ContentKind::Tag)?;
        tables.expect_kind(manifest, ContentKind::Manifest)?;
        if tables.tag_manifest_list.contains_key(&tag) {
            return Err(MirrorError::Store(format!(
                "tag {} already points at a manifest list",
                tag
            )));
        }
        Tables::set_reference(&mut tables.tag_manifest, tag, manifest, "tag manifest")
    }

    async fn set_tag_manifest_list(&self, tag: ContentId, list: ContentId) -> Result<()> {
        let mut tables = self.tables.lock().await;
        tables.expect_kind(tag, ContentKind::Tag)?;
        tables.expect_kind(list, ContentKind::ManifestList)?;
        if tables.tag_manifest.contains_key(&tag) {
            return Err(MirrorError::Store(format!(
                "tag {} already points at a manifest",
                tag
            )));
        }
        Tables::set_reference(&mut tables.tag_manifest_list, tag, list, "tag manifest list")
    }

    async fn set_manifest_config(&self, manifest: ContentId, blob: ContentId) -> Result<()> {
        let mut tables = self.tables.lock().await;
        tables.expect_kind(manifest, ContentKind::Manifest)?;
        tables.expect_kind(blob, ContentKind::Blob)?;
        Tables::set_reference(&mut tables.manifest_config, manifest, blob, "manifest config")
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::model::{ImageManifest, ManifestBlob, Tag};

    fn blob(digest: &str) -> ContentData {
        ContentData::Blob(ManifestBlob {
            digest: digest.to_string(),
            media_type: "application/vnd.docker.image.rootfs.diff.tar.gzip".to_string(),
        })
    }

    fn manifest(digest: &str) -> ContentData {
        ContentData::Manifest(ImageManifest {
            digest: digest.to_string(),
            schema_version: 2,
            media_type: crate::model::media_type::MANIFEST_V2.to_string(),
        })
    }

    #[tokio::test]
    async fn insert_is_idempotent_per_identity() {
        let store = MemoryStore::new();
        let first = store.insert(ContentRecord::new(blob("sha256:d"))).await.unwrap();
        let second = store.insert(ContentRecord::new(blob("sha256:d"))).await.unwrap();

        let SaveOutcome::Created(winner) = first else {
            panic!("first insert must create");
        };
        assert_eq!(second, SaveOutcome::Existing(winner));
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn concurrent_inserts_of_one_digest_create_one_row() {
        let store = Arc::new(MemoryStore::new());
        let mut handles = Vec::new();
        for _ in 0..16 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                store.insert(ContentRecord::new(blob("sha256:shared"))).await
            }));
        }

        let mut created = 0;
        let mut ids = BTreeSet::new();
        for handle in handles {
            match handle.await.unwrap().unwrap() {
                SaveOutcome::Created(id) => {
                    created += 1;
                    ids.insert(id);
                }
                SaveOutcome::Existing(id) => {
                    ids.insert(id);
                }
            }
        }

        assert_eq!(created, 1);
        assert_eq!(ids.len(), 1);
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn relation_upserts_do_not_duplicate_edges() {
        let store = MemoryStore::new();
        let man = store.insert(ContentRecord::new(manifest("sha256:m"))).await.unwrap().id();
        let layer = store.insert(ContentRecord::new(blob("sha256:l"))).await.unwrap().id();

        assert!(store.add_manifest_layer(man, layer).await.unwrap());
        assert!(!store.add_manifest_layer(man, layer).await.unwrap());
        assert_eq!(store.manifest_layers().await.len(), 1);
    }

    #[tokio::test]
    async fn tag_references_are_mutually_exclusive() {
        let store = MemoryStore::new();
        let tag = store
            .insert(ContentRecord::new(ContentData::Tag(Tag {
                name: "latest".to_string(),
            })))
            .await
            .unwrap()
            .id();
        let man = store.insert(ContentRecord::new(manifest("sha256:m"))).await.unwrap().id();

        store.set_tag_manifest(tag, man).await.unwrap();
        // Same value again is a no-op.
        store.set_tag_manifest(tag, man).await.unwrap();

        let list_id = store
            .insert(ContentRecord::new(ContentData::ManifestList(
                crate::model::ManifestList {
                    digest: "sha256:ml".to_string(),
                    schema_version: 2,
                    media_type: crate::model::media_type::MANIFEST_LIST.to_string(),
                },
            )))
            .await
            .unwrap()
            .id();
        assert!(store.set_tag_manifest_list(tag, list_id).await.is_err());
    }

    #[tokio::test]
    async fn relation_endpoints_must_have_the_right_kind() {
        let store = MemoryStore::new();
        let a = store.insert(ContentRecord::new(blob("sha256:a"))).await.unwrap().id();
        let b = store.insert(ContentRecord::new(blob("sha256:b"))).await.unwrap().id();
        assert!(store.add_manifest_layer(a, b).await.is_err());
    }
}
