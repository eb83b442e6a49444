//! Sync progress counters
//!
//! Counters are observability only; the pipeline never branches on them.
//! Stages share one `SyncCounters` and the runner reports the final
//! snapshot.

use std::sync::atomic::{AtomicU64, Ordering};

use crate::model::ContentKind;

#[derive(Debug, Default)]
pub struct SyncCounters {
    tags_listed: AtomicU64,
    tags: AtomicU64,
    manifest_lists: AtomicU64,
    manifests: AtomicU64,
    blobs: AtomicU64,
    deduplicated: AtomicU64,
    legacy_skipped: AtomicU64,
}

impl SyncCounters {
    pub fn add_tags_listed(&self, count: u64) {
        self.tags_listed.fetch_add(count, Ordering::Relaxed);
    }

    pub fn record_created(&self, kind: ContentKind) {
        let counter = match kind {
            ContentKind::Tag => &self.tags,
            ContentKind::ManifestList => &self.manifest_lists,
            ContentKind::Manifest => &self.manifests,
            ContentKind::Blob => &self.blobs,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_deduplicated(&self) {
        self.deduplicated.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_legacy_skip(&self) {
        self.legacy_skipped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> SyncReport {
        SyncReport {
            tags_listed: self.tags_listed.load(Ordering::Relaxed),
            tags: self.tags.load(Ordering::Relaxed),
            manifest_lists: self.manifest_lists.load(Ordering::Relaxed),
            manifests: self.manifests.load(Ordering::Relaxed),
            blobs: self.blobs.load(Ordering::Relaxed),
            deduplicated: self.deduplicated.load(Ordering::Relaxed),
            legacy_skipped: self.legacy_skipped.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time view of the counters, reported at the end of a sync.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncReport {
    pub tags_listed: u64,
    /// Newly created rows per kind; re-synced content lands in
    /// `deduplicated` instead.
    pub tags: u64,
    pub manifest_lists: u64,
    pub manifests: u64,
    pub blobs: u64,
    pub deduplicated: u64,
    pub legacy_skipped: u64,
}

impl SyncReport {
    pub fn created_total(&self) -> u64 {
        self.tags + self.manifest_lists + self.manifests + self.blobs
    }
}
