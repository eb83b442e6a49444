//! Repository version snapshots
//!
//! A successful sync ends with one immutable version: the set of canonical
//! content ids that make up the repository at that point. A failed sync
//! never produces a version.

use std::collections::BTreeSet;

use uuid::Uuid;

use crate::store::content::ContentId;

#[derive(Debug, Clone)]
pub struct RepositoryVersion {
    pub id: Uuid,
    pub repository: String,
    /// Canonical content ids, deduplicated and sorted.
    pub content: Vec<ContentId>,
}

impl RepositoryVersion {
    pub fn len(&self) -> usize {
        self.content.len()
    }

    pub fn is_empty(&self) -> bool {
        self.content.is_empty()
    }
}

#[derive(Debug)]
pub struct VersionBuilder {
    repository: String,
    content: BTreeSet<ContentId>,
}

impl VersionBuilder {
    pub fn new(repository: impl Into<String>) -> Self {
        Self {
            repository: repository.into(),
            content: BTreeSet::new(),
        }
    }

    /// Associate a canonical content id with the version under
    /// construction. Repeated ids collapse to one entry.
    pub fn add(&mut self, id: ContentId) {
        self.content.insert(id);
    }

    pub fn build(self) -> RepositoryVersion {
        RepositoryVersion {
            id: Uuid::new_v4(),
            repository: self.repository,
            content: self.content.into_iter().collect(),
        }
    }
}
