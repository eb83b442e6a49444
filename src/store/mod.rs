//! Persistence for mirrored content
//!
//! Two stores back a sync: the artifact store keeps downloaded files under
//! content-addressed paths, and the content store keeps the canonical row
//! per content identity plus the relation tables between rows. A finished
//! sync is snapshotted into an immutable repository version.

pub mod artifact;
pub mod content;
pub mod version;

pub use artifact::ArtifactStore;
pub use content::{ContentId, ContentRecord, ContentStore, MemoryStore, SaveOutcome};
pub use version::{RepositoryVersion, VersionBuilder};
