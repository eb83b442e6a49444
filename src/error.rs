//! Error handling for the registry mirror.
//!
//! Every fatal condition in the sync pipeline maps onto one variant here.
//! Skipped legacy content and duplicate-identity write races are not errors
//! and never surface through this type.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, MirrorError>;

#[derive(Error, Debug)]
pub enum MirrorError {
    /// The remote registry rejected or failed a request.
    #[error("Registry error: {0}")]
    Registry(String),

    /// A remote document was malformed or missing a required field.
    #[error("Parse error: {0}")]
    Parse(String),

    /// A manifest declared a media type this mirror does not understand.
    #[error("Unsupported media type: {0}")]
    UnsupportedMediaType(String),

    /// A pipeline invariant was broken, e.g. a manifest list discovered
    /// outside of a tag, or an unexpected content kind at a stage boundary.
    #[error("Pipeline error: {0}")]
    Pipeline(String),

    /// A stage could not hand off downstream because the pipeline was
    /// already torn down by another stage's failure.
    #[error("Pipeline stage '{0}' aborted: downstream closed")]
    StageAborted(&'static str),

    /// Content or relation persistence failed.
    #[error("Store error: {0}")]
    Store(String),

    /// Downloaded bytes did not hash to the digest the URL named.
    #[error("Digest mismatch for {url}: expected {expected}, computed {computed}")]
    DigestMismatch {
        url: String,
        expected: String,
        computed: String,
    },

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
