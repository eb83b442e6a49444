//! Tag list stage
//!
//! First stage of the pipeline. Fetches the remote's tag list once and
//! emits one pending tag descriptor per name, each pointing at the
//! manifest endpoint for that tag. Listing failures are fatal; retry
//! belongs to the downloader, not here.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use crate::error::{MirrorError, Result};
use crate::model::schema::TagListDoc;
use crate::model::{ContentData, Tag, media_type};
use crate::registry::{DownloadRequest, Downloader, RepositoryUrls};
use crate::sync::descriptor::ContentDescriptor;
use crate::sync::pipeline::{StageReceiver, StageSender, SyncStage, send_or_abort};
use crate::sync::report::SyncCounters;

pub struct TagListStage {
    downloader: Arc<dyn Downloader>,
    urls: RepositoryUrls,
    counters: Arc<SyncCounters>,
}

impl TagListStage {
    pub fn new(
        downloader: Arc<dyn Downloader>,
        urls: RepositoryUrls,
        counters: Arc<SyncCounters>,
    ) -> Self {
        Self {
            downloader,
            urls,
            counters,
        }
    }

    fn pending_tag(&self, name: String) -> ContentDescriptor {
        let download = DownloadRequest::new(self.urls.manifest_url(&name))
            .with_header("Accept", media_type::v2_accept());
        ContentDescriptor::pending(ContentData::Tag(Tag { name }), download)
    }
}

#[async_trait]
impl SyncStage for TagListStage {
    fn name(&self) -> &'static str {
        "tag list"
    }

    async fn run(self: Box<Self>, _input: StageReceiver, output: StageSender) -> Result<()> {
        debug!(
            repository = self.urls.repository(),
            "fetching tag list for upstream repository"
        );
        let request = DownloadRequest::new(self.urls.tags_url());
        let listing = self.downloader.fetch(&request).await?;
        let raw = tokio::fs::read(&listing.path).await?;
        let _ = tokio::fs::remove_file(&listing.path).await;

        let doc: TagListDoc = serde_json::from_slice(&raw).map_err(|e| {
            MirrorError::Parse(format!(
                "tag list from {} is not valid: {}",
                request.url, e
            ))
        })?;

        debug!(count = doc.tags.len(), "tag list downloaded");
        self.counters.add_tags_listed(doc.tags.len() as u64);

        for name in doc.tags {
            send_or_abort(&output, self.pending_tag(name), "tag list").await?;
        }
        Ok(())
    }
}
