// Trait boundary between the sampler and the upstream comment API.

use async_trait::async_trait;
use comment_api_client::{ApiError, CommentApiClient, CommentPage, WireComment};

use crate::retry::FetchFailure;

// ---------------------------------------------------------------------------
// CommentSource
// ---------------------------------------------------------------------------

/// Upstream comment listing. Implementations make exactly one request per call
/// and classify failures; retry and pacing are the caller's concern.
#[async_trait]
pub trait CommentSource: Send + Sync {
    async fn total_count(&self, target_id: &str) -> Result<u64, FetchFailure>;

    async fn hot(&self, target_id: &str, limit: usize) -> Result<Vec<WireComment>, FetchFailure>;

    async fn offset_page(&self, target_id: &str, offset: u32, limit: u32) -> Result<CommentPage, FetchFailure>;

    /// Comments older than `cursor_ms`, newest first.
    async fn cursor_page(&self, target_id: &str, cursor_ms: i64, page_size: u32) -> Result<CommentPage, FetchFailure>;
}

impl From<ApiError> for FetchFailure {
    fn from(err: ApiError) -> Self {
        match err {
            ApiError::Parse(msg) => FetchFailure::Malformed(msg),
            e if e.is_retryable() => FetchFailure::Transient(e.to_string()),
            e => FetchFailure::Rejected(e.to_string()),
        }
    }
}

#[async_trait]
impl CommentSource for CommentApiClient {
    async fn total_count(&self, target_id: &str) -> Result<u64, FetchFailure> {
        Ok(CommentApiClient::total_count(self, target_id).await?)
    }

    async fn hot(&self, target_id: &str, limit: usize) -> Result<Vec<WireComment>, FetchFailure> {
        Ok(self.hot_comments(target_id, limit).await?)
    }

    async fn offset_page(&self, target_id: &str, offset: u32, limit: u32) -> Result<CommentPage, FetchFailure> {
        Ok(CommentApiClient::offset_page(self, target_id, offset, limit).await?)
    }

    async fn cursor_page(&self, target_id: &str, cursor_ms: i64, page_size: u32) -> Result<CommentPage, FetchFailure> {
        Ok(CommentApiClient::cursor_page(self, target_id, cursor_ms, page_size).await?)
    }
}
