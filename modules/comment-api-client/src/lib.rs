pub mod error;
pub mod types;

pub use error::{ApiError, Result};
pub use types::{CommentPage, WireComment, WireUser};

use std::time::Duration;

use serde::de::DeserializeOwned;
use types::{CursorResponse, ListingResponse};

pub const DEFAULT_BASE_URL: &str = "https://music.163.com";

/// Thread prefix the upstream uses for song comment threads.
const SONG_THREAD_PREFIX: &str = "R_SO_4_";

/// Newest-first ordering for cursor listings.
const SORT_BY_TIME: &str = "3";

const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64)";

pub struct CommentApiClient {
    client: reqwest::Client,
    base_url: String,
    cookie: Option<String>,
}

impl CommentApiClient {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            cookie: None,
        })
    }

    pub fn with_cookie(mut self, cookie: Option<String>) -> Self {
        self.cookie = cookie.filter(|c| !c.trim().is_empty());
        self
    }

    /// Authoritative comment count for a song.
    pub async fn total_count(&self, song_id: &str) -> Result<u64> {
        let resp = self.listing(song_id, 0, 1).await?;
        total_of(&resp)
    }

    /// Curated "hot" comments. The upstream returns them alongside the first listing page.
    pub async fn hot_comments(&self, song_id: &str, limit: usize) -> Result<Vec<WireComment>> {
        let resp = self.listing(song_id, 0, 20).await?;
        let mut hot = resp.hot_comments;
        hot.truncate(limit);
        tracing::debug!(song_id, count = hot.len(), "Fetched hot comments");
        Ok(hot)
    }

    /// Offset-paged newest comments (`offset = page_index * limit`).
    pub async fn offset_page(&self, song_id: &str, offset: u32, limit: u32) -> Result<CommentPage> {
        let resp = self.listing(song_id, offset, limit).await?;
        Ok(CommentPage {
            has_more: resp.more.unwrap_or(!resp.comments.is_empty()),
            total: resp.total,
            comments: resp.comments,
        })
    }

    /// Cursor-paged comments older than `cursor_ms`.
    pub async fn cursor_page(&self, song_id: &str, cursor_ms: i64, page_size: u32) -> Result<CommentPage> {
        let url = format!("{}/api/v2/resource/comments", self.base_url);
        let thread = thread_id(song_id);
        let cursor = cursor_ms.to_string();
        let page_size = page_size.to_string();
        let form = [
            ("threadId", thread.as_str()),
            ("pageNo", "1"),
            ("pageSize", page_size.as_str()),
            ("cursor", cursor.as_str()),
            ("sortType", SORT_BY_TIME),
        ];

        let req = self.client.post(&url).form(&form);
        let resp: CursorResponse = self.send(req).await?;
        if resp.code != 200 {
            return Err(ApiError::Rejected {
                code: resp.code,
                message: resp.message.unwrap_or_default(),
            });
        }

        let data = resp.data.unwrap_or(types::CursorData {
            comments: Vec::new(),
            has_more: false,
            total_count: None,
        });
        Ok(CommentPage {
            comments: data.comments,
            total: data.total_count,
            has_more: data.has_more,
        })
    }

    async fn listing(&self, song_id: &str, offset: u32, limit: u32) -> Result<ListingResponse> {
        let url = format!(
            "{}/api/v1/resource/comments/{}?limit={}&offset={}",
            self.base_url,
            thread_id(song_id),
            limit,
            offset
        );
        let resp: ListingResponse = self.send(self.client.get(&url)).await?;
        if resp.code != 200 {
            return Err(ApiError::Rejected {
                code: resp.code,
                message: resp.message.unwrap_or_default(),
            });
        }
        Ok(resp)
    }

    async fn send<T: DeserializeOwned>(&self, req: reqwest::RequestBuilder) -> Result<T> {
        let req = match &self.cookie {
            Some(cookie) => req.header(reqwest::header::COOKIE, cookie),
            None => req,
        };
        let resp = req.send().await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(ApiError::Api {
                status: status.as_u16(),
                message: body,
            });
        }

        let body = resp.text().await?;
        Ok(serde_json::from_str(&body)?)
    }
}

fn thread_id(song_id: &str) -> String {
    format!("{SONG_THREAD_PREFIX}{song_id}")
}

/// A listing without `total` cannot size a sample; zero would read as an empty song.
fn total_of(resp: &ListingResponse) -> Result<u64> {
    resp.total
        .ok_or_else(|| ApiError::Parse("listing response carried no total".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_url_trailing_slash_is_trimmed() {
        let client = CommentApiClient::new("http://localhost:9000/", Duration::from_secs(1)).unwrap();
        assert_eq!(client.base_url, "http://localhost:9000");
    }

    #[test]
    fn blank_cookie_is_dropped() {
        let client = CommentApiClient::new(DEFAULT_BASE_URL, Duration::from_secs(1))
            .unwrap()
            .with_cookie(Some("   ".into()));
        assert!(client.cookie.is_none());
    }

    #[test]
    fn listing_without_total_is_a_parse_error() {
        let resp: ListingResponse = serde_json::from_str(r#"{"code": 200, "comments": []}"#).unwrap();
        let err = total_of(&resp).unwrap_err();
        assert!(matches!(err, ApiError::Parse(_)));
        assert!(!err.is_retryable());

        let resp: ListingResponse = serde_json::from_str(r#"{"code": 200, "total": 0}"#).unwrap();
        assert_eq!(total_of(&resp).unwrap(), 0);
    }

    #[test]
    fn song_threads_are_prefixed() {
        assert_eq!(thread_id("186016"), "R_SO_4_186016");
    }
}
