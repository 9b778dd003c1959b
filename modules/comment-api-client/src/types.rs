use serde::{Deserialize, Deserializer, Serialize};

// --- Wire comment ---

/// A single comment as the upstream API returns it.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct WireComment {
    #[serde(rename = "commentId", deserialize_with = "string_or_number")]
    pub comment_id: String,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(rename = "likedCount", default)]
    pub liked_count: i64,
    /// Milliseconds since the epoch. `0` means the upstream did not say.
    #[serde(default)]
    pub time: i64,
    #[serde(default)]
    pub user: Option<WireUser>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct WireUser {
    #[serde(default)]
    pub nickname: Option<String>,
}

impl WireComment {
    pub fn nickname(&self) -> Option<&str> {
        self.user
            .as_ref()
            .and_then(|u| u.nickname.as_deref())
            .filter(|n| !n.is_empty())
    }
}

// --- Listing envelopes ---

/// `GET /api/v1/resource/comments/{thread}` response.
#[derive(Debug, Deserialize)]
pub(crate) struct ListingResponse {
    pub code: i64,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub total: Option<u64>,
    #[serde(default)]
    pub more: Option<bool>,
    #[serde(default)]
    pub comments: Vec<WireComment>,
    #[serde(rename = "hotComments", default)]
    pub hot_comments: Vec<WireComment>,
}

/// `POST /api/v2/resource/comments` response.
#[derive(Debug, Deserialize)]
pub(crate) struct CursorResponse {
    pub code: i64,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub data: Option<CursorData>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct CursorData {
    #[serde(default)]
    pub comments: Vec<WireComment>,
    #[serde(rename = "hasMore", default)]
    pub has_more: bool,
    #[serde(rename = "totalCount", default)]
    pub total_count: Option<u64>,
}

/// One page of comments, whichever pagination style produced it.
#[derive(Debug, Clone, Default)]
pub struct CommentPage {
    pub comments: Vec<WireComment>,
    pub total: Option<u64>,
    pub has_more: bool,
}

fn string_or_number<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Id {
        Num(i64),
        Str(String),
    }

    Ok(match Id::deserialize(deserializer)? {
        Id::Num(n) => n.to_string(),
        Id::Str(s) => s,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numeric_and_string_ids_both_decode() {
        let a: WireComment =
            serde_json::from_str(r#"{"commentId": 123, "content": "hi", "likedCount": 4, "time": 99}"#)
                .unwrap();
        let b: WireComment = serde_json::from_str(r#"{"commentId": "abc"}"#).unwrap();
        assert_eq!(a.comment_id, "123");
        assert_eq!(a.liked_count, 4);
        assert_eq!(b.comment_id, "abc");
        assert_eq!(b.time, 0);
        assert!(b.content.is_none());
    }

    #[test]
    fn listing_envelope_decodes_hot_and_recent() {
        let raw = r#"{
            "code": 200,
            "total": 5230,
            "more": true,
            "hotComments": [{"commentId": 1, "content": "a", "likedCount": 10, "time": 1, "user": {"nickname": "x"}}],
            "comments": [{"commentId": 2, "content": "b", "likedCount": 0, "time": 2}]
        }"#;
        let resp: ListingResponse = serde_json::from_str(raw).unwrap();
        assert_eq!(resp.total, Some(5230));
        assert_eq!(resp.hot_comments[0].nickname(), Some("x"));
        assert_eq!(resp.comments[0].comment_id, "2");
    }

    #[test]
    fn empty_nickname_is_treated_as_absent() {
        let c: WireComment =
            serde_json::from_str(r#"{"commentId": 1, "user": {"nickname": ""}}"#).unwrap();
        assert_eq!(c.nickname(), None);
    }
}
