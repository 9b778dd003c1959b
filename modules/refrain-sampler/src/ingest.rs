use comment_api_client::WireComment;
use refrain_common::{Comment, Tier};

/// Convert an upstream comment into the stored record. `None` when the upstream gave no id.
pub(crate) fn ingest(wire: WireComment, target_id: &str, tier: Tier) -> Option<Comment> {
    if wire.comment_id.is_empty() {
        return None;
    }
    let author = wire.nickname().map(str::to_string);
    Some(
        Comment::new(
            wire.comment_id,
            target_id,
            wire.content.unwrap_or_default(),
            wire.liked_count,
            Some(wire.time),
            tier,
        )
        .with_author(author),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn wire(id: &str, time: i64) -> WireComment {
        WireComment {
            comment_id: id.to_string(),
            content: None,
            liked_count: -3,
            time,
            user: None,
        }
    }

    #[test]
    fn missing_fields_get_safe_defaults() {
        let c = ingest(wire("9", 0), "song", Tier::Recent).unwrap();
        assert_eq!(c.text, "");
        assert_eq!(c.engagement, 0);
        assert_eq!(c.timestamp_ms, None);
        assert_eq!(c.target_id, "song");
    }

    #[test]
    fn empty_ids_are_dropped() {
        assert!(ingest(wire("", 5), "song", Tier::Hot).is_none());
    }
}
