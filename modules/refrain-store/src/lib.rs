//! Persistence for targets and their comments.
//!
//! Write discipline is insert-if-absent: content is immutable once stored. Only
//! engagement, `last_seen_at_ms` and the soft-deletion mark change afterwards,
//! and only through [`CommentStore::observe`] and [`CommentStore::mark_missing`].

pub mod error;
mod postgres;
#[cfg(any(test, feature = "test-support"))]
pub mod memory;

pub use error::{Result, StoreError};
pub use postgres::PgCommentStore;
#[cfg(any(test, feature = "test-support"))]
pub use memory::MemoryStore;

use std::collections::HashSet;

use async_trait::async_trait;
use serde::Serialize;

use refrain_common::{Comment, TargetRecord};

/// Counts from an insert-or-skip batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct InsertOutcome {
    pub inserted: u64,
    pub skipped: u64,
}

/// Counts from a refresh batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ObserveOutcome {
    pub inserted: u64,
    pub refreshed: u64,
}

/// Filters for a raw record read. Results are ordered by engagement, highest first.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RawFilter {
    /// UTC calendar year.
    pub year: Option<i32>,
    pub min_engagement: i64,
    pub limit: usize,
}

/// Result of a keyword substring search.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct KeywordMatches {
    /// Every matching comment, not just the returned page.
    pub total: i64,
    pub comments: Vec<Comment>,
}

// ---------------------------------------------------------------------------
// CommentStore
// ---------------------------------------------------------------------------

/// All reads skip soft-deleted comments except [`CommentStore::existing_ids`],
/// which must know every id ever stored so that sampling never re-fetches them.
#[async_trait]
pub trait CommentStore: Send + Sync {
    async fn target(&self, target_id: &str) -> Result<Option<TargetRecord>>;

    /// Insert, or overwrite metadata of, a target.
    async fn upsert_target(&self, target: &TargetRecord) -> Result<()>;

    /// Every stored id for a target, soft-deleted ones included.
    async fn existing_ids(&self, target_id: &str) -> Result<HashSet<String>>;

    /// Number of non-deleted comments for a target.
    async fn count(&self, target_id: &str) -> Result<i64>;

    /// Insert comments whose id is absent; leave present ones untouched.
    async fn insert_new(&self, comments: &[Comment]) -> Result<InsertOutcome>;

    /// Insert absent comments; for present ones refresh engagement and
    /// `last_seen_at_ms` and clear any soft-deletion mark.
    async fn observe(&self, comments: &[Comment], seen_at_ms: i64) -> Result<ObserveOutcome>;

    /// Up to `limit` non-deleted comments in insertion order.
    async fn comments(&self, target_id: &str, limit: usize) -> Result<Vec<Comment>>;

    /// Case-sensitive substring search over comment text.
    async fn search(
        &self,
        target_id: &str,
        keyword: &str,
        min_engagement: i64,
        limit: usize,
    ) -> Result<KeywordMatches>;

    async fn raw(&self, target_id: &str, filter: RawFilter) -> Result<Vec<Comment>>;

    /// Soft-delete every non-deleted comment of the target whose id is not in `seen`.
    /// Returns how many were marked.
    async fn mark_missing(&self, target_id: &str, seen: &HashSet<String>, at_ms: i64) -> Result<u64>;
}
