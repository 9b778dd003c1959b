// Stateful in-memory CommentStore for tests.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use async_trait::async_trait;

use refrain_common::{Comment, TargetRecord};

use crate::error::{Result, StoreError};
use crate::{CommentStore, InsertOutcome, KeywordMatches, ObserveOutcome, RawFilter};

/// Thread-safe via interior Mutex. Comments keep insertion order.
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

#[derive(Default)]
struct Inner {
    targets: HashMap<String, TargetRecord>,
    comments: Vec<Comment>,
    index: HashMap<String, usize>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder: register a target.
    pub fn with_target(self, target: TargetRecord) -> Self {
        {
            let mut inner = self.lock();
            inner.targets.insert(target.id.clone(), target);
        }
        self
    }

    /// Builder: seed comments as if a previous run had stored them.
    pub fn with_comments(self, comments: Vec<Comment>) -> Self {
        {
            let mut inner = self.lock();
            for c in comments {
                if !inner.index.contains_key(&c.id) {
                    let pos = inner.comments.len();
                    inner.index.insert(c.id.clone(), pos);
                    inner.comments.push(c);
                }
            }
        }
        self
    }

    /// Every stored comment, soft-deleted ones included.
    pub fn snapshot(&self) -> Vec<Comment> {
        self.lock().comments.clone()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        // A poisoned lock only means another test thread panicked; the data is still usable.
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn live<'a>(inner: &'a Inner, target_id: &'a str) -> impl Iterator<Item = &'a Comment> + 'a {
        inner
            .comments
            .iter()
            .filter(move |c| c.target_id == target_id && !c.is_deleted())
    }
}

fn by_engagement_desc(mut v: Vec<Comment>, limit: usize) -> Vec<Comment> {
    // Stable sort keeps insertion order among ties.
    v.sort_by(|a, b| b.engagement.cmp(&a.engagement));
    v.truncate(limit);
    v
}

#[async_trait]
impl CommentStore for MemoryStore {
    async fn target(&self, target_id: &str) -> Result<Option<TargetRecord>> {
        Ok(self.lock().targets.get(target_id).cloned())
    }

    async fn upsert_target(&self, target: &TargetRecord) -> Result<()> {
        let mut inner = self.lock();
        match inner.targets.get_mut(&target.id) {
            Some(existing) => {
                if target.title.is_some() {
                    existing.title = target.title.clone();
                }
                if target.artist.is_some() {
                    existing.artist = target.artist.clone();
                }
                if target.publish_year.is_some() {
                    existing.publish_year = target.publish_year;
                }
                if target.api_total.is_some() {
                    existing.api_total = target.api_total;
                }
                existing.updated_at_ms = target.updated_at_ms;
            }
            None => {
                inner.targets.insert(target.id.clone(), target.clone());
            }
        }
        Ok(())
    }

    async fn existing_ids(&self, target_id: &str) -> Result<HashSet<String>> {
        Ok(self
            .lock()
            .comments
            .iter()
            .filter(|c| c.target_id == target_id)
            .map(|c| c.id.clone())
            .collect())
    }

    async fn count(&self, target_id: &str) -> Result<i64> {
        let inner = self.lock();
        Ok(Self::live(&inner, target_id).count() as i64)
    }

    async fn insert_new(&self, comments: &[Comment]) -> Result<InsertOutcome> {
        let mut inner = self.lock();
        let mut outcome = InsertOutcome::default();
        for c in comments {
            if inner.index.contains_key(&c.id) {
                outcome.skipped += 1;
                continue;
            }
            let pos = inner.comments.len();
            inner.index.insert(c.id.clone(), pos);
            inner.comments.push(c.clone());
            outcome.inserted += 1;
        }
        Ok(outcome)
    }

    async fn observe(&self, comments: &[Comment], seen_at_ms: i64) -> Result<ObserveOutcome> {
        let mut inner = self.lock();
        let mut outcome = ObserveOutcome::default();
        for c in comments {
            match inner.index.get(&c.id).copied() {
                Some(pos) => {
                    let existing = &mut inner.comments[pos];
                    existing.engagement = c.engagement;
                    existing.last_seen_at_ms = Some(seen_at_ms);
                    existing.deleted_at_ms = None;
                    outcome.refreshed += 1;
                }
                None => {
                    let mut fresh = c.clone();
                    fresh.last_seen_at_ms = Some(seen_at_ms);
                    let pos = inner.comments.len();
                    inner.index.insert(fresh.id.clone(), pos);
                    inner.comments.push(fresh);
                    outcome.inserted += 1;
                }
            }
        }
        Ok(outcome)
    }

    async fn comments(&self, target_id: &str, limit: usize) -> Result<Vec<Comment>> {
        let inner = self.lock();
        Ok(Self::live(&inner, target_id).take(limit).cloned().collect())
    }

    async fn search(
        &self,
        target_id: &str,
        keyword: &str,
        min_engagement: i64,
        limit: usize,
    ) -> Result<KeywordMatches> {
        let inner = self.lock();
        let matches: Vec<Comment> = Self::live(&inner, target_id)
            .filter(|c| c.text.contains(keyword) && c.engagement >= min_engagement)
            .cloned()
            .collect();
        Ok(KeywordMatches {
            total: matches.len() as i64,
            comments: by_engagement_desc(matches, limit),
        })
    }

    async fn raw(&self, target_id: &str, filter: RawFilter) -> Result<Vec<Comment>> {
        let inner = self.lock();
        let matches: Vec<Comment> = Self::live(&inner, target_id)
            .filter(|c| c.engagement >= filter.min_engagement)
            .filter(|c| filter.year.is_none() || c.year() == filter.year)
            .cloned()
            .collect();
        Ok(by_engagement_desc(matches, filter.limit))
    }

    async fn mark_missing(&self, target_id: &str, seen: &HashSet<String>, at_ms: i64) -> Result<u64> {
        let mut inner = self.lock();
        if !inner.targets.contains_key(target_id) {
            return Err(StoreError::NotFound(target_id.to_string()));
        }
        let mut marked = 0;
        for c in inner.comments.iter_mut() {
            if c.target_id == target_id && !c.is_deleted() && !seen.contains(&c.id) {
                c.deleted_at_ms = Some(at_ms);
                marked += 1;
            }
        }
        Ok(marked)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use refrain_common::Tier;

    fn comment(id: &str, likes: i64) -> Comment {
        Comment::new(id, "song", format!("comment {id}"), likes, Some(1_600_000_000_000), Tier::Recent)
    }

    #[tokio::test]
    async fn insert_new_skips_existing_ids_without_touching_them() {
        let store = MemoryStore::new().with_target(TargetRecord::new("song"));
        store.insert_new(&[comment("a", 1)]).await.unwrap();

        let mut changed = comment("a", 999);
        changed.text = "rewritten".into();
        let outcome = store.insert_new(&[changed, comment("b", 2)]).await.unwrap();

        assert_eq!(outcome, InsertOutcome { inserted: 1, skipped: 1 });
        let all = store.snapshot();
        assert_eq!(all[0].text, "comment a");
        assert_eq!(all[0].engagement, 1);
    }

    #[tokio::test]
    async fn observe_refreshes_engagement_and_revives_deleted() {
        let store = MemoryStore::new().with_target(TargetRecord::new("song"));
        store.insert_new(&[comment("a", 1), comment("b", 1)]).await.unwrap();
        let seen: HashSet<String> = ["a".to_string()].into_iter().collect();
        assert_eq!(store.mark_missing("song", &seen, 10).await.unwrap(), 1);
        assert_eq!(store.count("song").await.unwrap(), 1);

        let outcome = store.observe(&[comment("b", 50)], 20).await.unwrap();
        assert_eq!(outcome, ObserveOutcome { inserted: 0, refreshed: 1 });
        let b = store.snapshot().into_iter().find(|c| c.id == "b").unwrap();
        assert_eq!(b.engagement, 50);
        assert_eq!(b.deleted_at_ms, None);
        assert_eq!(b.last_seen_at_ms, Some(20));
    }

    #[tokio::test]
    async fn deleted_comments_stay_in_existing_ids() {
        let store = MemoryStore::new().with_target(TargetRecord::new("song"));
        store.insert_new(&[comment("a", 1)]).await.unwrap();
        store.mark_missing("song", &HashSet::new(), 5).await.unwrap();

        assert_eq!(store.count("song").await.unwrap(), 0);
        assert!(store.existing_ids("song").await.unwrap().contains("a"));
        assert!(store.comments("song", 10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn search_counts_all_matches_but_pages_by_engagement() {
        let store = MemoryStore::new().with_target(TargetRecord::new("song"));
        store
            .insert_new(&[comment("a", 5), comment("b", 50), comment("c", 500)])
            .await
            .unwrap();

        let found = store.search("song", "comment", 10, 1).await.unwrap();
        assert_eq!(found.total, 2);
        assert_eq!(found.comments.len(), 1);
        assert_eq!(found.comments[0].id, "c");
    }

    #[tokio::test]
    async fn mark_missing_on_unknown_target_is_not_found() {
        let store = MemoryStore::new();
        let err = store.mark_missing("nope", &HashSet::new(), 1).await.unwrap_err();
        assert!(matches!(err, StoreError::NotFound(_)));
    }
}
