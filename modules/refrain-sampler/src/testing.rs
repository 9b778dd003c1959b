// Scripted CommentSource for tests.
//
// Serves a fixed corpus the way the upstream does: offset pages slice it newest
// first, cursor pages return what is older than the cursor. Every call is
// recorded, and failures can be queued per call kind.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use async_trait::async_trait;
use comment_api_client::{CommentPage, WireComment, WireUser};
use refrain_common::time::{mid_year_ms, year_of};

use crate::retry::FetchFailure;
use crate::traits::CommentSource;

/// One recorded upstream call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceCall {
    Total,
    Hot,
    Offset { offset: u32 },
    Cursor { cursor_ms: i64 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum FailKey {
    Total,
    Hot,
    Offset(u32),
    /// Any cursor call landing in this year.
    CursorYear(i32),
}

#[derive(Default)]
pub struct MockSource {
    total: Option<u64>,
    hot: Vec<WireComment>,
    /// Newest first.
    corpus: Vec<WireComment>,
    failures: Mutex<HashMap<FailKey, VecDeque<FetchFailure>>>,
    calls: Mutex<Vec<SourceCall>>,
}

impl MockSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Upstream total. Defaults to the corpus size.
    pub fn with_total(mut self, total: u64) -> Self {
        self.total = Some(total);
        self
    }

    pub fn with_hot(mut self, hot: Vec<WireComment>) -> Self {
        self.hot = hot;
        self
    }

    pub fn with_corpus(mut self, mut corpus: Vec<WireComment>) -> Self {
        corpus.sort_by(|a, b| b.time.cmp(&a.time));
        self.corpus = corpus;
        self
    }

    pub fn failing_total(self, failure: FetchFailure, times: usize) -> Self {
        self.queue(FailKey::Total, failure, times)
    }

    pub fn failing_hot(self, failure: FetchFailure, times: usize) -> Self {
        self.queue(FailKey::Hot, failure, times)
    }

    pub fn failing_offset(self, offset: u32, failure: FetchFailure, times: usize) -> Self {
        self.queue(FailKey::Offset(offset), failure, times)
    }

    pub fn failing_year(self, year: i32, failure: FetchFailure, times: usize) -> Self {
        self.queue(FailKey::CursorYear(year), failure, times)
    }

    fn queue(self, key: FailKey, failure: FetchFailure, times: usize) -> Self {
        {
            let mut failures = self.failures.lock().unwrap_or_else(|e| e.into_inner());
            let q = failures.entry(key).or_default();
            q.extend((0..times).map(|_| failure.clone()));
        }
        self
    }

    pub fn calls(&self) -> Vec<SourceCall> {
        self.calls.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Number of upstream calls made so far.
    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    fn record(&self, call: SourceCall, key: FailKey) -> Result<(), FetchFailure> {
        self.calls.lock().unwrap_or_else(|e| e.into_inner()).push(call);
        let mut failures = self.failures.lock().unwrap_or_else(|e| e.into_inner());
        match failures.get_mut(&key).and_then(|q| q.pop_front()) {
            Some(failure) => Err(failure),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl CommentSource for MockSource {
    async fn total_count(&self, _target_id: &str) -> Result<u64, FetchFailure> {
        self.record(SourceCall::Total, FailKey::Total)?;
        Ok(self.total.unwrap_or(self.corpus.len() as u64))
    }

    async fn hot(&self, _target_id: &str, limit: usize) -> Result<Vec<WireComment>, FetchFailure> {
        self.record(SourceCall::Hot, FailKey::Hot)?;
        Ok(self.hot.iter().take(limit).cloned().collect())
    }

    async fn offset_page(&self, _target_id: &str, offset: u32, limit: u32) -> Result<CommentPage, FetchFailure> {
        self.record(SourceCall::Offset { offset }, FailKey::Offset(offset))?;
        let start = (offset as usize).min(self.corpus.len());
        let end = (start + limit as usize).min(self.corpus.len());
        Ok(CommentPage {
            comments: self.corpus[start..end].to_vec(),
            total: Some(self.corpus.len() as u64),
            has_more: end < self.corpus.len(),
        })
    }

    async fn cursor_page(&self, _target_id: &str, cursor_ms: i64, page_size: u32) -> Result<CommentPage, FetchFailure> {
        let year = year_of(cursor_ms).unwrap_or_default();
        self.record(SourceCall::Cursor { cursor_ms }, FailKey::CursorYear(year))?;
        let older: Vec<WireComment> = self
            .corpus
            .iter()
            .filter(|c| c.time < cursor_ms)
            .take(page_size as usize + 1)
            .cloned()
            .collect();
        let has_more = older.len() > page_size as usize;
        Ok(CommentPage {
            comments: older.into_iter().take(page_size as usize).collect(),
            total: None,
            has_more,
        })
    }
}

// --- Fixtures ---

pub fn wire(id: &str, text: &str, likes: i64, time: i64) -> WireComment {
    WireComment {
        comment_id: id.to_string(),
        content: Some(text.to_string()),
        liked_count: likes,
        time,
        user: Some(WireUser {
            nickname: Some(format!("user-{id}")),
        }),
    }
}

/// `per_year` comments in every year of `years`, spread back from each year's midpoint.
/// Every tenth comment is high-engagement.
pub fn corpus_across_years(years: std::ops::RangeInclusive<i32>, per_year: usize) -> Vec<WireComment> {
    let mut out = Vec::new();
    for year in years {
        let mid = mid_year_ms(year);
        for i in 0..per_year {
            // Half before the midpoint, half after, one hour apart.
            let offset = (i as i64 - per_year as i64 / 2) * 3_600_000;
            let likes = if i % 10 == 0 { 1_500 } else { i as i64 };
            out.push(wire(&format!("{year}-{i}"), &format!("第{i}条 {year} 的评论"), likes, mid - offset));
        }
    }
    out
}
