use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use refrain_common::time::mid_year_ms;
use refrain_common::{Comment, RefrainError, SamplingLevel, TargetRecord, Tier};
use refrain_sampler::testing::{corpus_across_years, wire, MockSource, SourceCall};
use refrain_sampler::{FetchFailure, RetryPolicy, SamplerConfig, Strategy, TieredSampler};
use refrain_store::{CommentStore, MemoryStore};

fn quiet_config() -> SamplerConfig {
    SamplerConfig::builder()
        .request_delay(Duration::ZERO)
        .cursor_delay(Duration::ZERO)
        .retry(RetryPolicy {
            max_attempts: 2,
            base_delay: Duration::from_millis(1),
            timeout: Duration::from_secs(1),
        })
        .build()
}

fn song(publish_year: i32) -> TargetRecord {
    TargetRecord {
        publish_year: Some(publish_year),
        ..TargetRecord::new("song")
    }
}

fn cursor_calls(source: &MockSource) -> usize {
    source
        .calls()
        .iter()
        .filter(|c| matches!(c, SourceCall::Cursor { .. }))
        .count()
}

#[tokio::test]
async fn eight_year_song_is_sampled_across_tiers_without_duplicates() {
    let corpus = corpus_across_years(2018..=2025, 100);
    let hot: Vec<_> = corpus.iter().filter(|c| c.liked_count >= 1_000).take(15).cloned().collect();
    let source = Arc::new(MockSource::new().with_total(50_000).with_corpus(corpus).with_hot(hot));
    let store = Arc::new(MemoryStore::new().with_target(song(2018)));
    let sampler = TieredSampler::new(source.clone(), store.clone(), quiet_config()).with_current_year(2025);

    let report = sampler.run("song", SamplingLevel::Standard).await.unwrap();

    assert_eq!(report.strategy, Some(Strategy::Normal));
    assert_eq!(report.fetched.hot, 15);
    assert_eq!(report.fetched.recent, 175);
    assert!(report.fetched.yearly > 0);
    assert!(report.failures.is_empty());
    assert!(!report.skipped_existing);
    assert_eq!(report.coverage.years_span, 8);
    for year in 2018..=2023 {
        assert!(report.coverage.year_distribution.contains_key(&year), "missing {year}");
    }

    // Fetched-this-run and stored-now are reported separately but agree here.
    assert_eq!(report.store.before, 0);
    assert_eq!(report.store.added as usize, report.fetched.total);
    assert_eq!(report.store.after, report.fetched.total as i64);

    let stored = store.snapshot();
    let ids: HashSet<&str> = stored.iter().map(|c| c.id.as_str()).collect();
    assert_eq!(ids.len(), stored.len());
    let hot_ids = stored.iter().filter(|c| c.tier == Tier::Hot).count();
    assert_eq!(hot_ids, 15);

    let record = store.target("song").await.unwrap().unwrap();
    assert_eq!(record.api_total, Some(50_000));
}

#[tokio::test]
async fn small_corpus_takes_everything_and_skips_history() {
    let corpus: Vec<_> = (0..120)
        .map(|i| wire(&format!("c{i}"), "好听", i, mid_year_ms(2019) - i * 60_000))
        .collect();
    let hot = corpus.iter().take(15).cloned().collect();
    let source = Arc::new(MockSource::new().with_corpus(corpus).with_hot(hot));
    let store = Arc::new(MemoryStore::new().with_target(song(2015)));
    let sampler = TieredSampler::new(source.clone(), store.clone(), quiet_config()).with_current_year(2025);

    let report = sampler.run("song", SamplingLevel::Quick).await.unwrap();

    assert_eq!(report.strategy, Some(Strategy::Cold));
    assert_eq!(report.fetched.total, 120);
    assert_eq!(report.store.after, 120);
    assert_eq!(cursor_calls(&source), 0);
}

#[tokio::test]
async fn young_song_uses_only_the_recent_tier() {
    let corpus = corpus_across_years(2025..=2025, 400);
    let source = Arc::new(MockSource::new().with_total(400).with_corpus(corpus));
    let store = Arc::new(MemoryStore::new().with_target(song(2025)));
    let sampler = TieredSampler::new(source.clone(), store, quiet_config()).with_current_year(2025);

    let report = sampler.run("song", SamplingLevel::Quick).await.unwrap();

    let plan = report.plan.unwrap();
    assert_eq!(plan.strategy, Strategy::New);
    assert_eq!(plan.per_year_count, 0);
    assert_eq!(plan.recent_count, 185);
    assert_eq!(report.fetched.recent, 185);
    assert_eq!(cursor_calls(&source), 0);
    assert!(report.guidance.temporal_note.starts_with("new song"));
}

#[tokio::test]
async fn satisfied_store_makes_no_upstream_calls() {
    let existing: Vec<Comment> = (0..250)
        .map(|i| {
            let year = 2016 + (i % 5) as i32;
            Comment::new(format!("s{i}"), "song", "旧评论", if i < 3 { 2_000 } else { 1 }, Some(mid_year_ms(year)), Tier::Recent)
        })
        .collect();
    let source = Arc::new(MockSource::new().with_total(9_000));
    let store = Arc::new(MemoryStore::new().with_target(song(2016)).with_comments(existing));
    let sampler = TieredSampler::new(source.clone(), store, quiet_config()).with_current_year(2025);

    let report = sampler.run("song", SamplingLevel::Quick).await.unwrap();

    assert_eq!(source.call_count(), 0);
    assert!(report.skipped_existing);
    assert_eq!(report.store.before, 250);
    assert_eq!(report.store.after, 250);
    assert_eq!(report.store.added, 0);
    assert_eq!(report.fetched.total, 0);
    assert_eq!(report.coverage.years_span, 5);
    assert_eq!(report.coverage.years_sampled, 5);
    assert_eq!(report.high_engagement_in_run, 3);
}

#[tokio::test]
async fn failed_pages_are_recorded_and_other_tiers_continue() {
    let corpus = corpus_across_years(2018..=2025, 100);
    let source = Arc::new(
        MockSource::new()
            .with_total(50_000)
            .with_corpus(corpus)
            .failing_offset(20, FetchFailure::Transient("503".into()), 10)
            .failing_year(2020, FetchFailure::Rejected("code -460".into()), 1),
    );
    let store = Arc::new(MemoryStore::new().with_target(song(2018)));
    let sampler = TieredSampler::new(source.clone(), store, quiet_config()).with_current_year(2025);

    let report = sampler.run("song", SamplingLevel::Standard).await.unwrap();

    // Recent tier stopped after its first page; 2020 was skipped; the rest ran.
    assert_eq!(report.fetched.recent, 20);
    assert_eq!(report.failures.len(), 2);
    assert!(report.failures.iter().any(|f| f.tier == Tier::Recent && f.page == 1));
    assert!(report
        .failures
        .iter()
        .any(|f| f.tier == Tier::Yearly && f.year == Some(2020) && matches!(f.reason, FetchFailure::Rejected(_))));
    assert!(!report.coverage.year_distribution.contains_key(&2020));
    assert!(report.coverage.year_distribution.contains_key(&2019));
}

#[tokio::test]
async fn malformed_hot_payload_aborts_the_run() {
    let source = Arc::new(
        MockSource::new()
            .with_total(5_000)
            .failing_hot(FetchFailure::Malformed("unexpected EOF".into()), 1),
    );
    let store = Arc::new(MemoryStore::new().with_target(song(2020)));
    let sampler = TieredSampler::new(source, store.clone(), quiet_config()).with_current_year(2025);

    let err = sampler.run("song", SamplingLevel::Quick).await.unwrap_err();
    assert!(matches!(err, RefrainError::Upstream(_)));
    assert_eq!(store.count("song").await.unwrap(), 0);
}

#[tokio::test]
async fn refresh_soft_deletes_comments_missing_upstream() {
    let ts = mid_year_ms(2021);
    let stored = vec![
        Comment::new("a", "song", "a", 1, Some(ts), Tier::Recent),
        Comment::new("b", "song", "b", 1, Some(ts), Tier::Yearly),
        Comment::new("gone", "song", "gone", 1, Some(ts), Tier::Hot),
    ];
    let upstream = vec![wire("a", "a", 40, ts), wire("b", "b", 2, ts - 1), wire("d", "d", 0, ts - 2)];
    let source = Arc::new(MockSource::new().with_corpus(upstream));
    let store = Arc::new(MemoryStore::new().with_target(song(2020)).with_comments(stored));
    let sampler = TieredSampler::new(source, store.clone(), quiet_config());

    let report = sampler.refresh("song").await.unwrap();

    assert!(report.complete);
    assert_eq!(report.pages, 1);
    assert_eq!(report.inserted, 1);
    assert_eq!(report.refreshed, 2);
    assert_eq!(report.marked_deleted, 1);
    assert_eq!(store.count("song").await.unwrap(), 3);

    let snapshot = store.snapshot();
    let gone = snapshot.iter().find(|c| c.id == "gone").unwrap();
    assert!(gone.is_deleted());
    let a = snapshot.iter().find(|c| c.id == "a").unwrap();
    assert_eq!(a.engagement, 40);
    assert_eq!(a.tier, Tier::Recent);
}

#[tokio::test]
async fn interrupted_refresh_never_marks_deletions() {
    let ts = mid_year_ms(2021);
    let upstream: Vec<_> = (0..30).map(|i| wire(&format!("u{i}"), "x", 0, ts - i)).collect();
    let stored = vec![Comment::new("old", "song", "old", 1, Some(ts), Tier::Recent)];
    let source = Arc::new(
        MockSource::new()
            .with_corpus(upstream)
            .failing_offset(20, FetchFailure::Transient("timeout".into()), 100),
    );
    let store = Arc::new(MemoryStore::new().with_target(song(2020)).with_comments(stored));
    let sampler = TieredSampler::new(source, store.clone(), quiet_config());

    let report = sampler.refresh("song").await.unwrap();

    assert!(!report.complete);
    assert_eq!(report.pages, 1);
    assert_eq!(report.marked_deleted, 0);
    assert_eq!(store.count("song").await.unwrap(), 21);
}

#[tokio::test]
async fn hot_comments_repeated_in_the_recent_listing_stay_hot() {
    let corpus = corpus_across_years(2025..=2025, 400);
    let hot: Vec<_> = corpus.iter().take(15).cloned().collect();
    let hot_ids: HashSet<String> = hot.iter().map(|c| c.comment_id.clone()).collect();
    let source = Arc::new(MockSource::new().with_total(400).with_corpus(corpus).with_hot(hot));
    let store = Arc::new(MemoryStore::new().with_target(song(2025)));
    let sampler = TieredSampler::new(source.clone(), store.clone(), quiet_config()).with_current_year(2025);

    let report = sampler.run("song", SamplingLevel::Quick).await.unwrap();

    assert_eq!(report.strategy, Some(Strategy::New));
    assert_eq!(report.fetched.hot, 15);
    assert_eq!(report.fetched.recent, 185);

    // The first recent page was entirely hot comments; the tier paged past them.
    let first_offsets: Vec<SourceCall> = source
        .calls()
        .into_iter()
        .filter(|c| matches!(c, SourceCall::Offset { .. }))
        .take(2)
        .collect();
    assert_eq!(first_offsets, vec![SourceCall::Offset { offset: 0 }, SourceCall::Offset { offset: 20 }]);

    let stored = store.snapshot();
    let ids: HashSet<&str> = stored.iter().map(|c| c.id.as_str()).collect();
    assert_eq!(ids.len(), stored.len());
    assert_eq!(store.count("song").await.unwrap(), ids.len() as i64);
    assert_eq!(ids.len(), 200);

    for id in &hot_ids {
        let copies: Vec<&Comment> = stored.iter().filter(|c| &c.id == id).collect();
        assert_eq!(copies.len(), 1, "{id} stored more than once");
        assert_eq!(copies[0].tier, Tier::Hot, "{id} lost its hot tier");
    }
    let recent = stored.iter().filter(|c| c.tier == Tier::Recent).count();
    assert_eq!(recent, 185);
}
