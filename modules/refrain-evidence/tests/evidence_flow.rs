use std::sync::Arc;
use std::time::Duration;

use refrain_common::{DimensionId, SamplingLevel, TargetRecord};
use refrain_evidence::testing::FixedAnalyzer;
use refrain_evidence::{EvidenceLayers, KnowledgeCache, LayerConfig};
use refrain_sampler::testing::{corpus_across_years, wire, MockSource};
use refrain_sampler::{RetryPolicy, SamplerConfig, TieredSampler};
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

fn song() -> TargetRecord {
    TargetRecord {
        title: Some("Refrain".into()),
        artist: Some("Someone".into()),
        publish_year: Some(2018),
        ..TargetRecord::new("song")
    }
}

fn layers(store: Arc<MemoryStore>) -> EvidenceLayers {
    EvidenceLayers::new(
        store,
        Arc::new(FixedAnalyzer::new(0.5)),
        Arc::new(KnowledgeCache::builtin()),
        LayerConfig::builder().current_year(2025).build(),
    )
}

#[tokio::test]
async fn sampled_song_walks_every_layer() {
    let corpus = corpus_across_years(2018..=2025, 100);
    let hot: Vec<_> = corpus.iter().filter(|c| c.liked_count >= 1_000).take(15).cloned().collect();
    let source = Arc::new(MockSource::new().with_total(50_000).with_corpus(corpus).with_hot(hot));
    let store = Arc::new(MemoryStore::new().with_target(song()));
    let sampler = TieredSampler::new(source, store.clone(), quiet_config()).with_current_year(2025);
    let report = sampler.run("song", SamplingLevel::Standard).await.unwrap();
    let stored = store.count("song").await.unwrap();
    assert_eq!(stored, report.store.after);
    assert!(stored >= 100);

    let layers = layers(store.clone());

    // Layer 0
    let overview = layers.overview("song").await.unwrap().ready().expect("overview ready");
    assert_eq!(overview.stored, stored);
    assert_eq!(overview.api_total, Some(50_000));
    assert_eq!(overview.title.as_deref(), Some("Refrain"));
    assert!(overview.years_covered >= 6);
    assert_eq!(overview.year_distribution.values().sum::<usize>() as i64, stored);
    assert!(overview.next_options.iter().any(|o| o.call == "signals"));

    // Layer 1
    let view = layers.signals("song").await.unwrap().ready().expect("signals ready");
    assert_eq!(view.stored, stored);
    assert_eq!(view.sufficiency.len(), 6);
    let dims: Vec<DimensionId> = view.sufficiency.iter().map(|s| s.dimension).collect();
    assert_eq!(dims, DimensionId::ALL.to_vec());
    assert!(view.analyzed as i64 <= stored);

    // Layer 2
    let samples = layers.verification_samples("song").await.unwrap();
    assert!(!samples.anchors.most_liked.is_empty());
    assert!(samples.anchors.most_liked.len() <= 5);
    assert!(samples.anchors.most_liked.windows(2).all(|w| w[0].engagement >= w[1].engagement));
    assert!(samples.verification_tasks.iter().all(|t| !t.samples_key.is_empty()));

    // Layer 2.5
    let lookup = layers.keyword_lookup("song", "评论", 0, Some(10)).await.unwrap();
    assert_eq!(lookup.total_matches, stored);
    assert_eq!(lookup.returned, 10);
    assert!(lookup.comments.windows(2).all(|w| w[0].engagement >= w[1].engagement));

    let liked = layers.keyword_lookup("song", "评论", 1_000, None).await.unwrap();
    assert!(liked.total_matches > 0);
    assert!(liked.comments.iter().all(|c| c.engagement >= 1_000));

    // Layer 3
    let raw = layers.raw("song", Some(2019), None, Some(50)).await.unwrap();
    assert!(raw.returned > 0);
    assert!(raw.comments.iter().all(|c| c.date.as_deref().is_some_and(|d| d.starts_with("2019"))));
}

#[tokio::test]
async fn thin_song_is_blocked_until_sampled_further() {
    let corpus: Vec<_> = (0..40)
        .map(|i| wire(&format!("c{i}"), "好听", i, refrain_common::time::mid_year_ms(2024) - i * 60_000))
        .collect();
    let source = Arc::new(MockSource::new().with_corpus(corpus));
    let store = Arc::new(MemoryStore::new().with_target(song()));
    let sampler = TieredSampler::new(source, store.clone(), quiet_config()).with_current_year(2025);
    sampler.run("song", SamplingLevel::Quick).await.unwrap();
    assert_eq!(store.count("song").await.unwrap(), 40);

    let layers = layers(store);
    let overview = layers.overview("song").await.unwrap();
    assert!(overview.is_blocked());

    let signals = layers.signals("song").await.unwrap();
    assert!(signals.is_blocked());

    // Lower layers still answer.
    let raw = layers.raw("song", None, None, None).await.unwrap();
    assert_eq!(raw.returned, 20);
    let samples = layers.verification_samples("song").await.unwrap();
    assert!(!samples.anchors.is_empty());
}
