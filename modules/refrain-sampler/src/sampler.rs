use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tracing::{debug, info, warn};
use typed_builder::TypedBuilder;
use uuid::Uuid;

use refrain_common::time::{self, mid_year_ms, year_of};
use refrain_common::{
    validate_target_id, Comment, Result, SamplingLevel, TargetRecord, Tier, PAGE_SIZE, RECENT_OFFSET_CEILING,
};
use refrain_store::CommentStore;

use crate::guidance::{guidance, SamplingGuidance};
use crate::ingest::ingest;
use crate::pacing::Pacer;
use crate::plan::{years_span, SamplingPlan, Strategy};
use crate::probe::SourceProbe;
use crate::retry::{FetchFailure, PageOutcome, RetryPolicy};
use crate::traits::CommentSource;

/// Tunables for sampling and refresh runs.
#[derive(Debug, Clone, TypedBuilder)]
pub struct SamplerConfig {
    /// Pause after each recent-tier or refresh request.
    #[builder(default = Duration::from_millis(300))]
    pub request_delay: Duration,
    /// Pause after each historical cursor request.
    #[builder(default = Duration::from_millis(500))]
    pub cursor_delay: Duration,
    #[builder(default)]
    pub retry: RetryPolicy,
    /// Seeds pacing jitter. Without a seed delays are exact.
    #[builder(default, setter(strip_option))]
    pub seed: Option<u64>,
    #[builder(default = 8)]
    pub max_pages_per_year: u32,
    #[builder(default = RECENT_OFFSET_CEILING)]
    pub recent_offset_ceiling: u32,
    #[builder(default = 20_000)]
    pub refresh_max_pages: u32,
    /// Consecutive page errors after which a refresh walk gives up.
    #[builder(default = 5)]
    pub refresh_error_breaker: u32,
    #[builder(default = Duration::from_secs(2 * 60 * 60))]
    pub refresh_max_runtime: Duration,
}

impl Default for SamplerConfig {
    fn default() -> Self {
        Self::builder().build()
    }
}

// --- Report ---

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TierCounts {
    pub hot: usize,
    pub recent: usize,
    pub yearly: usize,
    pub total: usize,
}

/// Store totals around the run. `after` is what sufficiency checks should use.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StoreTotals {
    pub before: i64,
    pub after: i64,
    pub added: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Coverage {
    pub publish_year: i32,
    pub years_span: i32,
    pub years_sampled: usize,
    pub year_distribution: BTreeMap<i32, usize>,
}

/// A page that was given up on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TierFailure {
    pub tier: Tier,
    pub page: u32,
    pub year: Option<i32>,
    pub reason: FetchFailure,
}

#[derive(Debug, Clone, Serialize)]
pub struct SampleReport {
    pub run_id: Uuid,
    pub target_id: String,
    pub level: SamplingLevel,
    pub target: i64,
    pub api_total: Option<u64>,
    /// `None` when the store already satisfied the level and nothing was planned.
    pub strategy: Option<Strategy>,
    pub plan: Option<SamplingPlan>,
    pub fetched: TierCounts,
    pub store: StoreTotals,
    pub coverage: Coverage,
    pub high_engagement_in_run: usize,
    /// Store total over the upstream total.
    pub sample_rate: Option<f64>,
    pub failures: Vec<TierFailure>,
    pub skipped_existing: bool,
    pub guidance: SamplingGuidance,
}

/// Comments gathered during one run, deduplicated against the store and each other.
struct Collected {
    seen: HashSet<String>,
    comments: Vec<Comment>,
    failures: Vec<TierFailure>,
    counts: TierCounts,
    year_distribution: BTreeMap<i32, usize>,
}

impl Collected {
    fn new(seen: HashSet<String>) -> Self {
        Self {
            seen,
            comments: Vec::new(),
            failures: Vec::new(),
            counts: TierCounts::default(),
            year_distribution: BTreeMap::new(),
        }
    }

    /// Keep `comment` unless its id was already seen.
    fn accept(&mut self, comment: Comment) -> bool {
        if !self.seen.insert(comment.id.clone()) {
            return false;
        }
        match comment.tier {
            Tier::Hot => self.counts.hot += 1,
            Tier::Recent => self.counts.recent += 1,
            Tier::Yearly => self.counts.yearly += 1,
        }
        self.counts.total += 1;
        if let Some(year) = comment.year() {
            *self.year_distribution.entry(year).or_insert(0) += 1;
        }
        self.comments.push(comment);
        true
    }

    fn abandon(&mut self, tier: Tier, page: u32, year: Option<i32>, reason: FetchFailure) {
        warn!(tier = %tier, page, year, error = %reason, "Abandoned page");
        self.failures.push(TierFailure { tier, page, year, reason });
    }
}

// ---------------------------------------------------------------------------
// TieredSampler
// ---------------------------------------------------------------------------

/// Fetches a deduplicated comment sample across the hot, recent and yearly
/// tiers and persists whatever the store does not already hold.
///
/// Every request is strictly sequential and followed by a pacing delay.
pub struct TieredSampler {
    pub(crate) source: Arc<dyn CommentSource>,
    pub(crate) store: Arc<dyn CommentStore>,
    pub(crate) config: SamplerConfig,
    pub(crate) pacer: Pacer,
    cursor_pacer: Pacer,
    probe: SourceProbe,
    current_year: Option<i32>,
}

impl TieredSampler {
    pub fn new(source: Arc<dyn CommentSource>, store: Arc<dyn CommentStore>, config: SamplerConfig) -> Self {
        let pacer = Pacer::new(config.request_delay, config.seed);
        let cursor_pacer = Pacer::new(config.cursor_delay, config.seed.map(|s| s.wrapping_add(1)));
        let probe = SourceProbe::new(source.clone(), store.clone(), config.retry);
        Self {
            source,
            store,
            config,
            pacer,
            cursor_pacer,
            probe,
            current_year: None,
        }
    }

    /// Pin the calendar year used for plan computation.
    pub fn with_current_year(mut self, year: i32) -> Self {
        self.current_year = Some(year);
        self
    }

    fn current_year(&self) -> i32 {
        self.current_year.unwrap_or_else(time::current_year)
    }

    /// Authoritative upstream total for a target. Stored on the target record.
    pub async fn probe(&self, target_id: &str) -> Result<u64> {
        validate_target_id(target_id)?;
        self.probe.total(target_id, &self.pacer).await
    }

    /// Probe, then sample. When the store already holds the level's target the
    /// probe is skipped too, so nothing goes upstream.
    pub async fn run(&self, target_id: &str, level: SamplingLevel) -> Result<SampleReport> {
        validate_target_id(target_id)?;
        let before = self.store.count(target_id).await?;
        if before >= level.target() {
            let record = self.target_record(target_id).await?;
            return self.report_from_store(&record, level, before).await;
        }
        let api_total = self.probe(target_id).await?;
        self.sample(target_id, level, api_total).await
    }

    /// Fetch the tiers planned for `level` and persist the new comments.
    pub async fn sample(&self, target_id: &str, level: SamplingLevel, api_total: u64) -> Result<SampleReport> {
        validate_target_id(target_id)?;
        let record = self.target_record(target_id).await?;

        let before = self.store.count(target_id).await?;
        if before >= level.target() {
            info!(target_id, stored = before, level = %level, "Store already satisfies level, skipping fetch");
            return self.report_from_store(&record, level, before).await;
        }

        let run_id = Uuid::new_v4();
        let current_year = self.current_year();
        let publish_year = record.effective_publish_year();
        let span = years_span(current_year, publish_year);
        let plan = SamplingPlan::compute(level, span, api_total);

        info!(
            %run_id,
            target_id,
            level = %level,
            strategy = plan.strategy.as_str(),
            stored = before,
            api_total,
            recent_quota = plan.recent_count,
            per_year_quota = plan.per_year_count,
            years = plan.effective_years,
            "Sampling run started"
        );

        let existing = self.store.existing_ids(target_id).await?;
        let mut collected = Collected::new(existing);

        self.fetch_hot(target_id, &plan, &mut collected).await?;
        self.fetch_recent(target_id, &plan, &mut collected).await?;
        for year in plan.years(current_year, publish_year) {
            self.fetch_year(target_id, &plan, year, &mut collected).await?;
        }

        let outcome = self.store.insert_new(&collected.comments).await?;
        let after = self.store.count(target_id).await?;
        let high_engagement_in_run = collected.comments.iter().filter(|c| c.is_high_engagement()).count();
        let years_sampled = collected.year_distribution.len();

        info!(
            %run_id,
            target_id,
            fetched = collected.counts.total,
            inserted = outcome.inserted,
            stored = after,
            failures = collected.failures.len(),
            "Sampling run finished"
        );

        Ok(SampleReport {
            run_id,
            target_id: target_id.to_string(),
            level,
            target: level.target(),
            api_total: Some(api_total),
            strategy: Some(plan.strategy),
            plan: Some(plan),
            fetched: collected.counts,
            store: StoreTotals {
                before,
                after,
                added: outcome.inserted,
            },
            coverage: Coverage {
                publish_year,
                years_span: span,
                years_sampled,
                year_distribution: collected.year_distribution,
            },
            high_engagement_in_run,
            sample_rate: sample_rate(after, api_total),
            failures: collected.failures,
            skipped_existing: false,
            guidance: guidance(level, after, span, years_sampled, outcome.inserted),
        })
    }

    pub(crate) async fn target_record(&self, target_id: &str) -> Result<TargetRecord> {
        if let Some(record) = self.store.target(target_id).await? {
            return Ok(record);
        }
        let record = TargetRecord::new(target_id);
        self.store.upsert_target(&record).await?;
        Ok(record)
    }

    async fn fetch_hot(&self, target_id: &str, plan: &SamplingPlan, collected: &mut Collected) -> Result<()> {
        let source = &*self.source;
        let limit = plan.hot_count;
        match self.config.retry.fetch(&self.pacer, move || source.hot(target_id, limit)).await? {
            PageOutcome::Fetched(items) => {
                let mut kept = 0;
                for wire in items.into_iter().take(limit) {
                    if let Some(c) = ingest(wire, target_id, Tier::Hot) {
                        if collected.accept(c) {
                            kept += 1;
                        }
                    }
                }
                debug!(target_id, kept, "Hot tier fetched");
            }
            PageOutcome::Abandoned(reason) => collected.abandon(Tier::Hot, 0, None, reason),
        }
        Ok(())
    }

    async fn fetch_recent(&self, target_id: &str, plan: &SamplingPlan, collected: &mut Collected) -> Result<()> {
        let source = &*self.source;
        let quota = plan.recent_count;
        let mut kept = 0;
        let mut offset = 0u32;
        let mut page = 0u32;

        while kept < quota && offset < self.config.recent_offset_ceiling {
            let outcome = self
                .config
                .retry
                .fetch(&self.pacer, move || source.offset_page(target_id, offset, PAGE_SIZE))
                .await?;
            let listing = match outcome {
                PageOutcome::Fetched(listing) => listing,
                PageOutcome::Abandoned(reason) => {
                    collected.abandon(Tier::Recent, page, None, reason);
                    break;
                }
            };
            if listing.comments.is_empty() {
                break;
            }
            for wire in listing.comments {
                if kept >= quota {
                    break;
                }
                if let Some(c) = ingest(wire, target_id, Tier::Recent) {
                    if collected.accept(c) {
                        kept += 1;
                    }
                }
            }
            debug!(target_id, page, offset, kept, "Recent page fetched");
            if !listing.has_more {
                break;
            }
            offset += PAGE_SIZE;
            page += 1;
        }
        Ok(())
    }

    async fn fetch_year(
        &self,
        target_id: &str,
        plan: &SamplingPlan,
        year: i32,
        collected: &mut Collected,
    ) -> Result<()> {
        let source = &*self.source;
        let quota = plan.per_year_count;
        let mut kept = 0;
        let mut cursor = mid_year_ms(year);

        for page in 0..plan.pages_per_year(self.config.max_pages_per_year) {
            if kept >= quota {
                break;
            }
            let at = cursor;
            let outcome = self
                .config
                .retry
                .fetch(&self.cursor_pacer, move || source.cursor_page(target_id, at, PAGE_SIZE))
                .await?;
            let listing = match outcome {
                PageOutcome::Fetched(listing) => listing,
                PageOutcome::Abandoned(reason) => {
                    collected.abandon(Tier::Yearly, page, Some(year), reason);
                    break;
                }
            };
            let Some(last_ts) = listing.comments.last().map(|c| c.time) else {
                break;
            };

            for wire in listing.comments {
                if kept >= quota {
                    break;
                }
                // The cursor drifts across year boundaries; only the target year counts.
                if year_of(wire.time) != Some(year) {
                    continue;
                }
                if let Some(c) = ingest(wire, target_id, Tier::Yearly) {
                    if collected.accept(c) {
                        kept += 1;
                    }
                }
            }
            debug!(target_id, year, page, kept, "Cursor page fetched");

            if last_ts <= 0 || last_ts >= cursor {
                debug!(target_id, year, "Cursor stopped advancing");
                break;
            }
            if year_of(last_ts).is_some_and(|y| y < year) {
                break;
            }
            cursor = last_ts;
        }

        if kept > 0 {
            info!(target_id, year, kept, "Year sampled");
        }
        Ok(())
    }

    /// Report for a run that found the level already satisfied. No upstream calls.
    async fn report_from_store(&self, record: &TargetRecord, level: SamplingLevel, stored: i64) -> Result<SampleReport> {
        let comments = self.store.comments(&record.id, stored.max(0) as usize).await?;

        let mut year_distribution = BTreeMap::new();
        for year in comments.iter().filter_map(Comment::year) {
            *year_distribution.entry(year).or_insert(0) += 1;
        }
        let span = match (year_distribution.keys().next(), year_distribution.keys().next_back()) {
            (Some(first), Some(last)) => last - first + 1,
            _ => 0,
        };
        let years_sampled = year_distribution.len();
        let high_engagement = comments.iter().filter(|c| c.is_high_engagement()).count();
        let api_total = record.api_total.map(|t| t.max(0) as u64);

        Ok(SampleReport {
            run_id: Uuid::new_v4(),
            target_id: record.id.clone(),
            level,
            target: level.target(),
            api_total,
            strategy: None,
            plan: None,
            fetched: TierCounts::default(),
            store: StoreTotals {
                before: stored,
                after: stored,
                added: 0,
            },
            coverage: Coverage {
                publish_year: record.effective_publish_year(),
                years_span: span,
                years_sampled,
                year_distribution,
            },
            high_engagement_in_run: high_engagement,
            sample_rate: api_total.and_then(|t| sample_rate(stored, t)),
            failures: Vec::new(),
            skipped_existing: true,
            guidance: guidance(level, stored, span, years_sampled, 0),
        })
    }
}

fn sample_rate(stored: i64, api_total: u64) -> Option<f64> {
    (api_total > 0).then(|| stored as f64 / api_total as f64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{wire, MockSource, SourceCall};
    use refrain_common::time::mid_year_ms;
    use refrain_common::RefrainError;
    use refrain_store::MemoryStore;

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

    fn published(year: i32) -> TargetRecord {
        TargetRecord {
            publish_year: Some(year),
            ..TargetRecord::new("song")
        }
    }

    #[tokio::test]
    async fn cursor_drift_into_neighbouring_years_is_discarded() {
        // Three comments in 2023, two that drifted into 2022.
        let corpus = vec![
            wire("a", "a", 1, mid_year_ms(2023) - 1_000),
            wire("b", "b", 1, mid_year_ms(2023) - 2_000),
            wire("c", "c", 1, mid_year_ms(2023) - 3_000),
            wire("d", "d", 1, mid_year_ms(2022)),
            wire("e", "e", 1, mid_year_ms(2022) - 1_000),
        ];
        let source = Arc::new(MockSource::new().with_total(5_000).with_corpus(corpus));
        let store = Arc::new(MemoryStore::new().with_target(published(2021)));
        let sampler = TieredSampler::new(source.clone(), store.clone(), quiet_config()).with_current_year(2023);

        let plan = SamplingPlan::compute(SamplingLevel::Quick, 3, 5_000);
        let mut collected = Collected::new(HashSet::new());
        sampler.fetch_year("song", &plan, 2023, &mut collected).await.unwrap();

        assert_eq!(collected.counts.yearly, 3);
        assert_eq!(collected.year_distribution.get(&2023), Some(&3));
        assert!(!collected.year_distribution.contains_key(&2022));
    }

    #[tokio::test]
    async fn recent_tier_stops_on_an_empty_page() {
        let corpus = (0..25).map(|i| wire(&format!("c{i}"), "x", 0, 1_700_000_000_000 - i)).collect();
        let source = Arc::new(MockSource::new().with_total(10_000).with_corpus(corpus));
        let store = Arc::new(MemoryStore::new().with_target(published(2024)));
        let sampler = TieredSampler::new(source.clone(), store, quiet_config()).with_current_year(2025);

        let plan = SamplingPlan::compute(SamplingLevel::Quick, 2, 10_000);
        let mut collected = Collected::new(HashSet::new());
        sampler.fetch_recent("song", &plan, &mut collected).await.unwrap();

        assert_eq!(collected.counts.recent, 25);
        let offsets: Vec<u32> = source
            .calls()
            .into_iter()
            .filter_map(|c| match c {
                SourceCall::Offset { offset } => Some(offset),
                _ => None,
            })
            .collect();
        assert_eq!(offsets, vec![0, 20]);
    }

    #[tokio::test]
    async fn blank_target_id_is_rejected_before_any_call() {
        let source = Arc::new(MockSource::new());
        let sampler = TieredSampler::new(source.clone(), Arc::new(MemoryStore::new()), quiet_config());

        let err = sampler.run("  ", SamplingLevel::Quick).await.unwrap_err();
        assert!(matches!(err, RefrainError::Validation(_)));
        assert!(source.calls().is_empty());
    }
}
