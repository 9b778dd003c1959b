//! The evidence layers served to the calling agent.
//!
//! Layer 0 (overview) → Layer 1 (signals) → Layer 2 (verification samples) →
//! Layer 2.5 (keyword lookup) → Layer 3 (raw records). Every call reads the
//! store afresh; nothing is remembered between calls. Layers 0 and 1 refuse
//! to run below the analysis minimum and name sampling as the next step.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::Serialize;
use serde_json::{json, Value};
use tracing::{debug, info};
use typed_builder::TypedBuilder;

use refrain_common::time::{self, date_of};
use refrain_common::{
    validate_target_id, Comment, DimensionId, RefrainError, Result, SamplingLevel, SufficiencyLevel, TargetRecord,
    Tier, HIGH_ENGAGEMENT_LIKES, MAX_ANALYSIS_SIZE, MIN_COMMENTS_FOR_ANALYSIS,
};
use refrain_store::{CommentStore, RawFilter};

use crate::analyzer::TextAnalyzer;
use crate::knowledge::KnowledgeCache;
use crate::metrics::{DimensionMetrics, ScoreSet};
use crate::selector::{Anchors, Contrast, Sample, SampleSelector, SelectorConfig};
use crate::signals::{CrossSignalDetector, Signal, SignalThresholds};
use crate::sufficiency::{DimensionSufficiency, SufficiencyInputs, SufficiencyThresholds};

#[derive(Debug, Clone, TypedBuilder)]
pub struct LayerConfig {
    /// Below this many stored comments layers 0 and 1 block.
    #[builder(default = MIN_COMMENTS_FOR_ANALYSIS)]
    pub min_comments: i64,
    #[builder(default = 500)]
    pub good_volume: i64,
    #[builder(default = 200)]
    pub acceptable_volume: i64,
    /// Coverage ratio under which the overview warns about bias.
    #[builder(default = 0.001)]
    pub low_coverage: f64,
    /// Most comments read for any one analysis.
    #[builder(default = MAX_ANALYSIS_SIZE)]
    pub analysis_cap: usize,
    #[builder(default = 20)]
    pub default_limit: usize,
    /// Caps the cross-dimension signal list. `None` keeps every fired rule.
    #[builder(default, setter(strip_option))]
    pub max_signals: Option<usize>,
    #[builder(default = 3)]
    pub highlights_per_year: usize,
    #[builder(default)]
    pub sufficiency: SufficiencyThresholds,
    #[builder(default)]
    pub selector: SelectorConfig,
    #[builder(default)]
    pub signals: SignalThresholds,
    /// Pins "now" for temporal metrics. Defaults to the wall clock.
    #[builder(default, setter(strip_option))]
    pub current_year: Option<i32>,
}

impl Default for LayerConfig {
    fn default() -> Self {
        Self::builder().build()
    }
}

// --- Responses ---

/// A call the agent may make next.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NextOption {
    pub call: &'static str,
    pub args: Value,
    pub description: String,
    pub recommended: bool,
}

impl NextOption {
    fn new(call: &'static str, args: Value, description: impl Into<String>) -> Self {
        Self {
            call,
            args,
            description: description.into(),
            recommended: false,
        }
    }

    fn recommended(mut self) -> Self {
        self.recommended = true;
        self
    }
}

/// Not enough data to analyze. Not an error: the agent is expected to sample and retry.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Blocking {
    pub layer: &'static str,
    pub reason: String,
    pub stored: i64,
    pub min_required: i64,
    pub required_action: NextOption,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum LayerResponse<T> {
    Ready(T),
    #[serde(rename = "must_sample_first")]
    Blocked(Blocking),
}

impl<T> LayerResponse<T> {
    pub fn ready(self) -> Option<T> {
        match self {
            LayerResponse::Ready(view) => Some(view),
            LayerResponse::Blocked(_) => None,
        }
    }

    pub fn is_blocked(&self) -> bool {
        matches!(self, LayerResponse::Blocked(_))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Overview {
    pub target_id: String,
    pub title: Option<String>,
    pub artist: Option<String>,
    pub stored: i64,
    /// Last total the upstream probe reported, if any.
    pub api_total: Option<i64>,
    pub coverage_ratio: Option<f64>,
    pub earliest_date: Option<String>,
    pub latest_date: Option<String>,
    pub year_span: i32,
    pub years_covered: usize,
    pub year_distribution: BTreeMap<i32, usize>,
    pub quality: SufficiencyLevel,
    pub quality_note: &'static str,
    pub warning: Option<String>,
    pub next_options: Vec<NextOption>,
}

/// A per-dimension signal string tagged with its dimension.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DimensionSignal {
    pub source: DimensionId,
    pub signal: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoringSummary {
    pub scored: usize,
    pub skipped_short: usize,
    pub failed: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SamplingRecommendation {
    pub reason: String,
    pub dimensions: Vec<DimensionSufficiency>,
    pub suggested_level: Option<SamplingLevel>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SignalsView {
    pub target_id: String,
    pub stored: i64,
    pub analyzed: usize,
    pub dimensions: DimensionMetrics,
    pub sufficiency: Vec<DimensionSufficiency>,
    pub dimension_signals: Vec<DimensionSignal>,
    pub cross_signals: Vec<Signal>,
    pub scoring: ScoringSummary,
    pub sampling_recommendation: Option<SamplingRecommendation>,
    pub next_options: Vec<NextOption>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VerificationTask {
    pub task: &'static str,
    pub question: &'static str,
    pub samples_key: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SampleCounts {
    pub anchors: usize,
    pub contrast: usize,
    pub total: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UpgradeSuggestion {
    pub current_level: &'static str,
    pub current_count: i64,
    pub upgrade_to: SamplingLevel,
    pub upgrade_target: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VerificationSamples {
    pub target_id: String,
    pub analyzed: usize,
    pub anchors: Anchors,
    pub contrast: Contrast,
    /// Most-liked comments of each anomaly year.
    pub year_highlights: BTreeMap<i32, Vec<Sample>>,
    pub sample_counts: SampleCounts,
    pub verification_tasks: Vec<VerificationTask>,
    pub current_level: &'static str,
    pub upgrade: Option<UpgradeSuggestion>,
    pub next_options: Vec<NextOption>,
}

/// A stored comment as shown by the keyword and raw layers.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RawRecord {
    pub id: String,
    pub text: String,
    pub engagement: i64,
    pub date: Option<String>,
    pub tier: Tier,
    pub author: Option<String>,
}

impl From<&Comment> for RawRecord {
    fn from(c: &Comment) -> Self {
        Self {
            id: c.id.clone(),
            text: c.text.clone(),
            engagement: c.engagement,
            date: c.date(),
            tier: c.tier,
            author: c.author.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct KeywordLookup {
    pub target_id: String,
    pub keyword: String,
    pub min_engagement: i64,
    /// Every match in the store, not just the returned ones.
    pub total_matches: i64,
    pub returned: usize,
    pub comments: Vec<RawRecord>,
    pub next_options: Vec<NextOption>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RawRecords {
    pub target_id: String,
    pub year: Option<i32>,
    pub min_engagement: i64,
    pub returned: usize,
    pub comments: Vec<RawRecord>,
    pub next_options: Vec<NextOption>,
}

// ---------------------------------------------------------------------------
// EvidenceLayers
// ---------------------------------------------------------------------------

pub struct EvidenceLayers {
    store: Arc<dyn CommentStore>,
    analyzer: Arc<dyn TextAnalyzer>,
    knowledge: Arc<KnowledgeCache>,
    selector: SampleSelector,
    detector: CrossSignalDetector,
    config: LayerConfig,
}

impl EvidenceLayers {
    pub fn new(
        store: Arc<dyn CommentStore>,
        analyzer: Arc<dyn TextAnalyzer>,
        knowledge: Arc<KnowledgeCache>,
        config: LayerConfig,
    ) -> Self {
        Self {
            selector: SampleSelector::new(config.selector.clone()),
            detector: CrossSignalDetector::new(config.signals.clone()),
            store,
            analyzer,
            knowledge,
            config,
        }
    }

    fn current_year(&self) -> i32 {
        self.config.current_year.unwrap_or_else(time::current_year)
    }

    async fn require_target(&self, target_id: &str) -> Result<TargetRecord> {
        validate_target_id(target_id)?;
        self.store
            .target(target_id)
            .await?
            .ok_or_else(|| RefrainError::NotFound(format!("target {target_id}")))
    }

    fn blocking(&self, layer: &'static str, target_id: &str, stored: i64) -> Blocking {
        let min = self.config.min_comments;
        Blocking {
            layer,
            reason: format!("only {stored} comments stored; at least {min} are needed before any analysis"),
            stored,
            min_required: min,
            required_action: NextOption::new(
                "sample",
                json!({ "target_id": target_id, "level": SamplingLevel::Standard }),
                "sample comments, then call overview again",
            )
            .recommended(),
        }
    }

    fn quality(&self, stored: i64) -> (SufficiencyLevel, &'static str) {
        let c = &self.config;
        if stored >= c.good_volume {
            (SufficiencyLevel::Good, "sample is large enough for the statistics to be trusted")
        } else if stored >= c.acceptable_volume {
            (SufficiencyLevel::Acceptable, "sample is usable; treat results as indicative")
        } else if stored >= c.min_comments {
            (SufficiencyLevel::Limited, "sample is small; confidence in results is low")
        } else {
            (SufficiencyLevel::Insufficient, "not enough comments; sample first")
        }
    }

    async fn analysis_slice(&self, target_id: &str) -> Result<Vec<Comment>> {
        Ok(self.store.comments(target_id, self.config.analysis_cap).await?)
    }

    /// Layer 0.
    pub async fn overview(&self, target_id: &str) -> Result<LayerResponse<Overview>> {
        let record = self.require_target(target_id).await?;
        let stored = self.store.count(target_id).await?;
        if stored < self.config.min_comments {
            info!(target_id, stored, "Overview blocked, not enough comments");
            return Ok(LayerResponse::Blocked(self.blocking("overview", target_id, stored)));
        }

        let comments = self.analysis_slice(target_id).await?;
        let mut year_distribution: BTreeMap<i32, usize> = BTreeMap::new();
        for year in comments.iter().filter_map(Comment::year) {
            *year_distribution.entry(year).or_insert(0) += 1;
        }
        let earliest = comments.iter().filter_map(|c| c.timestamp_ms).min();
        let latest = comments.iter().filter_map(|c| c.timestamp_ms).max();
        let year_span = match (year_distribution.keys().next(), year_distribution.keys().next_back()) {
            (Some(first), Some(last)) => last - first + 1,
            _ => 0,
        };

        let coverage_ratio = record
            .api_total
            .filter(|total| *total > 0)
            .map(|total| stored as f64 / total as f64);
        let (quality, quality_note) = self.quality(stored);
        let warning = match coverage_ratio {
            Some(r) if r < self.config.low_coverage => Some(format!(
                "coverage is {:.3}% of the upstream total; results may be biased",
                r * 100.0
            )),
            _ if quality == SufficiencyLevel::Limited => {
                Some("sample is limited; consider sampling more before drawing conclusions".to_string())
            }
            _ => None,
        };

        let mut next_options = vec![NextOption::new(
            "signals",
            json!({ "target_id": target_id }),
            "six-dimension metrics and cross-dimension signals",
        )
        .recommended()];
        if let Some(level) = SamplingLevel::reached_by(stored).map_or(Some(SamplingLevel::Quick), |l| l.upgrade()) {
            next_options.push(NextOption::new(
                "sample",
                json!({ "target_id": target_id, "level": level }),
                format!("raise the sample to {} comments", level.target()),
            ));
        }

        info!(target_id, stored, quality = %quality, "Overview served");
        Ok(LayerResponse::Ready(Overview {
            target_id: target_id.to_string(),
            title: record.title,
            artist: record.artist,
            stored,
            api_total: record.api_total,
            coverage_ratio,
            earliest_date: earliest.and_then(date_of),
            latest_date: latest.and_then(date_of),
            year_span,
            years_covered: year_distribution.len(),
            year_distribution,
            quality,
            quality_note,
            warning,
            next_options,
        }))
    }

    /// Layer 1. Re-checks the overview minimum; below it nothing is computed.
    pub async fn signals(&self, target_id: &str) -> Result<LayerResponse<SignalsView>> {
        self.require_target(target_id).await?;
        let stored = self.store.count(target_id).await?;
        if stored < self.config.min_comments {
            info!(target_id, stored, "Signals blocked, not enough comments");
            return Ok(LayerResponse::Blocked(self.blocking("signals", target_id, stored)));
        }

        let lexicon = self.knowledge.get()?;
        let comments = self.analysis_slice(target_id).await?;
        let scores = ScoreSet::compute(&comments, self.analyzer.as_ref(), &lexicon);
        let dimensions =
            DimensionMetrics::compute(&comments, &scores, self.analyzer.as_ref(), &lexicon, self.current_year());

        let sufficiency = self.config.sufficiency.evaluate_all(&SufficiencyInputs {
            volume: stored,
            years_covered: dimensions.temporal.years_with_data as i64,
            high_engagement: dimensions.structural.hot.count as i64,
        });

        let mut cross_signals = self.detector.detect(&dimensions, &lexicon);
        if let Some(cap) = self.config.max_signals {
            cross_signals.truncate(cap);
        }

        let per_dimension: [(DimensionId, &Vec<String>); 6] = [
            (DimensionId::Sentiment, &dimensions.sentiment.signals),
            (DimensionId::Content, &dimensions.content.signals),
            (DimensionId::Temporal, &dimensions.temporal.signals),
            (DimensionId::Structural, &dimensions.structural.signals),
            (DimensionId::Social, &dimensions.social.signals),
            (DimensionId::Linguistic, &dimensions.linguistic.signals),
        ];
        let dimension_signals: Vec<DimensionSignal> = per_dimension
            .iter()
            .flat_map(|(source, signals)| {
                signals.iter().map(move |s| DimensionSignal {
                    source: *source,
                    signal: s.clone(),
                })
            })
            .collect();

        let short: Vec<DimensionSufficiency> = sufficiency.iter().filter(|s| s.level.needs_more()).cloned().collect();
        let sampling_recommendation = (!short.is_empty()).then(|| SamplingRecommendation {
            reason: format!(
                "{} dimension(s) below acceptable; sample more, then call signals again",
                short.len()
            ),
            suggested_level: SamplingLevel::reached_by(stored).map_or(Some(SamplingLevel::Standard), |l| l.upgrade()),
            dimensions: short,
        });

        let mut next_options = Vec::new();
        if let Some(level) = sampling_recommendation.as_ref().and_then(|r| r.suggested_level) {
            next_options.push(
                NextOption::new(
                    "sample",
                    json!({ "target_id": target_id, "level": level }),
                    "fill the dimensions that lack data",
                )
                .recommended(),
            );
        }
        let samples = NextOption::new(
            "samples",
            json!({ "target_id": target_id }),
            "anchor and contrast samples to verify these signals",
        );
        next_options.push(if sampling_recommendation.is_none() && !cross_signals.is_empty() {
            samples.recommended()
        } else {
            samples
        });
        if let Some(top) = dimensions.content.top_keywords.first() {
            next_options.push(NextOption::new(
                "keyword",
                json!({ "target_id": target_id, "keyword": top.word }),
                "check how often the top keyword really appears",
            ));
        }

        info!(
            target_id,
            stored,
            analyzed = comments.len(),
            cross_signals = cross_signals.len(),
            short_dimensions = sampling_recommendation.as_ref().map_or(0, |r| r.dimensions.len()),
            "Signals served"
        );
        Ok(LayerResponse::Ready(SignalsView {
            target_id: target_id.to_string(),
            stored,
            analyzed: comments.len(),
            scoring: ScoringSummary {
                scored: dimensions.sentiment.scored,
                skipped_short: scores.skipped_short,
                failed: scores.failed,
            },
            dimensions,
            sufficiency,
            dimension_signals,
            cross_signals,
            sampling_recommendation,
            next_options,
        }))
    }

    /// Layer 2. Serves whatever exhibits exist; only families with samples get a task.
    pub async fn verification_samples(&self, target_id: &str) -> Result<VerificationSamples> {
        self.require_target(target_id).await?;
        let stored = self.store.count(target_id).await?;
        let lexicon = self.knowledge.get()?;
        let comments = self.analysis_slice(target_id).await?;

        let scores = ScoreSet::compute(&comments, self.analyzer.as_ref(), &lexicon);
        let paired = scores.paired(&comments);
        let anchors = self.selector.anchors(&comments);
        let contrast = self.selector.contrast(&comments, &paired);

        let temporal = crate::metrics::temporal::compute(&comments, self.current_year());
        let anomaly_years: Vec<i32> = temporal
            .anomalies_at(self.config.signals.event_ratio)
            .iter()
            .take(3)
            .map(|a| a.year)
            .collect();
        let year_highlights = self
            .selector
            .year_highlights(&comments, &anomaly_years, self.config.highlights_per_year);
        debug!(target_id, scored = paired.len(), anomalies = anomaly_years.len(), "Selected samples");

        let verification_tasks = tasks(&anchors, &contrast, &year_highlights);
        let anchor_count =
            anchors.most_liked.len() + anchors.earliest.len() + anchors.latest.len() + anchors.longest.len();
        let contrast_count = contrast.high_likes_low_score.len() + contrast.low_likes_long.len();

        let reached = SamplingLevel::reached_by(stored);
        let current_level = reached.map_or("minimal", |l| l.as_str());
        let upgrade = (reached != Some(SamplingLevel::Deep)).then(|| UpgradeSuggestion {
            current_level,
            current_count: stored,
            upgrade_to: SamplingLevel::Deep,
            upgrade_target: SamplingLevel::Deep.target(),
        });

        let total = anchor_count + contrast_count;
        let mut more = NextOption::new(
            "raw",
            json!({ "target_id": target_id, "limit": 50 }),
            "more raw comments when the samples are too few",
        );
        if total < 10 {
            more = more.recommended();
        }
        let mut next_options = vec![
            more,
            NextOption::new(
                "raw",
                json!({ "target_id": target_id, "min_engagement": HIGH_ENGAGEMENT_LIKES }),
                "only high-engagement comments",
            ),
        ];
        if let Some(year) = anomaly_years.first() {
            next_options.push(NextOption::new(
                "raw",
                json!({ "target_id": target_id, "year": year }),
                format!("comments from {year}"),
            ));
        }
        if let Some(up) = &upgrade {
            next_options.push(NextOption::new(
                "sample",
                json!({ "target_id": target_id, "level": up.upgrade_to }),
                format!("deepen the sample to {} comments", up.upgrade_target),
            ));
        }

        info!(target_id, anchors = anchor_count, contrast = contrast_count, level = current_level, "Samples served");
        Ok(VerificationSamples {
            target_id: target_id.to_string(),
            analyzed: comments.len(),
            anchors,
            contrast,
            year_highlights,
            sample_counts: SampleCounts {
                anchors: anchor_count,
                contrast: contrast_count,
                total,
            },
            verification_tasks,
            current_level,
            upgrade,
            next_options,
        })
    }

    /// Layer 2.5. Substring search over the whole store, most-liked first.
    pub async fn keyword_lookup(
        &self,
        target_id: &str,
        keyword: &str,
        min_engagement: i64,
        limit: Option<usize>,
    ) -> Result<KeywordLookup> {
        self.require_target(target_id).await?;
        let keyword = keyword.trim();
        if keyword.is_empty() {
            return Err(RefrainError::Validation("keyword must not be empty".into()));
        }
        let limit = self.limit(limit)?;
        let matches = self.store.search(target_id, keyword, min_engagement.max(0), limit).await?;
        let comments: Vec<RawRecord> = matches.comments.iter().map(RawRecord::from).collect();

        info!(target_id, keyword, total = matches.total, "Keyword lookup served");
        Ok(KeywordLookup {
            target_id: target_id.to_string(),
            keyword: keyword.to_string(),
            min_engagement: min_engagement.max(0),
            total_matches: matches.total,
            returned: comments.len(),
            comments,
            next_options: vec![NextOption::new(
                "raw",
                json!({ "target_id": target_id }),
                "browse raw comments without a keyword filter",
            )],
        })
    }

    /// Layer 3. Filtered raw comments, no aggregation.
    pub async fn raw(
        &self,
        target_id: &str,
        year: Option<i32>,
        min_engagement: Option<i64>,
        limit: Option<usize>,
    ) -> Result<RawRecords> {
        self.require_target(target_id).await?;
        let limit = self.limit(limit)?;
        let min_engagement = min_engagement.unwrap_or(0).max(0);
        let rows = self
            .store
            .raw(
                target_id,
                RawFilter {
                    year,
                    min_engagement,
                    limit,
                },
            )
            .await?;
        let comments: Vec<RawRecord> = rows.iter().map(RawRecord::from).collect();

        info!(target_id, ?year, min_engagement, returned = comments.len(), "Raw records served");
        Ok(RawRecords {
            target_id: target_id.to_string(),
            year,
            min_engagement,
            returned: comments.len(),
            comments,
            next_options: vec![NextOption::new(
                "keyword",
                json!({ "target_id": target_id }),
                "count a specific word across the whole store",
            )],
        })
    }

    fn limit(&self, limit: Option<usize>) -> Result<usize> {
        match limit {
            Some(0) => Err(RefrainError::Validation("limit must be at least 1".into())),
            Some(n) => Ok(n.min(self.config.analysis_cap)),
            None => Ok(self.config.default_limit),
        }
    }
}

fn tasks(anchors: &Anchors, contrast: &Contrast, year_highlights: &BTreeMap<i32, Vec<Sample>>) -> Vec<VerificationTask> {
    let mut out = Vec::new();
    if !contrast.high_likes_low_score.is_empty() {
        out.push(VerificationTask {
            task: "check high-likes low-score comments",
            question: "Are these liked but low-scored comments irony, poetic phrasing, memes, or genuinely negative?",
            samples_key: "contrast.high_likes_low_score".into(),
        });
    }
    if !anchors.most_liked.is_empty() {
        out.push(VerificationTask {
            task: "explain what the crowd liked",
            question: "What do the most-liked comments resonate with, and is it about the song itself?",
            samples_key: "anchors.most_liked".into(),
        });
    }
    if !anchors.earliest.is_empty() && !anchors.latest.is_empty() {
        out.push(VerificationTask {
            task: "compare early and recent comments",
            question: "Has the mood of the section changed between the earliest and latest comments?",
            samples_key: "anchors.earliest vs anchors.latest".into(),
        });
    }
    if !contrast.low_likes_long.is_empty() {
        out.push(VerificationTask {
            task: "weigh overlooked long comments",
            question: "Do these long, barely liked comments carry views the popular ones miss?",
            samples_key: "contrast.low_likes_long".into(),
        });
    }
    if let Some(year) = year_highlights.keys().next() {
        out.push(VerificationTask {
            task: "explain the spike year",
            question: "Do comments from the spike year mention an event that drew listeners in?",
            samples_key: format!("year_highlights.{year}"),
        });
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{comment, comment_in, FixedAnalyzer};
    use refrain_store::MemoryStore;

    fn layers(store: MemoryStore, analyzer: FixedAnalyzer) -> EvidenceLayers {
        EvidenceLayers::new(
            Arc::new(store),
            Arc::new(analyzer),
            Arc::new(KnowledgeCache::builtin()),
            LayerConfig::builder().current_year(2025).build(),
        )
    }

    fn song(api_total: Option<i64>) -> TargetRecord {
        TargetRecord {
            api_total,
            title: Some("晴天".into()),
            ..TargetRecord::new("song")
        }
    }

    fn spread(n: usize) -> Vec<Comment> {
        (0..n)
            .map(|i| comment_in(&format!("c{i}"), 2016 + (i % 8) as i32, (i * 7 % 300) as i64))
            .collect()
    }

    #[tokio::test]
    async fn unknown_target_is_not_found() {
        let l = layers(MemoryStore::new(), FixedAnalyzer::new(0.5));
        assert!(matches!(l.overview("nope").await, Err(RefrainError::NotFound(_))));
        assert!(matches!(l.raw("nope", None, None, None).await, Err(RefrainError::NotFound(_))));
    }

    #[tokio::test]
    async fn overview_blocks_below_the_minimum() {
        let store = MemoryStore::new().with_target(song(None)).with_comments(spread(99));
        let l = layers(store, FixedAnalyzer::new(0.5));

        let response = l.overview("song").await.unwrap();
        let LayerResponse::Blocked(blocking) = response else {
            panic!("expected blocking status");
        };
        assert_eq!(blocking.stored, 99);
        assert_eq!(blocking.min_required, 100);
        assert_eq!(blocking.required_action.call, "sample");
        assert_eq!(blocking.required_action.args["level"], json!("standard"));
    }

    #[tokio::test]
    async fn overview_labels_quality_and_warns_on_thin_coverage() {
        let store = MemoryStore::new()
            .with_target(song(Some(1_000_000)))
            .with_comments(spread(150));
        let l = layers(store, FixedAnalyzer::new(0.5));

        let view = l.overview("song").await.unwrap().ready().unwrap();
        assert_eq!(view.stored, 150);
        assert_eq!(view.quality, SufficiencyLevel::Limited);
        assert_eq!(view.year_span, 8);
        assert_eq!(view.years_covered, 8);
        assert_eq!(view.coverage_ratio, Some(0.00015));
        assert!(view.warning.unwrap().starts_with("coverage is 0.015%"));
        assert_eq!(view.title.as_deref(), Some("晴天"));
        assert!(view.next_options.iter().any(|o| o.call == "signals" && o.recommended));
    }

    #[tokio::test]
    async fn signals_block_without_partial_data() {
        let store = MemoryStore::new().with_target(song(None)).with_comments(spread(40));
        let l = layers(store, FixedAnalyzer::new(0.5));
        let response = l.signals("song").await.unwrap();
        assert!(response.is_blocked());
        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["status"], json!("must_sample_first"));
        assert!(json.get("dimensions").is_none());
    }

    #[tokio::test]
    async fn signals_degrade_with_a_recommendation() {
        let store = MemoryStore::new().with_target(song(Some(5_000))).with_comments(spread(120));
        let l = layers(store, FixedAnalyzer::new(0.5));

        let view = l.signals("song").await.unwrap().ready().unwrap();
        assert_eq!(view.analyzed, 120);
        assert_eq!(view.sufficiency.len(), 6);
        let rec = view.sampling_recommendation.expect("recommendation");
        assert!(rec.dimensions.iter().any(|d| d.dimension == DimensionId::Sentiment));
        assert!(rec.dimensions.iter().any(|d| d.dimension == DimensionId::Structural));
        assert!(!rec.dimensions.iter().any(|d| d.dimension == DimensionId::Temporal));
        assert_eq!(rec.suggested_level, Some(SamplingLevel::Standard));
        assert!(view.next_options[0].recommended);
    }

    #[tokio::test]
    async fn verification_tasks_only_for_non_empty_families() {
        let store = MemoryStore::new()
            .with_target(song(None))
            .with_comments(vec![comment("a", "好听好听", 10), comment("b", "夏天的风", 3)]);
        let l = layers(store, FixedAnalyzer::new(0.9));

        let view = l.verification_samples("song").await.unwrap();
        assert!(view.contrast.high_likes_low_score.is_empty());
        let keys: Vec<&str> = view.verification_tasks.iter().map(|t| t.samples_key.as_str()).collect();
        assert!(!keys.contains(&"contrast.high_likes_low_score"));
        assert!(keys.contains(&"anchors.most_liked"));
        assert_eq!(view.current_level, "minimal");
        assert_eq!(view.upgrade.unwrap().upgrade_to, SamplingLevel::Deep);
    }

    #[tokio::test]
    async fn keyword_lookup_rejects_blank_keywords() {
        let store = MemoryStore::new().with_target(song(None));
        let l = layers(store, FixedAnalyzer::new(0.5));
        let err = l.keyword_lookup("song", "  ", 0, None).await.unwrap_err();
        assert!(matches!(err, RefrainError::Validation(_)));
        let err = l.raw("song", None, None, Some(0)).await.unwrap_err();
        assert!(matches!(err, RefrainError::Validation(_)));
    }
}
