//! Sample selection: near-duplicate collapsing, anchor exhibits chosen by
//! objective criteria, contrast exhibits where engagement and score disagree,
//! and stratified picks for diversity.
//!
//! Everything here is deterministic. Ties keep the input order.

use std::collections::{BTreeMap, HashMap, HashSet};

use serde::Serialize;
use typed_builder::TypedBuilder;

use refrain_common::{Comment, Tier};

#[derive(Debug, Clone, TypedBuilder)]
pub struct SelectorConfig {
    /// Character-set Jaccard similarity at or above which two texts collapse.
    #[builder(default = 0.6)]
    pub similarity_threshold: f64,
    #[builder(default = 5)]
    pub most_liked: usize,
    #[builder(default = 5)]
    pub earliest: usize,
    #[builder(default = 5)]
    pub latest: usize,
    #[builder(default = 3)]
    pub longest: usize,
    #[builder(default = 50)]
    pub longest_min_chars: usize,
    #[builder(default = 100)]
    pub contrast_min_likes: i64,
    #[builder(default = 0.3)]
    pub contrast_max_score: f64,
    #[builder(default = 5)]
    pub high_likes_low_score: usize,
    #[builder(default = 10)]
    pub ignored_max_likes: i64,
    #[builder(default = 100)]
    pub ignored_min_chars: usize,
    #[builder(default = 3)]
    pub low_likes_long: usize,
    #[builder(default = 3)]
    pub per_stratum: usize,
    #[builder(default = 150)]
    pub excerpt_chars: usize,
    #[builder(default = 200)]
    pub long_excerpt_chars: usize,
}

impl Default for SelectorConfig {
    fn default() -> Self {
        Self::builder().build()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum SampleReason {
    MostLiked,
    Earliest,
    Latest,
    Longest,
    HighLikesLowScore,
    LowLikesLong,
    YearStratum,
    LengthStratum,
    AnomalyYear,
}

/// A comment excerpt shown to the agent as an exhibit.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Sample {
    pub id: String,
    pub text: String,
    pub engagement: i64,
    pub date: Option<String>,
    pub year: Option<i32>,
    /// Full length of the original text in characters.
    pub length: usize,
    pub tier: Tier,
    pub reason: SampleReason,
    /// This sample plus the near-duplicates collapsed into it.
    pub similar_count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub score: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stratum: Option<String>,
}

impl Sample {
    pub fn from_comment(comment: &Comment, reason: SampleReason, excerpt_chars: usize) -> Self {
        Self {
            id: comment.id.clone(),
            text: comment.text.chars().take(excerpt_chars).collect(),
            engagement: comment.engagement,
            date: comment.date(),
            year: comment.year(),
            length: comment.char_len(),
            tier: comment.tier,
            reason,
            similar_count: 1,
            score: None,
            stratum: None,
        }
    }

    fn with_score(mut self, score: f64) -> Self {
        self.score = Some((score * 1000.0).round() / 1000.0);
        self
    }

    fn with_stratum(mut self, stratum: String) -> Self {
        self.stratum = Some(stratum);
        self
    }
}

/// Jaccard similarity of the two texts' character sets. Empty text is similar to nothing.
pub fn jaccard(a: &str, b: &str) -> f64 {
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    let a: HashSet<char> = a.chars().collect();
    let b: HashSet<char> = b.chars().collect();
    let union = a.union(&b).count();
    if union == 0 {
        return 0.0;
    }
    a.intersection(&b).count() as f64 / union as f64
}

/// Result of collapsing near-duplicates.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Deduplicated {
    pub kept: Vec<Sample>,
    /// Candidates folded into an earlier kept sample.
    pub removed: usize,
}

/// Keep the first of every group of near-duplicates, counting the rest into
/// its `similar_count`. Stops as soon as `max_count` samples are kept.
pub fn dedup(candidates: Vec<Sample>, threshold: f64, max_count: usize) -> Deduplicated {
    let mut out = Deduplicated::default();
    if max_count == 0 {
        return out;
    }
    for mut candidate in candidates {
        if let Some(existing) = out
            .kept
            .iter_mut()
            .find(|k| jaccard(&candidate.text, &k.text) >= threshold)
        {
            existing.similar_count += 1;
            out.removed += 1;
            continue;
        }
        candidate.similar_count = 1;
        out.kept.push(candidate);
        if out.kept.len() >= max_count {
            break;
        }
    }
    out
}

/// Exhibits chosen without looking at any score.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Anchors {
    pub most_liked: Vec<Sample>,
    pub earliest: Vec<Sample>,
    pub latest: Vec<Sample>,
    pub longest: Vec<Sample>,
}

impl Anchors {
    pub fn is_empty(&self) -> bool {
        self.most_liked.is_empty() && self.earliest.is_empty() && self.latest.is_empty() && self.longest.is_empty()
    }
}

/// Exhibits where engagement and the analyzer's score point different ways.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Contrast {
    pub high_likes_low_score: Vec<Sample>,
    pub low_likes_long: Vec<Sample>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StratumKey {
    Year,
    Length,
}

impl StratumKey {
    fn of(&self, comment: &Comment) -> String {
        match self {
            StratumKey::Year => comment
                .year()
                .map(|y| y.to_string())
                .unwrap_or_else(|| "unknown".to_string()),
            StratumKey::Length => match comment.char_len() {
                n if n < 20 => "short".to_string(),
                n if n < 80 => "medium".to_string(),
                _ => "long".to_string(),
            },
        }
    }

    fn reason(&self) -> SampleReason {
        match self {
            StratumKey::Year => SampleReason::YearStratum,
            StratumKey::Length => SampleReason::LengthStratum,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DiverseSamples {
    pub samples: Vec<Sample>,
    pub deduplicated: usize,
    pub strata_used: Vec<StratumKey>,
}

// ---------------------------------------------------------------------------
// SampleSelector
// ---------------------------------------------------------------------------

pub struct SampleSelector {
    config: SelectorConfig,
}

impl Default for SampleSelector {
    fn default() -> Self {
        Self::new(SelectorConfig::default())
    }
}

impl SampleSelector {
    pub fn new(config: SelectorConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &SelectorConfig {
        &self.config
    }

    fn collapse(&self, candidates: Vec<Sample>, max_count: usize) -> Vec<Sample> {
        dedup(candidates, self.config.similarity_threshold, max_count).kept
    }

    /// Most-liked, earliest, latest and longest comments, each deduplicated.
    /// Every family draws from a candidate pool a few times its quota so
    /// that collapsing duplicates still leaves enough to fill it.
    pub fn anchors(&self, comments: &[Comment]) -> Anchors {
        let c = &self.config;
        let excerpt = |comment: &Comment, reason: SampleReason| Sample::from_comment(comment, reason, c.excerpt_chars);

        let mut by_likes: Vec<&Comment> = comments.iter().collect();
        by_likes.sort_by(|a, b| b.engagement.cmp(&a.engagement));
        let most_liked = by_likes
            .iter()
            .take(c.most_liked * 2)
            .map(|cm| excerpt(*cm, SampleReason::MostLiked))
            .collect();

        let mut dated: Vec<(&Comment, i64)> = comments
            .iter()
            .filter_map(|cm| cm.timestamp_ms.map(|ts| (cm, ts)))
            .collect();
        dated.sort_by_key(|(_, ts)| *ts);
        let earliest = dated
            .iter()
            .take(c.earliest * 2)
            .map(|(cm, _)| excerpt(*cm, SampleReason::Earliest))
            .collect();
        let latest = dated
            .iter()
            .rev()
            .take(c.latest * 2)
            .map(|(cm, _)| excerpt(*cm, SampleReason::Latest))
            .collect();

        let mut by_length: Vec<&Comment> = comments.iter().collect();
        by_length.sort_by(|a, b| b.char_len().cmp(&a.char_len()));
        let longest = by_length
            .iter()
            .take(c.longest * 3)
            .filter(|cm| cm.char_len() >= c.longest_min_chars)
            .map(|cm| Sample::from_comment(*cm, SampleReason::Longest, c.long_excerpt_chars))
            .collect();

        Anchors {
            most_liked: self.collapse(most_liked, c.most_liked),
            earliest: self.collapse(earliest, c.earliest),
            latest: self.collapse(latest, c.latest),
            longest: self.collapse(longest, c.longest),
        }
    }

    /// Contrast exhibits. `scored` pairs comments with analyzer scores; with
    /// no scores at all both families are empty.
    pub fn contrast(&self, comments: &[Comment], scored: &[(&Comment, f64)]) -> Contrast {
        if scored.is_empty() {
            return Contrast::default();
        }
        let c = &self.config;
        let scores: HashMap<&str, f64> = scored.iter().map(|(cm, s)| (cm.id.as_str(), *s)).collect();

        let mut loud: Vec<(&Comment, f64)> = comments
            .iter()
            .filter_map(|cm| scores.get(cm.id.as_str()).map(|s| (cm, *s)))
            .filter(|(cm, s)| cm.engagement >= c.contrast_min_likes && *s <= c.contrast_max_score)
            .collect();
        loud.sort_by(|a, b| b.0.engagement.cmp(&a.0.engagement));
        let high_likes_low_score = loud
            .into_iter()
            .take(c.high_likes_low_score * 2)
            .map(|(cm, s)| Sample::from_comment(cm, SampleReason::HighLikesLowScore, c.excerpt_chars).with_score(s))
            .collect();

        let mut ignored: Vec<&Comment> = comments
            .iter()
            .filter(|cm| cm.engagement <= c.ignored_max_likes && cm.char_len() >= c.ignored_min_chars)
            .collect();
        ignored.sort_by(|a, b| b.char_len().cmp(&a.char_len()));
        let low_likes_long = ignored
            .into_iter()
            .take(c.low_likes_long * 2)
            .map(|cm| {
                let sample = Sample::from_comment(cm, SampleReason::LowLikesLong, c.long_excerpt_chars);
                match scores.get(cm.id.as_str()) {
                    Some(s) => sample.with_score(*s),
                    None => sample,
                }
            })
            .collect();

        Contrast {
            high_likes_low_score: self.collapse(high_likes_low_score, c.high_likes_low_score),
            low_likes_long: self.collapse(low_likes_long, c.low_likes_long),
        }
    }

    /// Bucket by `key`, visit buckets largest first and take the most-liked
    /// `per_stratum` from each until `max_total` is reached.
    pub fn stratified(&self, comments: &[Comment], key: StratumKey, max_total: usize) -> Vec<Sample> {
        let mut buckets: BTreeMap<String, Vec<&Comment>> = BTreeMap::new();
        for comment in comments {
            buckets.entry(key.of(comment)).or_default().push(comment);
        }
        let mut ordered: Vec<(String, Vec<&Comment>)> = buckets.into_iter().collect();
        ordered.sort_by(|a, b| b.1.len().cmp(&a.1.len()));

        let mut out = Vec::new();
        for (stratum, mut members) in ordered {
            if out.len() >= max_total {
                break;
            }
            members.sort_by(|a, b| b.engagement.cmp(&a.engagement));
            out.extend(members.into_iter().take(self.config.per_stratum).map(|cm| {
                Sample::from_comment(cm, key.reason(), self.config.excerpt_chars).with_stratum(stratum.clone())
            }));
        }
        out.truncate(max_total);
        out
    }

    /// Year and length strata, each given half of `target`, merged by id and
    /// then deduplicated by text.
    pub fn diverse(&self, comments: &[Comment], target: usize) -> DiverseSamples {
        let keys = [StratumKey::Year, StratumKey::Length];
        let per_key = target / keys.len();
        let mut seen = HashSet::new();
        let mut merged = Vec::new();
        for key in keys {
            for sample in self.stratified(comments, key, per_key) {
                if seen.insert(sample.id.clone()) {
                    merged.push(sample);
                }
            }
        }
        let deduped = dedup(merged, self.config.similarity_threshold, target);
        DiverseSamples {
            samples: deduped.kept,
            deduplicated: deduped.removed,
            strata_used: keys.to_vec(),
        }
    }

    /// Most-liked comments of each listed year, for explaining spikes.
    pub fn year_highlights(&self, comments: &[Comment], years: &[i32], per_year: usize) -> BTreeMap<i32, Vec<Sample>> {
        let mut out = BTreeMap::new();
        for year in years {
            let mut members: Vec<&Comment> = comments.iter().filter(|c| c.year() == Some(*year)).collect();
            if members.is_empty() {
                continue;
            }
            members.sort_by(|a, b| b.engagement.cmp(&a.engagement));
            let picked = members
                .into_iter()
                .take(per_year * 2)
                .map(|cm| Sample::from_comment(cm, SampleReason::AnomalyYear, self.config.excerpt_chars))
                .collect();
            out.insert(*year, self.collapse(picked, per_year));
        }
        out
    }
}
