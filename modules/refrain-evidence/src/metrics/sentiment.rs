use serde::Serialize;
use tracing::debug;

use refrain_common::{Comment, HIGH_ENGAGEMENT_LIKES, SCORE_HIGH, SCORE_LOW, SCORE_VERY_LOW};

use super::{pct, ratio, round3};
use crate::analyzer::TextAnalyzer;
use crate::knowledge::Lexicon;

/// Texts shorter than this are not scored.
pub const MIN_SCORABLE_CHARS: usize = 3;

/// Per-comment sentiment scores, aligned with the comment slice they came from.
#[derive(Debug, Clone, Default)]
pub struct ScoreSet {
    pub scores: Vec<Option<f64>>,
    pub skipped_short: usize,
    pub failed: usize,
}

impl ScoreSet {
    pub fn compute(comments: &[Comment], analyzer: &dyn TextAnalyzer, lexicon: &Lexicon) -> Self {
        let mut set = ScoreSet {
            scores: Vec::with_capacity(comments.len()),
            ..Default::default()
        };
        for c in comments {
            if c.char_len() < MIN_SCORABLE_CHARS {
                set.skipped_short += 1;
                set.scores.push(None);
                continue;
            }
            match analyzer.score(&c.text, lexicon) {
                Ok(score) => set.scores.push(Some(score)),
                Err(e) => {
                    debug!(comment_id = %c.id, error = %e, "Comment not scored");
                    set.failed += 1;
                    set.scores.push(None);
                }
            }
        }
        set
    }

    /// Comments paired with their score, unscored ones left out.
    pub fn paired<'a>(&self, comments: &'a [Comment]) -> Vec<(&'a Comment, f64)> {
        comments
            .iter()
            .zip(&self.scores)
            .filter_map(|(c, s)| s.map(|s| (c, s)))
            .collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Consistency {
    High,
    Medium,
    Low,
}

impl Consistency {
    fn from_std(std: f64) -> Self {
        if std < 0.15 {
            Consistency::High
        } else if std < 0.25 {
            Consistency::Medium
        } else {
            Consistency::Low
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SentimentMetrics {
    pub scored: usize,
    pub skipped: usize,
    pub mean: f64,
    pub std: f64,
    pub high_ratio: f64,
    pub low_ratio: f64,
    pub consistency: Consistency,
    /// `None` when no high-engagement comment was scored.
    pub hot_mean: Option<f64>,
    pub normal_mean: f64,
    /// `normal_mean - hot_mean`.
    pub irony_gap: Option<f64>,
    /// Share of scored high-engagement comments at or below the very-low score line.
    pub hot_low_score_ratio: f64,
    pub hot_count: usize,
    pub signals: Vec<String>,
}

fn mean(values: &[f64]) -> Option<f64> {
    (!values.is_empty()).then(|| values.iter().sum::<f64>() / values.len() as f64)
}

pub fn compute(comments: &[Comment], scores: &ScoreSet) -> SentimentMetrics {
    let paired = scores.paired(comments);
    let all: Vec<f64> = paired.iter().map(|(_, s)| *s).collect();
    let n = all.len();

    let avg = mean(&all).unwrap_or(0.0);
    let variance = if n == 0 {
        0.0
    } else {
        all.iter().map(|s| (s - avg).powi(2)).sum::<f64>() / n as f64
    };
    let std = variance.sqrt();
    let high_ratio = ratio(all.iter().filter(|s| **s >= SCORE_HIGH).count(), n);
    let low_ratio = ratio(all.iter().filter(|s| **s <= SCORE_LOW).count(), n);

    let (hot, normal): (Vec<_>, Vec<_>) = paired
        .iter()
        .partition(|(c, _)| c.engagement >= HIGH_ENGAGEMENT_LIKES);
    let hot_scores: Vec<f64> = hot.iter().map(|(_, s)| *s).collect();
    let normal_scores: Vec<f64> = normal.iter().map(|(_, s)| *s).collect();

    let hot_mean = mean(&hot_scores);
    let normal_mean = mean(&normal_scores).unwrap_or(avg);
    let hot_count = hot_scores.len();
    let hot_low_score_ratio = ratio(hot_scores.iter().filter(|s| **s <= SCORE_VERY_LOW).count(), hot_count);

    let mut signals = Vec::new();
    if hot_count >= 5 && hot_low_score_ratio >= 0.2 {
        signals.push(format!(
            "{}% of high-engagement comments score <= 0.3 ({hot_count} high-engagement comments scored)",
            pct(hot_low_score_ratio)
        ));
    } else if hot_count >= 5 && hot_low_score_ratio >= 0.1 {
        signals.push(format!(
            "{}% of high-engagement comments score <= 0.3; worth checking the samples",
            pct(hot_low_score_ratio)
        ));
    }
    if std > 0.3 {
        signals.push(format!("scores are polarised (std {std:.2})"));
    }
    if low_ratio > 0.3 {
        signals.push(format!("{}% of comments score <= 0.4", pct(low_ratio)));
    }

    SentimentMetrics {
        scored: n,
        skipped: scores.skipped_short + scores.failed,
        mean: round3(avg),
        std: round3(std),
        high_ratio: round3(high_ratio),
        low_ratio: round3(low_ratio),
        consistency: Consistency::from_std(std),
        hot_mean: hot_mean.map(round3),
        normal_mean: round3(normal_mean),
        irony_gap: hot_mean.map(|h| round3(normal_mean - h)),
        hot_low_score_ratio: round3(hot_low_score_ratio),
        hot_count,
        signals,
    }
}
