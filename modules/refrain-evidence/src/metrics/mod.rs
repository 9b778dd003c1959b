//! The six analytical dimensions. Each module is a pure function of the
//! comment slice (plus sentiment scores where needed) and emits its own
//! short factual signal strings.

pub mod content;
pub mod linguistic;
pub mod sentiment;
pub mod social;
pub mod structural;
pub mod temporal;

use serde::Serialize;

use refrain_common::Comment;

use crate::analyzer::TextAnalyzer;
use crate::knowledge::Lexicon;

pub use content::ContentMetrics;
pub use linguistic::{CommentStyle, LinguisticMetrics};
pub use sentiment::{Consistency, ScoreSet, SentimentMetrics};
pub use social::SocialMetrics;
pub use structural::StructuralMetrics;
pub use temporal::TemporalMetrics;

#[derive(Debug, Clone, Serialize)]
pub struct DimensionMetrics {
    pub sentiment: SentimentMetrics,
    pub content: ContentMetrics,
    pub temporal: TemporalMetrics,
    pub structural: StructuralMetrics,
    pub social: SocialMetrics,
    pub linguistic: LinguisticMetrics,
}

impl DimensionMetrics {
    pub fn compute(
        comments: &[Comment],
        scores: &ScoreSet,
        analyzer: &dyn TextAnalyzer,
        lexicon: &Lexicon,
        current_year: i32,
    ) -> Self {
        Self {
            sentiment: sentiment::compute(comments, scores),
            content: content::compute(comments, analyzer, lexicon),
            temporal: temporal::compute(comments, current_year),
            structural: structural::compute(comments),
            social: social::compute(comments),
            linguistic: linguistic::compute(comments, lexicon),
        }
    }
}

pub(crate) fn ratio(part: usize, whole: usize) -> f64 {
    if whole == 0 {
        0.0
    } else {
        part as f64 / whole as f64
    }
}

pub(crate) fn round3(v: f64) -> f64 {
    (v * 1000.0).round() / 1000.0
}

pub(crate) fn pct(v: f64) -> i64 {
    (v * 100.0) as i64
}
