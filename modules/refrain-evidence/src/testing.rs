// Deterministic analyzer and comment fixtures for tests.

use std::collections::HashMap;

use refrain_common::time::mid_year_ms;
use refrain_common::{Comment, Tier};

use crate::analyzer::{Keyword, LexiconAnalyzer, ScoreFailure, TextAnalyzer};
use crate::knowledge::Lexicon;

/// Scores texts from a fixed table, falling back to a default score.
/// Keyword extraction is delegated to [`LexiconAnalyzer`].
pub struct FixedAnalyzer {
    default: Option<f64>,
    scores: HashMap<String, f64>,
}

impl FixedAnalyzer {
    pub fn new(default: f64) -> Self {
        Self {
            default: Some(default),
            scores: HashMap::new(),
        }
    }

    /// Only texts registered with [`FixedAnalyzer::with`] get a score.
    pub fn strict() -> Self {
        Self {
            default: None,
            scores: HashMap::new(),
        }
    }

    pub fn with(mut self, text: &str, score: f64) -> Self {
        self.scores.insert(text.to_string(), score);
        self
    }
}

impl TextAnalyzer for FixedAnalyzer {
    fn score(&self, text: &str, _lexicon: &Lexicon) -> Result<f64, ScoreFailure> {
        self.scores
            .get(text)
            .copied()
            .or(self.default)
            .ok_or_else(|| ScoreFailure::Unscored(text.to_string()))
    }

    fn keywords(&self, texts: &[&str], top_k: usize, lexicon: &Lexicon) -> Vec<Keyword> {
        LexiconAnalyzer.keywords(texts, top_k, lexicon)
    }
}

/// A comment on target `song` dated mid-2020.
pub fn comment(id: &str, text: &str, likes: i64) -> Comment {
    Comment::new(id, "song", text, likes, Some(mid_year_ms(2020)), Tier::Recent)
}

/// A comment on target `song` dated mid-`year`.
pub fn comment_in(id: &str, year: i32, likes: i64) -> Comment {
    Comment::new(id, "song", format!("{year}年的评论{id}"), likes, Some(mid_year_ms(year)), Tier::Recent)
}
