use std::collections::{HashMap, HashSet};
use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;

use crate::knowledge::Lexicon;

static RE_HAN_RUN: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\p{Han}+").expect("valid regex"));
static RE_LATIN_WORD: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[A-Za-z]{2,}").expect("valid regex"));

/// Why a text got no sentiment score.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ScoreFailure {
    #[error("empty text")]
    Empty,
    #[error("analyzer could not score text: {0}")]
    Unscored(String),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Keyword {
    pub word: String,
    /// Relative to the strongest keyword, which has weight 1.0.
    pub weight: f64,
}

/// Text-level scoring and keyword extraction. Metrics never look at text any other way.
pub trait TextAnalyzer: Send + Sync {
    /// Sentiment in `[0, 1]`; 0.5 is neutral.
    fn score(&self, text: &str, lexicon: &Lexicon) -> Result<f64, ScoreFailure>;

    /// Up to `top_k` keywords over the whole corpus, strongest first.
    fn keywords(&self, texts: &[&str], top_k: usize, lexicon: &Lexicon) -> Vec<Keyword>;
}

// ---------------------------------------------------------------------------
// LexiconAnalyzer
// ---------------------------------------------------------------------------

/// Rule-based analyzer driven entirely by the lexicon.
///
/// Scores by counting positive and negative vocabulary. Keywords are lexicon
/// words plus Han bigrams and Latin words, weighted by term frequency times a
/// smoothed inverse document frequency.
#[derive(Debug, Clone, Copy, Default)]
pub struct LexiconAnalyzer;

const DICTIONARY_BOOST: f64 = 1.5;

impl TextAnalyzer for LexiconAnalyzer {
    fn score(&self, text: &str, lexicon: &Lexicon) -> Result<f64, ScoreFailure> {
        let text = text.trim();
        if text.is_empty() {
            return Err(ScoreFailure::Empty);
        }
        let count = |list: &[String]| list.iter().map(|w| text.matches(w.as_str()).count()).sum::<usize>();
        let pos = count(&lexicon.positive) as f64;
        let neg = count(&lexicon.negative) as f64;
        if pos + neg == 0.0 {
            return Ok(0.5);
        }
        Ok((0.5 + 0.45 * (pos - neg) / (pos + neg)).clamp(0.0, 1.0))
    }

    fn keywords(&self, texts: &[&str], top_k: usize, lexicon: &Lexicon) -> Vec<Keyword> {
        if texts.is_empty() || top_k == 0 {
            return Vec::new();
        }
        let vocab = lexicon.vocabulary();
        let known: HashSet<&str> = vocab.iter().copied().collect();
        let stop: HashSet<char> = lexicon.stop_chars.chars().collect();

        let mut tf: HashMap<String, usize> = HashMap::new();
        let mut df: HashMap<String, usize> = HashMap::new();
        let mut from_dictionary: HashSet<String> = HashSet::new();

        for text in texts {
            let mut in_doc: HashMap<String, usize> = HashMap::new();

            for word in &vocab {
                let n = text.matches(word).count();
                if n > 0 {
                    *in_doc.entry(word.to_string()).or_insert(0) += n;
                    from_dictionary.insert(word.to_string());
                }
            }
            for run in RE_HAN_RUN.find_iter(text) {
                let chars: Vec<char> = run.as_str().chars().collect();
                for pair in chars.windows(2) {
                    if pair.iter().any(|c| stop.contains(c)) {
                        continue;
                    }
                    let bigram: String = pair.iter().collect();
                    if known.contains(bigram.as_str()) {
                        continue;
                    }
                    *in_doc.entry(bigram).or_insert(0) += 1;
                }
            }
            for word in RE_LATIN_WORD.find_iter(text) {
                *in_doc.entry(word.as_str().to_lowercase()).or_insert(0) += 1;
            }

            for (token, n) in in_doc {
                *tf.entry(token.clone()).or_insert(0) += n;
                *df.entry(token).or_insert(0) += 1;
            }
        }

        let docs = texts.len() as f64;
        let mut scored: Vec<(String, f64)> = tf
            .into_iter()
            .map(|(token, n)| {
                let d = df.get(&token).copied().unwrap_or(1) as f64;
                let boost = if from_dictionary.contains(&token) { DICTIONARY_BOOST } else { 1.0 };
                let weight = n as f64 * (1.0 + docs / d).ln() * boost;
                (token, weight)
            })
            .collect();
        scored.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        scored.truncate(top_k);

        let max = scored.first().map(|(_, w)| *w).unwrap_or(1.0).max(f64::EPSILON);
        scored
            .into_iter()
            .map(|(word, w)| Keyword {
                word,
                weight: ((w / max) * 1000.0).round() / 1000.0,
            })
            .collect()
    }
}
