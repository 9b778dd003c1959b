use std::collections::HashSet;

use serde::Serialize;

use refrain_common::Comment;

use super::{pct, ratio, round3};
use crate::analyzer::TextAnalyzer;
use crate::knowledge::Lexicon;

const TOP_KEYWORDS: usize = 20;
/// Keywords whose document frequency is counted.
const DOC_FREQ_KEYWORDS: usize = 10;
/// Texts scanned for theme words.
const THEME_SCAN_TEXTS: usize = 100;
const TOP_THEMES: usize = 5;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct KeywordStat {
    pub word: String,
    pub weight: f64,
    /// Comments containing the word. Only counted for the strongest keywords.
    pub doc_freq: Option<usize>,
    pub doc_ratio: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ThemeShare {
    pub id: String,
    pub label: String,
    /// Theme words found among the keywords or the scanned texts.
    pub score: usize,
    /// Share of all theme matches.
    pub percentage: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct ContentMetrics {
    pub top_keywords: Vec<KeywordStat>,
    /// Strongest first.
    pub themes: Vec<ThemeShare>,
    pub avg_length: f64,
    pub signals: Vec<String>,
}

impl ContentMetrics {
    pub fn top_theme(&self) -> Option<&ThemeShare> {
        self.themes.first()
    }

    pub fn theme_percentage(&self, id: &str) -> f64 {
        self.themes.iter().find(|t| t.id == id).map(|t| t.percentage).unwrap_or(0.0)
    }
}

pub fn compute(comments: &[Comment], analyzer: &dyn TextAnalyzer, lexicon: &Lexicon) -> ContentMetrics {
    let texts: Vec<&str> = comments.iter().map(|c| c.text.as_str()).filter(|t| !t.trim().is_empty()).collect();
    let n = texts.len();

    let top_keywords: Vec<KeywordStat> = analyzer
        .keywords(&texts, TOP_KEYWORDS, lexicon)
        .into_iter()
        .enumerate()
        .map(|(i, kw)| {
            let doc_freq = (i < DOC_FREQ_KEYWORDS).then(|| texts.iter().filter(|t| t.contains(&kw.word)).count());
            KeywordStat {
                doc_ratio: doc_freq.map(|d| round3(ratio(d, n))),
                doc_freq,
                word: kw.word,
                weight: kw.weight,
            }
        })
        .collect();

    let keyword_set: HashSet<&str> = top_keywords.iter().map(|k| k.word.as_str()).collect();
    let scanned = &texts[..n.min(THEME_SCAN_TEXTS)];
    let raw: Vec<(&str, &str, usize)> = lexicon
        .themes
        .iter()
        .map(|theme| {
            let score = theme
                .words
                .iter()
                .filter(|w| keyword_set.contains(w.as_str()) || scanned.iter().any(|t| t.contains(w.as_str())))
                .count();
            (theme.id.as_str(), theme.label.as_str(), score)
        })
        .collect();
    let total: usize = raw.iter().map(|(_, _, s)| s).sum();

    let mut themes: Vec<ThemeShare> = raw
        .into_iter()
        .filter(|(_, _, s)| *s > 0)
        .map(|(id, label, score)| ThemeShare {
            id: id.to_string(),
            label: label.to_string(),
            score,
            percentage: round3(ratio(score, total)),
        })
        .collect();
    // Stable: ties keep lexicon order.
    themes.sort_by(|a, b| b.score.cmp(&a.score));
    themes.truncate(TOP_THEMES);

    let avg_length = if comments.is_empty() {
        0.0
    } else {
        comments.iter().map(Comment::char_len).sum::<usize>() as f64 / comments.len() as f64
    };

    let mut signals = Vec::new();
    if let Some(top) = themes.first().filter(|t| t.percentage > 0.5) {
        signals.push(format!(
            "theme '{}' dominates ({}% of theme matches)",
            top.id,
            pct(top.percentage)
        ));
    }
    if let Some(kw) = top_keywords.first() {
        if let (Some(df), Some(r)) = (kw.doc_freq, kw.doc_ratio) {
            signals.push(format!("top keyword '{}' appears in {df} comments ({}%)", kw.word, pct(r)));
        }
    }

    ContentMetrics {
        top_keywords,
        themes,
        avg_length: round3(avg_length),
        signals,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzer::LexiconAnalyzer;
    use crate::testing::comment;

    #[test]
    fn themes_are_ranked_by_matched_words() {
        let comments = vec![
            comment("a", "青春的回忆，那年夏天", 1),
            comment("b", "想起曾经的时光", 1),
            comment("c", "旋律好听", 1),
        ];
        let m = compute(&comments, &LexiconAnalyzer, &Lexicon::builtin());

        let top = m.top_theme().unwrap();
        assert_eq!(top.id, "nostalgia");
        // nostalgia: 青春 回忆 那年 时光 曾经 想起 = 6; music: 旋律 好听 = 2
        assert_eq!(top.score, 6);
        assert_eq!(m.theme_percentage("music"), 0.25);
        assert_eq!(m.theme_percentage("story"), 0.0);
    }

    #[test]
    fn top_keywords_carry_document_frequency() {
        let comments = vec![
            comment("a", "回忆回忆", 1),
            comment("b", "满满的回忆", 1),
            comment("c", "别的东西", 1),
            comment("d", "", 1),
        ];
        let m = compute(&comments, &LexiconAnalyzer, &Lexicon::builtin());
        let kw = &m.top_keywords[0];
        assert_eq!(kw.word, "回忆");
        assert_eq!(kw.doc_freq, Some(2));
        assert_eq!(kw.doc_ratio, Some(0.667));
        assert!(m.signals.iter().any(|s| s.contains("appears in 2 comments")));
    }
}
