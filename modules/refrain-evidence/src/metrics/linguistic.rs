use std::collections::BTreeMap;

use serde::Serialize;

use refrain_common::Comment;

use super::{pct, ratio, round3};
use crate::knowledge::Lexicon;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum CommentStyle {
    Short,
    Meme,
    Story,
    Review,
}

impl CommentStyle {
    pub const ALL: [CommentStyle; 4] = [
        CommentStyle::Short,
        CommentStyle::Meme,
        CommentStyle::Story,
        CommentStyle::Review,
    ];
}

/// Rule order matters: very short first, then music talk, then stories.
pub fn classify(text: &str, lexicon: &Lexicon) -> CommentStyle {
    let len = text.chars().count();
    if len < 6 {
        return CommentStyle::Short;
    }
    let hits = |list: &[String]| list.iter().filter(|w| text.contains(w.as_str())).count();
    if hits(&lexicon.music_terms) >= 2 {
        return CommentStyle::Review;
    }
    if hits(&lexicon.story_markers) >= 2 && len >= 30 {
        return CommentStyle::Story;
    }
    match len {
        15..=30 => CommentStyle::Meme,
        l if l < 15 => CommentStyle::Short,
        _ => CommentStyle::Meme,
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct LinguisticMetrics {
    pub type_distribution: BTreeMap<CommentStyle, f64>,
    pub dominant: Option<CommentStyle>,
    pub signals: Vec<String>,
}

impl LinguisticMetrics {
    pub fn share(&self, style: CommentStyle) -> f64 {
        self.type_distribution.get(&style).copied().unwrap_or(0.0)
    }
}

pub fn compute(comments: &[Comment], lexicon: &Lexicon) -> LinguisticMetrics {
    let mut counts: BTreeMap<CommentStyle, usize> = CommentStyle::ALL.iter().map(|s| (*s, 0)).collect();
    for c in comments {
        *counts.entry(classify(&c.text, lexicon)).or_insert(0) += 1;
    }
    let n = comments.len();
    let dominant = counts
        .iter()
        .filter(|(_, count)| **count > 0)
        .max_by(|a, b| a.1.cmp(b.1).then(b.0.cmp(a.0)))
        .map(|(style, _)| *style);
    let type_distribution: BTreeMap<CommentStyle, f64> =
        counts.into_iter().map(|(style, count)| (style, round3(ratio(count, n)))).collect();

    let mut signals = Vec::new();
    let short = type_distribution.get(&CommentStyle::Short).copied().unwrap_or(0.0);
    let story = type_distribution.get(&CommentStyle::Story).copied().unwrap_or(0.0);
    if short > 0.6 {
        signals.push(format!("{}% of comments are short reactions", pct(short)));
    }
    if story > 0.2 {
        signals.push(format!("{}% of comments tell a personal story", pct(story)));
    }

    LinguisticMetrics {
        type_distribution,
        dominant,
        signals,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::comment;

    #[test]
    fn classification_checks_rules_in_order() {
        let lex = Lexicon::builtin();
        assert_eq!(classify("好听", &lex), CommentStyle::Short);
        assert_eq!(classify("这编曲和旋律都太绝了", &lex), CommentStyle::Review);
        let story = "记得那年夏天第一次听到这首歌的时候，我还在读高中，后来我们都各奔东西了";
        assert_eq!(classify(story, &lex), CommentStyle::Story);
        assert_eq!(classify("今天也是想听这首歌的一天呢呢呢", &lex), CommentStyle::Meme);
        assert_eq!(classify("单曲循环了一整天", &lex), CommentStyle::Short);
    }

    #[test]
    fn distribution_covers_every_style() {
        let lex = Lexicon::builtin();
        let comments = vec![comment("a", "好", 1), comment("b", "好听", 1), comment("c", "绝了", 1)];
        let m = compute(&comments, &lex);
        assert_eq!(m.type_distribution.len(), 4);
        assert_eq!(m.share(CommentStyle::Short), 1.0);
        assert_eq!(m.share(CommentStyle::Review), 0.0);
        assert_eq!(m.dominant, Some(CommentStyle::Short));
        assert_eq!(m.signals.len(), 1);
    }
}
