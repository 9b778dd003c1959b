//! Cross-dimension rules.
//!
//! Each rule reads metrics from several dimensions and fires only when every
//! one of its conditions holds. A fired rule states the fact with the numbers
//! that triggered it and lists possible explanations without choosing one.

use std::collections::HashSet;

use serde::Serialize;
use serde_json::{json, Map, Value};

use crate::knowledge::Lexicon;
use crate::metrics::{CommentStyle, DimensionMetrics};

/// Rule cutoffs. All empirically chosen; callers may override any of them.
#[derive(Debug, Clone)]
pub struct SignalThresholds {
    pub melancholy_min_keywords: usize,
    pub melancholy_low_ratio: f64,
    pub melancholy_std: f64,
    pub empathy_story_share: f64,
    pub empathy_concentration: f64,
    /// Theme ids that count as emotional for the empathy rule.
    pub empathy_themes: Vec<String>,
    pub nostalgia_min_span: i32,
    pub nostalgia_long_share: f64,
    pub nostalgia_theme_share: f64,
    pub meme_short_share: f64,
    pub meme_hot_mean: f64,
    pub meme_hot_low_ratio: f64,
    pub event_ratio: f64,
    pub contrast_hot_low_ratio: f64,
    pub contrast_min_hot: usize,
    /// At or above this the high-likes-low-score pattern is called significant.
    pub contrast_significant_ratio: f64,
}

impl Default for SignalThresholds {
    fn default() -> Self {
        Self {
            melancholy_min_keywords: 2,
            melancholy_low_ratio: 0.25,
            melancholy_std: 0.25,
            empathy_story_share: 0.15,
            empathy_concentration: 0.3,
            empathy_themes: vec!["nostalgia".into(), "emotion".into(), "story".into()],
            nostalgia_min_span: 5,
            nostalgia_long_share: 0.1,
            nostalgia_theme_share: 0.2,
            meme_short_share: 0.6,
            meme_hot_mean: 0.45,
            meme_hot_low_ratio: 0.15,
            event_ratio: 2.0,
            contrast_hot_low_ratio: 0.1,
            contrast_min_hot: 5,
            contrast_significant_ratio: 0.2,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Signal {
    pub signal_id: &'static str,
    pub fact: String,
    pub raw_numbers: Map<String, Value>,
    pub possible_reasons: Vec<&'static str>,
    /// Where in the verification-samples response the corroborating exhibits are.
    pub samples_location: String,
    pub ai_action: String,
}

fn numbers(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}

pub struct CrossSignalDetector {
    thresholds: SignalThresholds,
}

impl Default for CrossSignalDetector {
    fn default() -> Self {
        Self::new(SignalThresholds::default())
    }
}

impl CrossSignalDetector {
    pub fn new(thresholds: SignalThresholds) -> Self {
        Self { thresholds }
    }

    /// Fired signals in rule order.
    pub fn detect(&self, m: &DimensionMetrics, lexicon: &Lexicon) -> Vec<Signal> {
        [
            self.melancholy(m, lexicon),
            self.empathy(m),
            self.nostalgia_depth(m),
            self.meme_culture(m),
            self.event_driven(m),
            self.high_likes_low_score(m),
        ]
        .into_iter()
        .flatten()
        .collect()
    }

    fn melancholy(&self, m: &DimensionMetrics, lexicon: &Lexicon) -> Option<Signal> {
        let t = &self.thresholds;
        let vocabulary: HashSet<&str> = lexicon.melancholy.iter().map(String::as_str).collect();
        let matched: Vec<&str> = m
            .content
            .top_keywords
            .iter()
            .map(|k| k.word.as_str())
            .filter(|w| vocabulary.contains(w))
            .collect();
        let low = m.sentiment.low_ratio;
        let std = m.sentiment.std;
        let negative = low >= t.melancholy_low_ratio;
        let polarised = std >= t.melancholy_std;
        if matched.len() < t.melancholy_min_keywords || !(negative || polarised) {
            return None;
        }

        let condition = if negative {
            format!("{}% of comments score <= 0.4", (low * 100.0) as i64)
        } else {
            format!("scores are spread out (std {std:.2})")
        };
        let shown: Vec<&str> = matched.iter().take(3).copied().collect();
        Some(Signal {
            signal_id: "melancholy_pattern",
            fact: format!(
                "sad keywords ({}) are {} of the top keywords, and {condition}",
                shown.join(", "),
                matched.len()
            ),
            raw_numbers: numbers(json!({
                "matched_keywords": matched,
                "keyword_count": matched.len(),
                "low_score_ratio": low,
                "sentiment_std": std,
            })),
            possible_reasons: vec![
                "genuine emotional resonance triggered by the song",
                "imitative late-night sadness posting",
                "the comment section used as an outlet for the listener's own mood",
                "the scorer reacting to sad words without their context",
            ],
            samples_location: "samples.anchors.most_liked".into(),
            ai_action: format!(
                "Read the most-liked samples and use keyword_lookup on '{}'. Are the sad words sincere or a running joke? What is the overall mood?",
                shown.first().copied().unwrap_or_default()
            ),
        })
    }

    fn empathy(&self, m: &DimensionMetrics) -> Option<Signal> {
        let t = &self.thresholds;
        let story = m.linguistic.share(CommentStyle::Story);
        let concentration = m.social.concentration;
        let top_theme = m.content.top_theme()?;
        let emotional = t.empathy_themes.iter().any(|id| *id == top_theme.id);
        if story < t.empathy_story_share || !emotional || concentration < t.empathy_concentration {
            return None;
        }

        Some(Signal {
            signal_id: "empathy_culture_pattern",
            fact: format!(
                "story comments are {}%, the top theme is '{}', and the top 1% of comments hold {}% of likes",
                (story * 100.0) as i64,
                top_theme.id,
                (concentration * 100.0) as i64
            ),
            raw_numbers: numbers(json!({
                "story_ratio": story,
                "top_theme": top_theme.id,
                "concentration": concentration,
            })),
            possible_reasons: vec![
                "the song brings back listeners' own memories",
                "the section has become a community that rewards shared stories",
                "a collective release of nostalgia",
                "long story comments simply attract more likes",
            ],
            samples_location: "samples.anchors.longest".into(),
            ai_action: "Read the longest samples. What do the liked stories have in common, and what is the shared emotional core?".into(),
        })
    }

    fn nostalgia_depth(&self, m: &DimensionMetrics) -> Option<Signal> {
        let t = &self.thresholds;
        let span = m.temporal.span_years;
        let long = m.structural.long_share();
        let nostalgia = m.content.theme_percentage("nostalgia");
        if span < t.nostalgia_min_span || long < t.nostalgia_long_share || nostalgia < t.nostalgia_theme_share {
            return None;
        }

        Some(Signal {
            signal_id: "nostalgia_depth_pattern",
            fact: format!(
                "comments span {span} years, long comments (> 80 chars) are {}%, and nostalgia words are {}% of theme matches",
                (long * 100.0) as i64,
                (nostalgia * 100.0) as i64
            ),
            raw_numbers: numbers(json!({
                "time_span_years": span,
                "long_comment_ratio": long,
                "nostalgia_percentage": nostalgia,
            })),
            possible_reasons: vec![
                "an older song that keeps drawing new and returning listeners",
                "the song is tied to listeners' coming of age",
                "years of accumulated feeling in the comment section",
                "long-form commenters tend to share deeper memories",
            ],
            samples_location: "samples.anchors.earliest".into(),
            ai_action: "Compare the earliest and latest samples. How do early and recent comments differ, and what exactly is being remembered?".into(),
        })
    }

    fn meme_culture(&self, m: &DimensionMetrics) -> Option<Signal> {
        let t = &self.thresholds;
        let short = m.linguistic.share(CommentStyle::Short) + m.linguistic.share(CommentStyle::Meme);
        let hot_mean = m.sentiment.hot_mean.unwrap_or(0.5);
        let hot_low = m.sentiment.hot_low_score_ratio;
        let low_hot_sentiment = hot_mean <= t.meme_hot_mean || hot_low >= t.meme_hot_low_ratio;
        if short < t.meme_short_share || !low_hot_sentiment {
            return None;
        }

        Some(Signal {
            signal_id: "meme_culture_pattern",
            fact: format!(
                "short and meme comments are {}%, high-engagement comments average a score of {hot_mean:.2}",
                (short * 100.0) as i64
            ),
            raw_numbers: numbers(json!({
                "short_ratio": short,
                "hot_sentiment_mean": hot_mean,
                "hot_low_score_ratio": hot_low,
            })),
            possible_reasons: vec![
                "the section runs on banter and in-jokes",
                "copy-paste repetition of a popular line",
                "the scorer misreads internet slang",
                "liked short comments are early-floor or placeholder posts",
            ],
            samples_location: "samples.anchors.most_liked".into(),
            ai_action: "Read the most-liked samples. What do the liked short comments say, do they repeat a meme, and can the scores be trusted?".into(),
        })
    }

    fn event_driven(&self, m: &DimensionMetrics) -> Option<Signal> {
        let anomalies = m.temporal.anomalies_at(self.thresholds.event_ratio);
        let top = anomalies.first()?;
        let keywords: Vec<&str> = m.content.top_keywords.iter().take(5).map(|k| k.word.as_str()).collect();
        let top_theme = m.content.top_theme().map(|t| t.id.as_str()).unwrap_or("unknown");

        Some(Signal {
            signal_id: "event_driven_pattern",
            fact: format!(
                "{} has {}x the average number of high-engagement comments",
                top.year, top.ratio
            ),
            raw_numbers: numbers(json!({
                "anomaly_year": top.year,
                "ratio": top.ratio,
                "top_keywords": keywords,
                "top_theme": top_theme,
            })),
            possible_reasons: vec![
                "the song was used in a popular show or video",
                "news or activity around the artist",
                "a cover or remix went around",
                "a social-media wave of nostalgia",
                "organic growth while the song was rising",
            ],
            samples_location: format!("samples.year_highlights.{}", top.year),
            ai_action: format!(
                "Read the {} samples. Do they mention a specific event? Do the keywords ({}) hint at a cause?",
                top.year,
                keywords.iter().take(3).copied().collect::<Vec<_>>().join(", ")
            ),
        })
    }

    fn high_likes_low_score(&self, m: &DimensionMetrics) -> Option<Signal> {
        let t = &self.thresholds;
        let ratio = m.sentiment.hot_low_score_ratio;
        let hot = m.sentiment.hot_count;
        if ratio < t.contrast_hot_low_ratio || hot < t.contrast_min_hot {
            return None;
        }
        let strength = if ratio >= t.contrast_significant_ratio {
            "significant"
        } else {
            "moderate"
        };

        Some(Signal {
            signal_id: "high_likes_low_score_pattern",
            fact: format!(
                "{}% of high-engagement comments (>= 1000 likes) score <= 0.3",
                (ratio * 100.0) as i64
            ),
            raw_numbers: numbers(json!({
                "hot_low_score_ratio": ratio,
                "hot_comment_count": hot,
                "sentiment_gap": m.sentiment.irony_gap.unwrap_or(0.0),
                "pattern_strength": strength,
            })),
            possible_reasons: vec![
                "irony or mock complaint that is really praise",
                "poetic phrasing the scorer reads as negative",
                "heartfelt lament, such as saying the song ruined one's youth",
                "slang or memes the scorer does not understand",
                "genuinely negative feeling",
            ],
            samples_location: "samples.contrast.high_likes_low_score".into(),
            ai_action: "Read the high_likes_low_score samples before concluding anything. Decide for each whether the low score is a misreading or real negativity; poetic lines are often misread.".into(),
        })
    }
}
