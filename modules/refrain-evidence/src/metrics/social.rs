use serde::Serialize;

use refrain_common::{Comment, VIRAL_LIKES};

use super::{pct, round3};

#[derive(Debug, Clone, Serialize)]
pub struct SocialMetrics {
    pub total_likes: i64,
    pub mean_likes: f64,
    pub median_likes: i64,
    pub max_likes: i64,
    /// Size of the top 1% (at least one comment).
    pub top1_count: usize,
    /// Share of all likes held by the top 1%.
    pub concentration: f64,
    pub viral_count: usize,
    pub signals: Vec<String>,
}

pub fn compute(comments: &[Comment]) -> SocialMetrics {
    let mut likes: Vec<i64> = comments.iter().map(|c| c.engagement).collect();
    likes.sort_unstable_by(|a, b| b.cmp(a));
    let n = likes.len();

    let total_likes: i64 = likes.iter().sum();
    let top1_count = (n / 100).max(1).min(n);
    let top_likes: i64 = likes.iter().take(top1_count).sum();
    let concentration = if total_likes > 0 {
        top_likes as f64 / total_likes as f64
    } else {
        0.0
    };
    let viral_count = likes.iter().filter(|l| **l >= VIRAL_LIKES).count();

    let mut signals = Vec::new();
    if concentration > 0.5 {
        signals.push(format!(
            "top 1% of comments ({top1_count}) hold {}% of all likes",
            pct(concentration)
        ));
    }
    if viral_count > 0 {
        signals.push(format!("{viral_count} comment(s) passed {VIRAL_LIKES} likes"));
    }

    SocialMetrics {
        total_likes,
        mean_likes: if n == 0 { 0.0 } else { round3(total_likes as f64 / n as f64) },
        median_likes: likes.get(n / 2).copied().unwrap_or(0),
        max_likes: likes.first().copied().unwrap_or(0),
        top1_count,
        concentration: round3(concentration),
        viral_count,
        signals,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::comment;

    #[test]
    fn concentration_uses_at_least_one_comment() {
        let comments = vec![
            comment("a", "x", 12_000),
            comment("b", "x", 100),
            comment("c", "x", 50),
            comment("d", "x", 0),
        ];
        let m = compute(&comments);
        assert_eq!(m.top1_count, 1);
        assert_eq!(m.concentration, 0.988);
        assert_eq!(m.max_likes, 12_000);
        assert_eq!(m.median_likes, 50);
        assert_eq!(m.viral_count, 1);
        assert_eq!(m.signals.len(), 2);
    }

    #[test]
    fn empty_sample_is_all_zero() {
        let m = compute(&[]);
        assert_eq!(m.top1_count, 0);
        assert_eq!(m.concentration, 0.0);
        assert!(m.signals.is_empty());
    }
}
