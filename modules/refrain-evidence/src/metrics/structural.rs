use serde::Serialize;

use refrain_common::{Comment, LENGTH_LONG, LENGTH_MEDIUM, LENGTH_MICRO, LENGTH_SHORT};

use super::{pct, ratio, round3};

#[derive(Debug, Clone, Default, Serialize)]
pub struct HotLengthProfile {
    pub count: usize,
    /// Share at or below the short limit.
    pub short_ratio: f64,
    /// Share above the medium limit.
    pub long_ratio: f64,
    pub mean_length: f64,
    pub max_length: usize,
}

/// Shares of the main (non-high-engagement) sample per length bucket.
#[derive(Debug, Clone, Default, Serialize)]
pub struct LengthDistribution {
    pub micro: f64,
    pub short: f64,
    pub medium: f64,
    pub long: f64,
    pub extended: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct StructuralMetrics {
    pub hot: HotLengthProfile,
    pub main_sample_size: usize,
    pub length_distribution: LengthDistribution,
    pub main_mean_length: f64,
    pub signals: Vec<String>,
}

impl StructuralMetrics {
    /// Share of the main sample longer than the medium limit.
    pub fn long_share(&self) -> f64 {
        self.length_distribution.long + self.length_distribution.extended
    }
}

fn mean_len(lengths: &[usize]) -> f64 {
    if lengths.is_empty() {
        0.0
    } else {
        lengths.iter().sum::<usize>() as f64 / lengths.len() as f64
    }
}

pub fn compute(comments: &[Comment]) -> StructuralMetrics {
    let (hot, main): (Vec<&Comment>, Vec<&Comment>) = comments.iter().partition(|c| c.is_high_engagement());

    let hot_lengths: Vec<usize> = hot.iter().map(|c| c.char_len()).collect();
    let hot_profile = HotLengthProfile {
        count: hot_lengths.len(),
        short_ratio: round3(ratio(hot_lengths.iter().filter(|l| **l <= LENGTH_SHORT).count(), hot_lengths.len())),
        long_ratio: round3(ratio(hot_lengths.iter().filter(|l| **l > LENGTH_MEDIUM).count(), hot_lengths.len())),
        mean_length: round3(mean_len(&hot_lengths)),
        max_length: hot_lengths.iter().copied().max().unwrap_or(0),
    };

    let main_lengths: Vec<usize> = main.iter().map(|c| c.char_len()).collect();
    let mut buckets = [0usize; 5];
    for l in &main_lengths {
        let idx = match *l {
            l if l <= LENGTH_MICRO => 0,
            l if l <= LENGTH_SHORT => 1,
            l if l <= LENGTH_MEDIUM => 2,
            l if l <= LENGTH_LONG => 3,
            _ => 4,
        };
        buckets[idx] += 1;
    }
    let n = main_lengths.len();
    let length_distribution = LengthDistribution {
        micro: round3(ratio(buckets[0], n)),
        short: round3(ratio(buckets[1], n)),
        medium: round3(ratio(buckets[2], n)),
        long: round3(ratio(buckets[3], n)),
        extended: round3(ratio(buckets[4], n)),
    };

    let mut signals = Vec::new();
    if hot_profile.count == 0 {
        signals.push("no high-engagement comments in the sample".to_string());
    } else {
        if hot_profile.short_ratio >= 0.7 {
            signals.push(format!(
                "{}% of high-engagement comments are short (<= {LENGTH_SHORT} chars)",
                pct(hot_profile.short_ratio)
            ));
        }
        if hot_profile.long_ratio >= 0.3 {
            signals.push(format!(
                "{}% of high-engagement comments are long (> {LENGTH_MEDIUM} chars)",
                pct(hot_profile.long_ratio)
            ));
        }
        if hot_profile.mean_length > 50.0 {
            signals.push(format!(
                "high-engagement comments average {:.0} chars",
                hot_profile.mean_length
            ));
        }
    }

    StructuralMetrics {
        hot: hot_profile,
        main_sample_size: n,
        length_distribution,
        main_mean_length: round3(mean_len(&main_lengths)),
        signals,
    }
}
