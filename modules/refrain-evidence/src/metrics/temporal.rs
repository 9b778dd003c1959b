use std::collections::BTreeMap;

use serde::Serialize;

use refrain_common::Comment;

/// A year whose high-engagement count is far above the per-year mean.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnomalyYear {
    pub year: i32,
    pub high_engagement: usize,
    /// Count over the per-year mean, one decimal.
    pub ratio: f64,
}

/// Default spike ratio for [`TemporalMetrics::anomaly_years`].
pub const ANOMALY_RATIO: f64 = 2.0;

#[derive(Debug, Clone, Serialize)]
pub struct TemporalMetrics {
    pub first_year: Option<i32>,
    pub last_year: Option<i32>,
    pub span_years: i32,
    pub years_with_data: usize,
    pub missing_years: Vec<i32>,
    /// Stored comments per year. Shaped by the sampling quotas, not by
    /// upstream activity, so it says nothing about popularity over time.
    pub sample_timeline: BTreeMap<i32, usize>,
    /// High-engagement comments per year.
    pub hot_timeline: BTreeMap<i32, usize>,
    pub total_hot: usize,
    /// Highest ratio first.
    pub anomaly_years: Vec<AnomalyYear>,
    pub signals: Vec<String>,
}

impl TemporalMetrics {
    /// Anomaly years at a ratio other than the default.
    pub fn anomalies_at(&self, min_ratio: f64) -> Vec<AnomalyYear> {
        anomalies(&self.hot_timeline, self.years_with_data, min_ratio)
    }
}

/// Years whose high-engagement count is at least `min_ratio` times the mean
/// over `years_with_data`. Highest ratio first.
pub fn anomalies(hot_timeline: &BTreeMap<i32, usize>, years_with_data: usize, min_ratio: f64) -> Vec<AnomalyYear> {
    let total_hot: usize = hot_timeline.values().sum();
    if years_with_data < 2 || total_hot == 0 {
        return Vec::new();
    }
    let mean = total_hot as f64 / years_with_data as f64;
    let mut out: Vec<AnomalyYear> = hot_timeline
        .iter()
        .filter_map(|(&year, &count)| {
            let r = count as f64 / mean;
            (r >= min_ratio).then(|| AnomalyYear {
                year,
                high_engagement: count,
                ratio: (r * 10.0).round() / 10.0,
            })
        })
        .collect();
    out.sort_by(|a, b| b.ratio.total_cmp(&a.ratio).then(a.year.cmp(&b.year)));
    out
}

pub fn compute(comments: &[Comment], current_year: i32) -> TemporalMetrics {
    let mut sample_timeline: BTreeMap<i32, usize> = BTreeMap::new();
    let mut hot_timeline: BTreeMap<i32, usize> = BTreeMap::new();
    for c in comments {
        let Some(year) = c.year() else { continue };
        *sample_timeline.entry(year).or_insert(0) += 1;
        if c.is_high_engagement() {
            *hot_timeline.entry(year).or_insert(0) += 1;
        }
    }

    let first_year = sample_timeline.keys().next().copied();
    let last_year = sample_timeline.keys().next_back().copied();
    let span_years = match (first_year, last_year) {
        (Some(first), Some(last)) if last > first => last - first + 1,
        (Some(_), Some(_)) => 1,
        _ => 0,
    };
    let missing_years: Vec<i32> = match (first_year, last_year) {
        (Some(first), Some(last)) => (first..=last).filter(|y| !sample_timeline.contains_key(y)).collect(),
        _ => Vec::new(),
    };
    let years_with_data = sample_timeline.len();
    let total_hot: usize = hot_timeline.values().sum();

    let anomaly_years = anomalies(&hot_timeline, years_with_data, ANOMALY_RATIO);

    let mut signals = Vec::new();
    if let (Some(first), Some(last)) = (first_year, last_year) {
        if span_years >= 5 {
            signals.push(format!("comments span {span_years} years ({first}-{last})"));
        } else if span_years <= 2 {
            signals.push(format!("comments cover only {span_years} year(s)"));
        }
        if !missing_years.is_empty() {
            let listed: Vec<String> = missing_years.iter().map(i32::to_string).collect();
            signals.push(format!("no comments sampled for {}", listed.join(", ")));
        }
        if let Some((year, count)) = hot_timeline.iter().max_by(|a, b| a.1.cmp(b.1).then(b.0.cmp(a.0))) {
            if *count >= 5 {
                signals.push(format!("{year} has the most high-engagement comments ({count})"));
            }
        }
        if last < current_year - 1 {
            signals.push(format!("latest comment is from {last}; the section may have gone quiet"));
        }
    }

    TemporalMetrics {
        first_year,
        last_year,
        span_years,
        years_with_data,
        missing_years,
        sample_timeline,
        hot_timeline,
        total_hot,
        anomaly_years,
        signals,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::comment_in;

    #[test]
    fn span_and_missing_years() {
        let comments = vec![
            comment_in("a", 2016, 1),
            comment_in("b", 2018, 1),
            comment_in("c", 2021, 1),
        ];
        let m = compute(&comments, 2025);
        assert_eq!(m.span_years, 6);
        assert_eq!(m.missing_years, vec![2017, 2019, 2020]);
        assert_eq!(m.years_with_data, 3);
        assert!(m.signals.iter().any(|s| s.contains("2021; the section may have gone quiet")));
    }

    #[test]
    fn single_year_spans_one() {
        let m = compute(&[comment_in("a", 2024, 1)], 2025);
        assert_eq!(m.span_years, 1);
        assert!(m.missing_years.is_empty());
        assert!(m.anomaly_years.is_empty());
    }

    #[test]
    fn high_engagement_spike_is_an_anomaly() {
        let mut comments = Vec::new();
        for i in 0..6 {
            comments.push(comment_in(&format!("spike{i}"), 2020, 5_000));
        }
        for (i, year) in [2018, 2019, 2021].into_iter().enumerate() {
            comments.push(comment_in(&format!("hot{i}"), year, 2_000));
        }
        let m = compute(&comments, 2025);
        // 9 hot over 4 years: mean 2.25, 2020 has 6 -> 2.7
        assert_eq!(m.total_hot, 9);
        assert_eq!(m.anomaly_years.len(), 1);
        assert_eq!(m.anomaly_years[0].year, 2020);
        assert_eq!(m.anomaly_years[0].ratio, 2.7);
        assert!(m.signals.iter().any(|s| s.starts_with("2020 has the most")));
    }

    #[test]
    fn lower_ratio_admits_milder_spikes() {
        let mut comments = Vec::new();
        for i in 0..3 {
            comments.push(comment_in(&format!("a{i}"), 2020, 2_000));
        }
        comments.push(comment_in("b", 2021, 2_000));
        comments.push(comment_in("c", 2022, 2_000));
        let m = compute(&comments, 2025);
        // 5 hot over 3 years: 2020 sits at 1.8
        assert!(m.anomaly_years.is_empty());
        let milder = m.anomalies_at(1.5);
        assert_eq!(milder.len(), 1);
        assert_eq!(milder[0].year, 2020);
        assert_eq!(milder[0].ratio, 1.8);
    }
}
