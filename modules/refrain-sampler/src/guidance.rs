use serde::Serialize;

use refrain_common::SamplingLevel;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum GuidanceStatus {
    /// At least 90% of the level's target is stored.
    Sufficient,
    /// At least 50%.
    Acceptable,
    Insufficient,
}

/// What the caller should make of a sampling run, judged on the store total.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SamplingGuidance {
    pub status: GuidanceStatus,
    pub message: String,
    pub temporal_note: String,
    pub next_action: String,
    pub upgrade_option: Option<SamplingLevel>,
}

pub fn guidance(
    level: SamplingLevel,
    stored: i64,
    years_span: i32,
    years_sampled: usize,
    added: u64,
) -> SamplingGuidance {
    let target = level.target();
    let (status, message) = if stored as f64 >= target as f64 * 0.9 {
        (
            GuidanceStatus::Sufficient,
            format!("store now has {stored}/{target} comments (+{added} new), ready for analysis"),
        )
    } else if stored as f64 >= target as f64 * 0.5 {
        (
            GuidanceStatus::Acceptable,
            format!("store now has {stored}/{target} comments (+{added} new), analysis possible; consider upgrading"),
        )
    } else {
        (
            GuidanceStatus::Insufficient,
            format!("store only has {stored}/{target} comments (+{added} new), deeper sampling recommended"),
        )
    };

    let temporal_note = if years_span <= 2 {
        "new song, temporal analysis limited".to_string()
    } else if years_sampled as f64 >= years_span as f64 * 0.8 {
        format!("good year coverage: {years_sampled}/{years_span} years")
    } else {
        format!("limited year coverage: {years_sampled}/{years_span} years")
    };

    let (next_action, upgrade_option) = match status {
        GuidanceStatus::Sufficient => ("signals".to_string(), None),
        _ => ("signals (or sample at a higher level)".to_string(), level.upgrade()),
    };

    SamplingGuidance {
        status,
        message,
        temporal_note,
        next_action,
        upgrade_option,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_follows_store_total_not_run_fetches() {
        let g = guidance(SamplingLevel::Standard, 540, 8, 8, 0);
        assert_eq!(g.status, GuidanceStatus::Sufficient);
        assert_eq!(g.upgrade_option, None);

        let g = guidance(SamplingLevel::Standard, 300, 8, 8, 300);
        assert_eq!(g.status, GuidanceStatus::Acceptable);
        assert_eq!(g.upgrade_option, Some(SamplingLevel::Deep));

        let g = guidance(SamplingLevel::Deep, 100, 8, 8, 100);
        assert_eq!(g.status, GuidanceStatus::Insufficient);
        assert_eq!(g.upgrade_option, None);
    }

    #[test]
    fn temporal_note_reflects_year_coverage() {
        assert!(guidance(SamplingLevel::Quick, 0, 1, 0, 0).temporal_note.starts_with("new song"));
        assert!(guidance(SamplingLevel::Quick, 0, 10, 8, 0).temporal_note.starts_with("good"));
        assert!(guidance(SamplingLevel::Quick, 0, 10, 3, 0).temporal_note.starts_with("limited"));
    }
}
