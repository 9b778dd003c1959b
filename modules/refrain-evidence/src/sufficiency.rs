use serde::Serialize;

use refrain_common::{DimensionId, SufficiencyLevel};

/// Thresholds for one dimension. `good >= acceptable >= minimum`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Thresholds {
    pub good: i64,
    pub acceptable: i64,
    pub minimum: i64,
}

impl Thresholds {
    pub const fn new(good: i64, acceptable: i64, minimum: i64) -> Self {
        Self {
            good,
            acceptable,
            minimum,
        }
    }

    pub fn level(&self, current: i64) -> SufficiencyLevel {
        if current >= self.good {
            SufficiencyLevel::Good
        } else if current >= self.acceptable {
            SufficiencyLevel::Acceptable
        } else if current >= self.minimum {
            SufficiencyLevel::Limited
        } else {
            SufficiencyLevel::Insufficient
        }
    }

    /// Shortfall to the acceptable threshold.
    pub fn deficit(&self, current: i64) -> i64 {
        (self.acceptable - current).max(0)
    }
}

/// What a dimension's sufficiency is measured in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Basis {
    /// Stored comments.
    Volume,
    /// Distinct calendar years with at least one comment.
    YearsCovered,
    /// Comments at or above the high-engagement line.
    HighEngagement,
}

impl Basis {
    fn unit(&self) -> &'static str {
        match self {
            Basis::Volume => "comments",
            Basis::YearsCovered => "years covered",
            Basis::HighEngagement => "high-engagement comments",
        }
    }
}

/// Current store state as the evaluator sees it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SufficiencyInputs {
    pub volume: i64,
    pub years_covered: i64,
    pub high_engagement: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DimensionSufficiency {
    pub dimension: DimensionId,
    pub basis: Basis,
    pub current: i64,
    pub minimum: i64,
    pub acceptable: i64,
    pub good: i64,
    pub level: SufficiencyLevel,
    pub need_more: i64,
    pub reason: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SufficiencyThresholds {
    pub sentiment: Thresholds,
    pub content: Thresholds,
    pub temporal: Thresholds,
    pub structural: Thresholds,
    pub social: Thresholds,
    pub linguistic: Thresholds,
}

impl Default for SufficiencyThresholds {
    fn default() -> Self {
        Self {
            sentiment: Thresholds::new(300, 150, 50),
            content: Thresholds::new(200, 100, 30),
            temporal: Thresholds::new(5, 3, 2),
            structural: Thresholds::new(20, 10, 3),
            social: Thresholds::new(200, 100, 30),
            linguistic: Thresholds::new(200, 100, 30),
        }
    }
}

impl SufficiencyThresholds {
    pub fn for_dimension(&self, dimension: DimensionId) -> (Thresholds, Basis) {
        match dimension {
            DimensionId::Sentiment => (self.sentiment, Basis::Volume),
            DimensionId::Content => (self.content, Basis::Volume),
            DimensionId::Temporal => (self.temporal, Basis::YearsCovered),
            DimensionId::Structural => (self.structural, Basis::HighEngagement),
            DimensionId::Social => (self.social, Basis::Volume),
            DimensionId::Linguistic => (self.linguistic, Basis::Volume),
        }
    }

    /// Pure: the same inputs always give the same answer.
    pub fn evaluate(&self, dimension: DimensionId, inputs: &SufficiencyInputs) -> DimensionSufficiency {
        let (t, basis) = self.for_dimension(dimension);
        let current = match basis {
            Basis::Volume => inputs.volume,
            Basis::YearsCovered => inputs.years_covered,
            Basis::HighEngagement => inputs.high_engagement,
        };
        let level = t.level(current);
        let need_more = t.deficit(current);
        let reason = if need_more > 0 {
            format!(
                "{current} {unit}; {need_more} more needed for acceptable ({acceptable})",
                unit = basis.unit(),
                acceptable = t.acceptable
            )
        } else {
            format!("{current} {unit}; {level}", unit = basis.unit())
        };

        DimensionSufficiency {
            dimension,
            basis,
            current,
            minimum: t.minimum,
            acceptable: t.acceptable,
            good: t.good,
            level,
            need_more,
            reason,
        }
    }

    pub fn evaluate_all(&self, inputs: &SufficiencyInputs) -> Vec<DimensionSufficiency> {
        DimensionId::ALL.iter().map(|d| self.evaluate(*d, inputs)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn inputs(volume: i64, years: i64, hot: i64) -> SufficiencyInputs {
        SufficiencyInputs {
            volume,
            years_covered: years,
            high_engagement: hot,
        }
    }

    #[test]
    fn volume_dimensions_grade_on_comment_count() {
        let t = SufficiencyThresholds::default();
        let s = t.evaluate(DimensionId::Sentiment, &inputs(120, 0, 0));
        assert_eq!(s.level, SufficiencyLevel::Limited);
        assert_eq!(s.need_more, 30);

        let s = t.evaluate(DimensionId::Content, &inputs(250, 0, 0));
        assert_eq!(s.level, SufficiencyLevel::Good);
        assert_eq!(s.need_more, 0);
    }

    #[test]
    fn temporal_and_structural_use_their_own_basis() {
        let t = SufficiencyThresholds::default();
        let s = t.evaluate(DimensionId::Temporal, &inputs(5_000, 1, 0));
        assert_eq!(s.basis, Basis::YearsCovered);
        assert_eq!(s.level, SufficiencyLevel::Insufficient);
        assert_eq!(s.need_more, 2);

        let s = t.evaluate(DimensionId::Structural, &inputs(5_000, 9, 10));
        assert_eq!(s.level, SufficiencyLevel::Acceptable);
    }

    #[test]
    fn boundaries_are_inclusive() {
        let t = Thresholds::new(20, 10, 3);
        assert_eq!(t.level(20), SufficiencyLevel::Good);
        assert_eq!(t.level(10), SufficiencyLevel::Acceptable);
        assert_eq!(t.level(3), SufficiencyLevel::Limited);
        assert_eq!(t.level(2), SufficiencyLevel::Insufficient);
    }

    #[test]
    fn evaluate_all_covers_every_dimension_in_order() {
        let all = SufficiencyThresholds::default().evaluate_all(&inputs(0, 0, 0));
        let dims: Vec<DimensionId> = all.iter().map(|s| s.dimension).collect();
        assert_eq!(dims, DimensionId::ALL.to_vec());
    }
}
