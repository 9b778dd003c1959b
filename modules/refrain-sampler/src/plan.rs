use serde::Serialize;

use refrain_common::{SamplingLevel, HOT_TIER_SIZE, MAX_YEARS_TO_SAMPLE, PAGE_SIZE, RECENT_OFFSET_CEILING};

/// How the budget left after the hot tier is split between recent and historical tiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    /// Fewer comments upstream than the target: take everything reachable, no history.
    Cold,
    /// At most two years old: everything from the recent tier.
    New,
    /// 3-5 years: 20% recent, 80% historical.
    Medium,
    /// 6-10 years: 30% recent, 70% historical.
    Normal,
    /// Older than 10 years: 30% recent, 70% historical over the latest 10 years only.
    Old,
}

impl Strategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Strategy::Cold => "cold",
            Strategy::New => "new",
            Strategy::Medium => "medium",
            Strategy::Normal => "normal",
            Strategy::Old => "old",
        }
    }

    /// `(recent_ratio, yearly_ratio)` for the strategies that split the budget.
    fn ratios(&self) -> (f64, f64) {
        match self {
            Strategy::Cold | Strategy::New => (1.0, 0.0),
            Strategy::Medium => (0.2, 0.8),
            Strategy::Normal | Strategy::Old => (0.3, 0.7),
        }
    }
}

/// Tier quotas for one sampling invocation. Immutable once computed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SamplingPlan {
    pub level: SamplingLevel,
    pub target: i64,
    pub hot_count: usize,
    pub recent_count: usize,
    pub per_year_count: usize,
    pub effective_years: u32,
    pub strategy: Strategy,
}

impl SamplingPlan {
    pub fn compute(level: SamplingLevel, years_span: i32, api_total: u64) -> Self {
        let target = level.target();
        let hot_count = HOT_TIER_SIZE;
        let remaining = (target as usize).saturating_sub(hot_count);

        let flat = |strategy: Strategy, recent_count: usize| SamplingPlan {
            level,
            target,
            hot_count,
            recent_count,
            per_year_count: 0,
            effective_years: 0,
            strategy,
        };

        if (api_total as i64) < target {
            let reachable = api_total.min(RECENT_OFFSET_CEILING as u64) as usize;
            return flat(Strategy::Cold, reachable);
        }
        if years_span <= 2 {
            return flat(Strategy::New, remaining);
        }

        let (strategy, effective_years) = match years_span {
            3..=5 => (Strategy::Medium, years_span as u32),
            6..=10 => (Strategy::Normal, years_span as u32),
            _ => (Strategy::Old, MAX_YEARS_TO_SAMPLE),
        };
        let (recent_ratio, yearly_ratio) = strategy.ratios();

        // Truncating casts on purpose: 585 * 0.3 = 175.5 -> 175.
        let recent_count = (remaining as f64 * recent_ratio) as usize;
        let yearly_total = (remaining as f64 * yearly_ratio) as usize;
        let per_year_count = yearly_total / effective_years as usize;

        SamplingPlan {
            level,
            target,
            hot_count,
            recent_count,
            per_year_count,
            effective_years,
            strategy,
        }
    }

    pub fn has_history(&self) -> bool {
        self.per_year_count > 0 && self.effective_years > 0
    }

    /// Historical years to walk, newest first, never earlier than `publish_year`.
    pub fn years(&self, current_year: i32, publish_year: i32) -> Vec<i32> {
        if !self.has_history() {
            return Vec::new();
        }
        let oldest = (current_year - self.effective_years as i32 + 1).max(publish_year);
        (oldest..=current_year).rev().collect()
    }

    /// Cursor pages attempted per historical year before giving up on it.
    pub fn pages_per_year(&self, max_pages: u32) -> u32 {
        let needed = (self.per_year_count as u32).div_ceil(PAGE_SIZE) + 2;
        needed.min(max_pages)
    }
}

/// Inclusive span from publish year to now. Never below 1.
pub fn years_span(current_year: i32, publish_year: i32) -> i32 {
    (current_year - publish_year + 1).max(1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn standard_eight_year_song_uses_normal_split() {
        let plan = SamplingPlan::compute(SamplingLevel::Standard, 8, 50_000);
        assert_eq!(plan.strategy, Strategy::Normal);
        assert_eq!(plan.recent_count, 175);
        assert_eq!(plan.per_year_count, 409 / 8);
        assert_eq!(plan.per_year_count, 51);
        assert_eq!(plan.effective_years, 8);
    }

    #[test]
    fn small_corpus_is_cold_and_capped_by_the_offset_ceiling() {
        let plan = SamplingPlan::compute(SamplingLevel::Deep, 12, 480);
        assert_eq!(plan.strategy, Strategy::Cold);
        assert_eq!(plan.recent_count, 480);
        assert!(!plan.has_history());
        assert!(plan.years(2025, 2013).is_empty());
    }

    #[test]
    fn young_song_puts_everything_in_recent() {
        let plan = SamplingPlan::compute(SamplingLevel::Standard, 2, 10_000);
        assert_eq!(plan.strategy, Strategy::New);
        assert_eq!(plan.per_year_count, 0);
        assert_eq!(plan.recent_count, 600 - 15);
    }

    #[test]
    fn medium_song_is_mostly_historical() {
        let plan = SamplingPlan::compute(SamplingLevel::Quick, 4, 10_000);
        assert_eq!(plan.strategy, Strategy::Medium);
        // remaining 185: 37 recent, 148 historical over 4 years
        assert_eq!(plan.recent_count, 37);
        assert_eq!(plan.per_year_count, 37);
    }

    #[test]
    fn old_song_drops_oldest_years() {
        let plan = SamplingPlan::compute(SamplingLevel::Deep, 13, 100_000);
        assert_eq!(plan.strategy, Strategy::Old);
        assert_eq!(plan.effective_years, 10);
        let years = plan.years(2025, 2013);
        assert_eq!(years.len(), 10);
        assert_eq!(years.first(), Some(&2025));
        assert_eq!(years.last(), Some(&2016));
    }

    #[test]
    fn years_never_precede_publication() {
        let plan = SamplingPlan::compute(SamplingLevel::Standard, 5, 10_000);
        assert_eq!(plan.years(2025, 2021), vec![2025, 2024, 2023, 2022, 2021]);
    }

    #[test]
    fn page_budget_per_year_is_capped() {
        let plan = SamplingPlan::compute(SamplingLevel::Standard, 8, 50_000);
        // 51 per year -> 3 pages needed + 2 spare
        assert_eq!(plan.pages_per_year(8), 5);
        assert_eq!(plan.pages_per_year(4), 4);
    }

    #[test]
    fn span_counts_both_ends() {
        assert_eq!(years_span(2025, 2018), 8);
        assert_eq!(years_span(2025, 2025), 1);
        assert_eq!(years_span(2025, 2030), 1);
    }
}
