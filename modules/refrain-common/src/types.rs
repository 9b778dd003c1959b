use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::RefrainError;
use crate::time;

// --- Acquisition tiers ---

/// The acquisition channel a comment came through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tier {
    /// Curated list the upstream considers representative.
    Hot,
    /// Offset-paged newest comments.
    Recent,
    /// Cursor-jumped historical comments.
    Yearly,
}

impl Tier {
    pub fn as_str(&self) -> &'static str {
        match self {
            Tier::Hot => "hot",
            Tier::Recent => "recent",
            Tier::Yearly => "yearly",
        }
    }
}

impl std::fmt::Display for Tier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Tier {
    type Err = RefrainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "hot" => Ok(Tier::Hot),
            "recent" => Ok(Tier::Recent),
            "yearly" => Ok(Tier::Yearly),
            other => Err(RefrainError::Validation(format!("unknown tier '{other}'"))),
        }
    }
}

// --- Sampling levels ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SamplingLevel {
    Quick,
    Standard,
    Deep,
}

impl SamplingLevel {
    pub const ALL: [SamplingLevel; 3] = [
        SamplingLevel::Quick,
        SamplingLevel::Standard,
        SamplingLevel::Deep,
    ];

    /// Number of stored comments this level aims for.
    pub fn target(&self) -> i64 {
        match self {
            SamplingLevel::Quick => 200,
            SamplingLevel::Standard => 600,
            SamplingLevel::Deep => 1000,
        }
    }

    /// The next level up, if any.
    pub fn upgrade(&self) -> Option<SamplingLevel> {
        match self {
            SamplingLevel::Quick => Some(SamplingLevel::Standard),
            SamplingLevel::Standard => Some(SamplingLevel::Deep),
            SamplingLevel::Deep => None,
        }
    }

    /// Highest level whose target `count` already reaches.
    pub fn reached_by(count: i64) -> Option<SamplingLevel> {
        Self::ALL
            .iter()
            .rev()
            .copied()
            .find(|level| count >= level.target())
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SamplingLevel::Quick => "quick",
            SamplingLevel::Standard => "standard",
            SamplingLevel::Deep => "deep",
        }
    }
}

impl std::fmt::Display for SamplingLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SamplingLevel {
    type Err = RefrainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "quick" => Ok(SamplingLevel::Quick),
            "standard" => Ok(SamplingLevel::Standard),
            "deep" => Ok(SamplingLevel::Deep),
            other => Err(RefrainError::Validation(format!(
                "unknown sampling level '{other}' (expected quick, standard or deep)"
            ))),
        }
    }
}

// --- Analytical dimensions ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DimensionId {
    Sentiment,
    Content,
    Temporal,
    Structural,
    Social,
    Linguistic,
}

impl DimensionId {
    pub const ALL: [DimensionId; 6] = [
        DimensionId::Sentiment,
        DimensionId::Content,
        DimensionId::Temporal,
        DimensionId::Structural,
        DimensionId::Social,
        DimensionId::Linguistic,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            DimensionId::Sentiment => "sentiment",
            DimensionId::Content => "content",
            DimensionId::Temporal => "temporal",
            DimensionId::Structural => "structural",
            DimensionId::Social => "social",
            DimensionId::Linguistic => "linguistic",
        }
    }
}

impl std::fmt::Display for DimensionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DimensionId {
    type Err = RefrainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        DimensionId::ALL
            .iter()
            .copied()
            .find(|d| d.as_str() == s)
            .ok_or_else(|| RefrainError::Validation(format!("unknown dimension '{s}'")))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SufficiencyLevel {
    Insufficient,
    Limited,
    Acceptable,
    Good,
}

impl SufficiencyLevel {
    /// `Limited` and `Insufficient` both call for more sampling.
    pub fn needs_more(&self) -> bool {
        matches!(self, SufficiencyLevel::Limited | SufficiencyLevel::Insufficient)
    }
}

impl std::fmt::Display for SufficiencyLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SufficiencyLevel::Good => write!(f, "good"),
            SufficiencyLevel::Acceptable => write!(f, "acceptable"),
            SufficiencyLevel::Limited => write!(f, "limited"),
            SufficiencyLevel::Insufficient => write!(f, "insufficient"),
        }
    }
}

// --- Records ---

/// One stored comment. Every wire format is converted into this at the ingestion boundary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Comment {
    pub id: String,
    pub target_id: String,
    pub text: String,
    pub engagement: i64,
    pub timestamp_ms: Option<i64>,
    pub tier: Tier,
    pub author: Option<String>,
    pub deleted_at_ms: Option<i64>,
    pub last_seen_at_ms: Option<i64>,
}

impl Comment {
    pub fn new(
        id: impl Into<String>,
        target_id: impl Into<String>,
        text: impl Into<String>,
        engagement: i64,
        timestamp_ms: Option<i64>,
        tier: Tier,
    ) -> Self {
        Self {
            id: id.into(),
            target_id: target_id.into(),
            text: text.into(),
            engagement: engagement.max(0),
            timestamp_ms: timestamp_ms.filter(|ts| *ts > 0),
            tier,
            author: None,
            deleted_at_ms: None,
            last_seen_at_ms: None,
        }
    }

    pub fn with_author(mut self, author: Option<String>) -> Self {
        self.author = author;
        self
    }

    pub fn year(&self) -> Option<i32> {
        self.timestamp_ms.and_then(time::year_of)
    }

    pub fn date(&self) -> Option<String> {
        self.timestamp_ms.and_then(time::date_of)
    }

    /// Length in characters, not bytes.
    pub fn char_len(&self) -> usize {
        self.text.chars().count()
    }

    pub fn is_deleted(&self) -> bool {
        self.deleted_at_ms.is_some()
    }

    pub fn is_high_engagement(&self) -> bool {
        self.engagement >= crate::quality::HIGH_ENGAGEMENT_LIKES
    }
}

/// The content item whose comments are collected.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TargetRecord {
    pub id: String,
    pub title: Option<String>,
    pub artist: Option<String>,
    /// Release year as known to the store. `None` falls back to the platform launch year.
    pub publish_year: Option<i32>,
    /// Last total reported by the upstream probe.
    pub api_total: Option<i64>,
    pub updated_at_ms: i64,
}

impl TargetRecord {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: None,
            artist: None,
            publish_year: None,
            api_total: None,
            updated_at_ms: time::now_ms(),
        }
    }

    /// Publish year clamped to the platform launch floor.
    pub fn effective_publish_year(&self) -> i32 {
        self.publish_year
            .unwrap_or(crate::quality::PLATFORM_LAUNCH_YEAR)
            .max(crate::quality::PLATFORM_LAUNCH_YEAR)
    }
}

/// Reject ids that cannot name a target: empty, or containing whitespace.
pub fn validate_target_id(target_id: &str) -> Result<(), RefrainError> {
    if target_id.trim().is_empty() || target_id.chars().any(char::is_whitespace) {
        return Err(RefrainError::Validation(format!("invalid target id '{target_id}'")));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn level_targets_and_upgrades() {
        assert_eq!(SamplingLevel::Quick.target(), 200);
        assert_eq!(SamplingLevel::Standard.target(), 600);
        assert_eq!(SamplingLevel::Deep.target(), 1000);
        assert_eq!(SamplingLevel::Quick.upgrade(), Some(SamplingLevel::Standard));
        assert_eq!(SamplingLevel::Deep.upgrade(), None);
    }

    #[test]
    fn reached_level_is_the_highest_target_met() {
        assert_eq!(SamplingLevel::reached_by(150), None);
        assert_eq!(SamplingLevel::reached_by(200), Some(SamplingLevel::Quick));
        assert_eq!(SamplingLevel::reached_by(999), Some(SamplingLevel::Standard));
        assert_eq!(SamplingLevel::reached_by(4000), Some(SamplingLevel::Deep));
    }

    #[test]
    fn unknown_level_is_a_validation_error() {
        let err = "extreme".parse::<SamplingLevel>().unwrap_err();
        assert!(matches!(err, RefrainError::Validation(_)));
        assert_eq!(" Deep ".parse::<SamplingLevel>().unwrap(), SamplingLevel::Deep);
    }

    #[test]
    fn zero_timestamp_becomes_unknown() {
        let c = Comment::new("1", "s", "hello", 3, Some(0), Tier::Recent);
        assert_eq!(c.timestamp_ms, None);
        assert_eq!(c.year(), None);
    }

    #[test]
    fn length_counts_characters() {
        let c = Comment::new("1", "s", "青春回忆", 0, None, Tier::Hot);
        assert_eq!(c.char_len(), 4);
    }

    #[test]
    fn publish_year_is_clamped_to_launch() {
        let mut t = TargetRecord::new("s");
        assert_eq!(t.effective_publish_year(), 2013);
        t.publish_year = Some(1998);
        assert_eq!(t.effective_publish_year(), 2013);
        t.publish_year = Some(2019);
        assert_eq!(t.effective_publish_year(), 2019);
    }

    #[test]
    fn target_ids_must_be_single_tokens() {
        assert!(validate_target_id("186016").is_ok());
        assert!(matches!(validate_target_id("  "), Err(RefrainError::Validation(_))));
        assert!(validate_target_id("12 34").is_err());
    }

    #[test]
    fn sufficiency_orders_worst_first() {
        assert!(SufficiencyLevel::Insufficient < SufficiencyLevel::Good);
        assert!(SufficiencyLevel::Limited.needs_more());
        assert!(!SufficiencyLevel::Acceptable.needs_more());
    }

    #[test]
    fn dimension_round_trips_through_str() {
        for d in DimensionId::ALL {
            assert_eq!(d.as_str().parse::<DimensionId>().unwrap(), d);
        }
    }
}
