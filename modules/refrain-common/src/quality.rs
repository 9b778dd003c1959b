/// A comment with at least this many likes counts as high engagement.
pub const HIGH_ENGAGEMENT_LIKES: i64 = 1000;

/// A comment with at least this many likes counts as viral.
pub const VIRAL_LIKES: i64 = 10_000;

/// Analysis reads never pull more than this many comments.
pub const MAX_ANALYSIS_SIZE: usize = 5000;

/// Below this many stored comments no analysis is served.
pub const MIN_COMMENTS_FOR_ANALYSIS: i64 = 100;

/// Publish years earlier than the platform's launch are clamped to it.
pub const PLATFORM_LAUNCH_YEAR: i32 = 2013;

/// Size of the curated hot tier.
pub const HOT_TIER_SIZE: usize = 15;

/// Upstream page size for both offset and cursor listings.
pub const PAGE_SIZE: u32 = 20;

/// Offset paging stops producing results past roughly this depth.
pub const RECENT_OFFSET_CEILING: u32 = 1000;

/// Old songs sample at most this many historical years.
pub const MAX_YEARS_TO_SAMPLE: u32 = 10;

// Length buckets, in characters (inclusive upper bounds).
pub const LENGTH_MICRO: usize = 10;
pub const LENGTH_SHORT: usize = 30;
pub const LENGTH_MEDIUM: usize = 80;
pub const LENGTH_LONG: usize = 200;

// Sentiment score bands.
pub const SCORE_HIGH: f64 = 0.6;
pub const SCORE_LOW: f64 = 0.4;
pub const SCORE_VERY_LOW: f64 = 0.3;
