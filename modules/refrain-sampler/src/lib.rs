//! Collects a comment sample for a target from the upstream API.
//!
//! [`TieredSampler`] combines three acquisition tiers: the curated hot list,
//! offset-paged recent comments, and cursor-jumped historical comments spread
//! over the target's lifetime. Quotas come from a [`SamplingPlan`]. Every page
//! goes through [`RetryPolicy`] and a [`Pacer`]; pages that cannot be fetched
//! are recorded on the report and never abort the run.

mod guidance;
mod ingest;
pub mod pacing;
pub mod plan;
mod probe;
pub mod refresh;
pub mod retry;
pub mod sampler;
pub mod traits;

#[cfg(any(test, feature = "test-support"))]
pub mod testing;

pub use guidance::{GuidanceStatus, SamplingGuidance};
pub use pacing::Pacer;
pub use plan::{SamplingPlan, Strategy};
pub use probe::SourceProbe;
pub use refresh::RefreshReport;
pub use retry::{FetchFailure, PageOutcome, RetryPolicy};
pub use sampler::{Coverage, SampleReport, SamplerConfig, StoreTotals, TierCounts, TierFailure, TieredSampler};
pub use traits::CommentSource;
