//! Progressive evidence about a target's comment section.
//!
//! [`EvidenceLayers`] serves the overview, dimension signals, verification
//! samples, keyword lookup and raw records over whatever the store holds.
//! Metrics read text only through a [`TextAnalyzer`]; the lexicon comes from
//! a [`KnowledgeCache`] built once and shared.

pub mod analyzer;
pub mod knowledge;
pub mod layers;
pub mod metrics;
pub mod selector;
pub mod signals;
pub mod sufficiency;

#[cfg(any(test, feature = "test-support"))]
pub mod testing;

pub use analyzer::{Keyword, LexiconAnalyzer, ScoreFailure, TextAnalyzer};
pub use knowledge::{KnowledgeCache, Lexicon, Theme};
pub use layers::{
    Blocking, EvidenceLayers, KeywordLookup, LayerConfig, LayerResponse, NextOption, Overview, RawRecord, RawRecords,
    SignalsView, VerificationSamples,
};
pub use metrics::DimensionMetrics;
pub use selector::{Anchors, Contrast, Sample, SampleReason, SampleSelector, SelectorConfig};
pub use signals::{CrossSignalDetector, Signal, SignalThresholds};
pub use sufficiency::{DimensionSufficiency, SufficiencyInputs, SufficiencyThresholds, Thresholds};
