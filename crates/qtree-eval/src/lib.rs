//! # qtree-eval
//!
//! Measuring learned query trees against reference queries.
//!
//! - [`scoring`]: exact and count-based scoring of a tree against a reference
//! - [`cache`] / [`retry`]: endpoint decorators used by the harness
//! - [`matching`]: the best matching tree among ranked solutions
//! - [`harness`]: the parallel evaluation loop and its [`EvaluationReport`]

pub mod cache;
pub mod error;
pub mod harness;
pub mod matching;
pub mod report;
pub mod retry;
pub mod scoring;

pub use cache::{normalize_query, CacheStats, CachingEndpoint};
pub use error::ScoringError;
pub use harness::{Evaluation, EvaluationConfig};
pub use matching::{best_matching, BestMatch};
pub use report::{
    ConfigurationSummary, EvaluationReport, MetricSummary, SkippedQuery, Stats, TaskOutcome,
    TaskReport, TaskResult,
};
pub use retry::{RetryPolicy, RetryingEndpoint};
pub use scoring::{prepare, ScoringConfig, ScoringEngine};
