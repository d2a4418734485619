//! # qtree-learn
//!
//! Learning a query tree from labelled examples.
//!
//! - [`examples`]: the [`ExamplesSet`], candidate pools and noise injection
//! - [`heuristic`]: pluggable candidate scoring
//! - [`search`]: the heuristic search core ([`QueryTreeLearner`])
//! - [`baseline`]: simple reference solutions
//!
//! A learning task owns all of its state. Nothing here is shared between
//! tasks, so callers may run many learners in parallel.

pub mod baseline;
pub mod error;
pub mod examples;
pub mod heuristic;
pub mod search;

pub use baseline::Baseline;
pub use error::{InputError, LearnError};
pub use examples::{
    noise_replacements, ExampleCandidates, ExampleSelection, ExamplesSet, NoiseMethod,
};
pub use heuristic::{
    ComplexHeuristic, Coverage, HeuristicConfig, HeuristicKind, QueryTreeHeuristic,
    SimpleHeuristic,
};
pub use search::{
    EvaluatedTree, LearnerConfig, QueryTreeLearner, SearchOutcome, SearchState, SearchStats,
    SearchStatus,
};
