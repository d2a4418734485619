use qtree_core::CoreError;
use qtree_sparql::EndpointError;
use thiserror::Error;

/// Problems with the examples handed to a learning task. Always fatal.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InputError {
    #[error("no positive examples")]
    NoPositiveExamples,

    #[error("no negative examples")]
    NoNegativeExamples,

    #[error("example {0} given twice")]
    DuplicateExample(String),

    #[error("example {0} is both positive and negative")]
    OverlappingExamples(String),

    #[error("{noisy} of {total} positive examples are noise, more than half")]
    ExcessiveNoise { noisy: usize, total: usize },
}

#[derive(Debug, Error)]
pub enum LearnError {
    #[error(transparent)]
    Input(#[from] InputError),

    #[error("endpoint: {0}")]
    Endpoint(#[from] EndpointError),

    #[error("generalization: {0}")]
    Generalization(#[from] CoreError),
}
