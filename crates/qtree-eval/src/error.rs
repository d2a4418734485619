use qtree_core::CoreError;
use qtree_sparql::{EndpointError, QueryParseError};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ScoringError {
    /// The reference query is malformed or has no answers.
    #[error("invalid reference query: {0}")]
    Input(String),

    #[error(transparent)]
    Endpoint(#[from] EndpointError),

    /// A derived metric was NaN.
    #[error(transparent)]
    Anomaly(#[from] CoreError),
}

impl From<QueryParseError> for ScoringError {
    fn from(err: QueryParseError) -> Self {
        ScoringError::Input(err.to_string())
    }
}
