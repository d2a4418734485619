//! The query endpoint collaborator.
//!
//! Implementations execute query strings against some graph store. Nothing
//! here retries or caches; decorators that do so are layered on by callers.

use crate::parser::QueryParseError;
use crate::query::SelectQuery;
use crate::transform::{count_query, COUNT_ALIAS};
use qtree_core::{Node, Triple};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// One result row: variable name (without sigil) -> bound term.
pub type Binding = BTreeMap<String, Node>;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum EndpointError {
    #[error("transport error: {0}")]
    Transport(String),

    #[error("query timed out after {0:?}")]
    Timeout(Duration),

    #[error("malformed response: {0}")]
    MalformedResponse(String),

    #[error(transparent)]
    Query(#[from] QueryParseError),
}

impl EndpointError {
    /// Whether retrying the same request may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, EndpointError::Transport(_) | EndpointError::Timeout(_))
    }
}

pub trait Endpoint: Send + Sync {
    /// Execute a `SELECT` query and return its rows.
    fn select(&self, query: &str) -> Result<Vec<Binding>, EndpointError>;

    /// The bounded description of `resource`: outgoing triples up to
    /// `depth` hops away.
    fn construct_description(
        &self,
        resource: &Node,
        depth: usize,
    ) -> Result<Vec<Triple>, EndpointError>;

    /// Distinct bindings of the projected variable.
    fn resources(&self, query: &SelectQuery) -> Result<BTreeSet<Node>, EndpointError> {
        let target = query.target();
        let rows = self.select(&query.to_string())?;
        Ok(rows
            .into_iter()
            .filter_map(|mut row| row.remove(target))
            .collect())
    }

    /// `COUNT(DISTINCT ?target)` of the query.
    fn count(&self, query: &SelectQuery) -> Result<u64, EndpointError> {
        let rows = self.select(&count_query(query).to_string())?;
        let Some(value) = rows.first().and_then(|row| row.get(COUNT_ALIAS)) else {
            return Err(EndpointError::MalformedResponse(format!(
                "count query returned no ?{COUNT_ALIAS} binding"
            )));
        };
        match value {
            Node::Literal(lit) => lit.lexical.parse::<u64>().map_err(|e| {
                EndpointError::MalformedResponse(format!("count `{}`: {e}", lit.lexical))
            }),
            other => Err(EndpointError::MalformedResponse(format!(
                "count bound to non-literal {other}"
            ))),
        }
    }
}

macro_rules! forward_endpoint {
    ($($wrapper:ty),*) => {$(
        impl<E: Endpoint + ?Sized> Endpoint for $wrapper {
            fn select(&self, query: &str) -> Result<Vec<Binding>, EndpointError> {
                (**self).select(query)
            }

            fn construct_description(
                &self,
                resource: &Node,
                depth: usize,
            ) -> Result<Vec<Triple>, EndpointError> {
                (**self).construct_description(resource, depth)
            }

            fn resources(&self, query: &SelectQuery) -> Result<BTreeSet<Node>, EndpointError> {
                (**self).resources(query)
            }

            fn count(&self, query: &SelectQuery) -> Result<u64, EndpointError> {
                (**self).count(query)
            }
        }
    )*};
}

forward_endpoint!(&E, Arc<E>, Box<E>);
