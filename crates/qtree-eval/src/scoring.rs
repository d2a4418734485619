//! Scoring a learned tree against a reference query.
//!
//! Cheap candidate queries are executed in full and their answers compared
//! with the reference answers. Large ones are only counted: reference,
//! candidate and (when the examples carry noise) their conjunction.

use crate::error::ScoringError;
use qtree_core::{prune, remove_var_leafs, PruneScope, ResourceTree, Score};
use qtree_learn::examples::typed_resources_query;
use qtree_sparql::{
    conjoin, execute_split, render, split_query, Endpoint, PrefixMap, SelectQuery, SplitConfig,
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringConfig {
    /// Candidate queries with fewer triple patterns are scored exactly;
    /// the rest by count aggregation.
    pub count_query_threshold: usize,
    pub split_complex_queries: bool,
    pub split_clause_threshold: usize,
    pub max_root_patterns_per_query: usize,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            count_query_threshold: 25,
            split_complex_queries: true,
            split_clause_threshold: 10,
            max_root_patterns_per_query: 20,
        }
    }
}

impl ScoringConfig {
    pub fn split(&self) -> SplitConfig {
        SplitConfig {
            clause_threshold: self.split_clause_threshold,
            max_root_patterns: self.max_root_patterns_per_query,
        }
    }
}

/// Scores trees against reference queries on one endpoint.
///
/// `kb_size` is the number of typed resources and stands in for the
/// universe when true negatives are derived.
#[derive(Debug)]
pub struct ScoringEngine<E> {
    endpoint: E,
    config: ScoringConfig,
    base: Option<String>,
    prefixes: PrefixMap,
    kb_size: u64,
}

impl<E: Endpoint> ScoringEngine<E> {
    /// Count the typed resources of the endpoint once and keep the result.
    pub fn new(endpoint: E, config: ScoringConfig) -> Result<Self, ScoringError> {
        let kb_size = endpoint.count(&typed_resources_query())?;
        tracing::info!(kb_size, "counted typed resources");
        Ok(Self::with_kb_size(endpoint, config, kb_size))
    }

    pub fn with_kb_size(endpoint: E, config: ScoringConfig, kb_size: u64) -> Self {
        Self {
            endpoint,
            config,
            base: None,
            prefixes: PrefixMap::new(),
            kb_size,
        }
    }

    /// Namespaces used when rendering candidate queries.
    pub fn with_namespaces(mut self, base: Option<String>, prefixes: PrefixMap) -> Self {
        self.base = base;
        self.prefixes = prefixes;
        self
    }

    pub fn endpoint(&self) -> &E {
        &self.endpoint
    }

    pub fn config(&self) -> &ScoringConfig {
        &self.config
    }

    pub fn kb_size(&self) -> u64 {
        self.kb_size
    }

    /// The query a tree is scored by.
    pub fn render(&self, tree: &ResourceTree) -> SelectQuery {
        render(&prepare(tree), self.base.as_deref(), &self.prefixes)
    }

    /// Score `tree` against `reference`, picking the exact or the
    /// count-based strategy by the size of the candidate query.
    pub fn score(
        &self,
        reference: &SelectQuery,
        tree: &ResourceTree,
        noise: f64,
    ) -> Result<Score, ScoringError> {
        check_reference(reference)?;
        let prepared = prepare(tree);
        let candidate = render(&prepared, self.base.as_deref(), &self.prefixes);
        if candidate.patterns.len() < self.config.count_query_threshold {
            self.exact(reference, &prepared, &candidate)
        } else {
            self.by_count(reference, &prepared, &candidate, noise)
        }
    }

    /// Retrieve both answer sets and compare them.
    pub fn score_exact(
        &self,
        reference: &SelectQuery,
        tree: &ResourceTree,
    ) -> Result<Score, ScoringError> {
        check_reference(reference)?;
        let prepared = prepare(tree);
        let candidate = render(&prepared, self.base.as_deref(), &self.prefixes);
        self.exact(reference, &prepared, &candidate)
    }

    /// Derive the confusion matrix from count queries only.
    pub fn score_by_count(
        &self,
        reference: &SelectQuery,
        tree: &ResourceTree,
        noise: f64,
    ) -> Result<Score, ScoringError> {
        check_reference(reference)?;
        let prepared = prepare(tree);
        let candidate = render(&prepared, self.base.as_deref(), &self.prefixes);
        self.by_count(reference, &prepared, &candidate, noise)
    }

    fn exact(
        &self,
        reference: &SelectQuery,
        prepared: &ResourceTree,
        candidate: &SelectQuery,
    ) -> Result<Score, ScoringError> {
        let expected = self.endpoint.resources(reference)?;
        if expected.is_empty() {
            return Err(no_answers(reference));
        }
        if prepared.is_leaf() {
            return self.top_score(expected.len() as u64);
        }

        let learned = if self.config.split_complex_queries {
            let parts = split_query(
                prepared,
                self.base.as_deref(),
                &self.prefixes,
                &self.config.split(),
            );
            execute_split(&self.endpoint, &parts)?
        } else {
            self.endpoint.resources(candidate)?
        };
        if learned.is_empty() {
            tracing::warn!(query = %candidate, "learned query returns no result");
        }

        let tp = expected.intersection(&learned).count() as u64;
        let fp = learned.difference(&expected).count() as u64;
        let fn_ = expected.difference(&learned).count() as u64;
        self.confusion(tp, fp, fn_)
    }

    fn by_count(
        &self,
        reference: &SelectQuery,
        prepared: &ResourceTree,
        candidate: &SelectQuery,
        noise: f64,
    ) -> Result<Score, ScoringError> {
        let reference_count = self.endpoint.count(reference)?;
        if reference_count == 0 {
            return Err(no_answers(reference));
        }
        if prepared.is_leaf() {
            return self.top_score(reference_count);
        }

        let learned_count = self.endpoint.count(candidate)?;
        // without noise every learned answer is assumed to be a reference answer
        let overlap = if noise > 0.0 {
            self.endpoint.count(&conjoin(reference, candidate))?
        } else {
            learned_count.min(reference_count)
        };
        tracing::debug!(reference_count, learned_count, overlap, "scored by count");

        self.confusion(
            overlap,
            learned_count.saturating_sub(overlap),
            reference_count.saturating_sub(overlap),
        )
    }

    /// The top tree answers everything: P = |reference| / |KB|, R = 1.
    fn top_score(&self, reference_count: u64) -> Result<Score, ScoringError> {
        let tp = reference_count;
        let fp = self.kb_size.saturating_sub(tp);
        Ok(Score::from_counts(tp, fp, 0, 0)?)
    }

    fn confusion(&self, tp: u64, fp: u64, fn_: u64) -> Result<Score, ScoringError> {
        let tn = match self.kb_size.checked_sub(tp + fp + fn_) {
            Some(tn) => tn,
            None => {
                tracing::warn!(
                    kb_size = self.kb_size,
                    tp,
                    fp,
                    fn_,
                    "answers exceed the knowledge base size"
                );
                0
            }
        };
        Ok(Score::from_counts(tp, fp, tn, fn_)?)
    }
}

/// Strip unconstrained leaves, then minimize. Trees are scored and shown in
/// this form.
pub fn prepare(tree: &ResourceTree) -> ResourceTree {
    prune(&remove_var_leafs(tree), PruneScope::rdf())
}

fn check_reference(reference: &SelectQuery) -> Result<(), ScoringError> {
    if reference.is_count() {
        return Err(ScoringError::Input(
            "reference query must project a variable".to_string(),
        ));
    }
    if reference.patterns.is_empty() {
        return Err(ScoringError::Input(
            "reference query has no triple patterns".to_string(),
        ));
    }
    Ok(())
}

fn no_answers(reference: &SelectQuery) -> ScoringError {
    tracing::error!(query = %reference, "reference query returns no result");
    ScoringError::Input(format!("reference query returns no result: {reference}"))
}
