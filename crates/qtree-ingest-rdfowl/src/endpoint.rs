//! A query endpoint over an in-memory [`Graph`].
//!
//! Only the basic-graph-pattern subset understood by
//! [`qtree_sparql::parse_query`] is evaluated. Since every query projects a
//! single distinct variable, evaluation asks one question per candidate
//! value of that variable: is the pattern set satisfiable with the variable
//! fixed? The search stops at the first solution.

use crate::graph::Graph;
use qtree_core::node::XSD_INTEGER_IRI;
use qtree_core::{Node, Triple};
use qtree_sparql::{
    parse_query, Binding, Endpoint, EndpointError, Projection, SelectQuery, Term, TriplePattern,
};
use std::collections::{BTreeMap, BTreeSet};

type Assignment = BTreeMap<String, Node>;

#[derive(Debug, Clone, Default)]
pub struct MemoryEndpoint {
    graph: Graph,
}

impl MemoryEndpoint {
    pub fn new(graph: Graph) -> Self {
        Self { graph }
    }

    pub fn graph(&self) -> &Graph {
        &self.graph
    }

    /// Distinct values of the query target.
    pub fn evaluate(&self, query: &SelectQuery) -> BTreeSet<Node> {
        let target = query.target();
        let patterns: Vec<&TriplePattern> = query.patterns.iter().collect();

        let Some(anchor) = patterns
            .iter()
            .find(|p| p.vars().any(|v| v == target))
        else {
            return BTreeSet::new();
        };

        let empty = Assignment::new();
        let candidates: BTreeSet<Node> = self
            .graph
            .matches(
                resolve(&anchor.subject, &empty).as_ref(),
                resolve(&anchor.predicate, &empty).as_ref(),
                resolve(&anchor.object, &empty).as_ref(),
            )
            .flat_map(|t| values_of(anchor, t, target))
            .collect();

        let mut out = BTreeSet::new();
        let mut assignment = Assignment::new();
        for value in candidates {
            assignment.clear();
            assignment.insert(target.to_string(), value.clone());
            if satisfiable(&self.graph, &patterns, &mut assignment) {
                out.insert(value);
            }
        }
        tracing::trace!(
            patterns = patterns.len(),
            results = out.len(),
            "evaluated query in memory"
        );
        out
    }
}

impl Endpoint for MemoryEndpoint {
    fn select(&self, query: &str) -> Result<Vec<Binding>, EndpointError> {
        let parsed = parse_query(query)?;
        let values = self.evaluate(&parsed);
        let rows = match &parsed.projection {
            Projection::Var(var) => values
                .into_iter()
                .map(|value| Binding::from([(var.clone(), value)]))
                .collect(),
            Projection::CountDistinct { alias, .. } => vec![Binding::from([(
                alias.clone(),
                Node::typed_literal(values.len().to_string(), XSD_INTEGER_IRI),
            )])],
        };
        Ok(rows)
    }

    fn construct_description(
        &self,
        resource: &Node,
        depth: usize,
    ) -> Result<Vec<Triple>, EndpointError> {
        Ok(self.graph.bounded_description(resource, depth))
    }
}

// ============================================================================
// Pattern evaluation
// ============================================================================

fn resolve(term: &Term, assignment: &Assignment) -> Option<Node> {
    match term {
        Term::Node(node) => Some(node.clone()),
        Term::Var(v) => assignment.get(v).cloned(),
    }
}

fn bound_positions(pattern: &TriplePattern, assignment: &Assignment) -> usize {
    [&pattern.subject, &pattern.predicate, &pattern.object]
        .into_iter()
        .filter(|t| match t {
            Term::Node(_) => true,
            Term::Var(v) => assignment.contains_key(v),
        })
        .count()
}

/// Values a matched triple assigns to `var` (one per position it occupies,
/// which must agree).
fn values_of(pattern: &TriplePattern, triple: &Triple, var: &str) -> Option<Node> {
    let mut value: Option<&Node> = None;
    for (term, node) in [
        (&pattern.subject, &triple.subject),
        (&pattern.predicate, &triple.predicate),
        (&pattern.object, &triple.object),
    ] {
        if term.as_var() == Some(var) {
            match value {
                Some(v) if v != node => return None,
                _ => value = Some(node),
            }
        }
    }
    value.cloned()
}

/// Bind the unbound variables of `pattern` against `triple`. Newly bound
/// names are pushed to `bound`; returns `false` on a conflict.
fn bind(
    pattern: &TriplePattern,
    triple: &Triple,
    assignment: &mut Assignment,
    bound: &mut Vec<String>,
) -> bool {
    for (term, node) in [
        (&pattern.subject, &triple.subject),
        (&pattern.predicate, &triple.predicate),
        (&pattern.object, &triple.object),
    ] {
        let Term::Var(v) = term else { continue };
        match assignment.get(v) {
            Some(existing) if existing != node => return false,
            Some(_) => {}
            None => {
                assignment.insert(v.clone(), node.clone());
                bound.push(v.clone());
            }
        }
    }
    true
}

fn satisfiable(graph: &Graph, patterns: &[&TriplePattern], assignment: &mut Assignment) -> bool {
    let Some((idx, _)) = patterns
        .iter()
        .enumerate()
        .max_by_key(|(i, p)| (bound_positions(p, assignment), std::cmp::Reverse(*i)))
    else {
        return true;
    };
    let pattern = patterns[idx];
    let rest: Vec<&TriplePattern> = patterns
        .iter()
        .enumerate()
        .filter(|(i, _)| *i != idx)
        .map(|(_, p)| *p)
        .collect();

    let s = resolve(&pattern.subject, assignment);
    let p = resolve(&pattern.predicate, assignment);
    let o = resolve(&pattern.object, assignment);

    for triple in graph.matches(s.as_ref(), p.as_ref(), o.as_ref()) {
        let mut bound = Vec::new();
        let ok = bind(pattern, triple, assignment, &mut bound)
            && satisfiable(graph, &rest, assignment);
        for v in bound {
            assignment.remove(&v);
        }
        if ok {
            return true;
        }
    }
    false
}
