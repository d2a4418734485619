//! Query-to-query and query-to-tree transformations.

use crate::parser::QueryParseError;
use crate::query::{Projection, SelectQuery, Term, TriplePattern};
use qtree_core::{Node, ResourceTree};
use std::collections::{BTreeMap, BTreeSet, HashSet};

pub const COUNT_ALIAS: &str = "cnt";

/// `SELECT (COUNT(DISTINCT ?target) AS ?cnt)` over the same patterns.
pub fn count_query(query: &SelectQuery) -> SelectQuery {
    SelectQuery {
        distinct: false,
        projection: Projection::CountDistinct {
            var: query.target().to_string(),
            alias: COUNT_ALIAS.to_string(),
        },
        ..query.clone()
    }
}

/// The conjunction of two queries over one projected variable.
///
/// Candidate variables are renamed apart from the reference's, except the
/// candidate's projected variable, which is unified with the reference's.
pub fn conjoin(reference: &SelectQuery, candidate: &SelectQuery) -> SelectQuery {
    let taken: BTreeSet<String> = reference.vars().into_iter().map(str::to_string).collect();
    let mut renaming: BTreeMap<String, String> = BTreeMap::new();
    renaming.insert(
        candidate.target().to_string(),
        reference.target().to_string(),
    );
    for v in candidate.vars() {
        if renaming.contains_key(v) {
            continue;
        }
        let mut fresh = format!("c_{v}");
        while taken.contains(&fresh) {
            fresh.push('_');
        }
        renaming.insert(v.to_string(), fresh);
    }

    let rename = |t: &Term| match t {
        Term::Var(v) => Term::Var(renaming.get(v).cloned().unwrap_or_else(|| v.clone())),
        other => other.clone(),
    };

    let mut patterns = reference.patterns.clone();
    for p in &candidate.patterns {
        let renamed = TriplePattern::new(rename(&p.subject), rename(&p.predicate), rename(&p.object));
        if !patterns.contains(&renamed) {
            patterns.push(renamed);
        }
    }

    let mut prefixes = reference.prefixes.clone();
    for (prefix, ns) in &candidate.prefixes {
        prefixes.entry(prefix.clone()).or_insert_with(|| ns.clone());
    }

    SelectQuery {
        base: reference.base.clone(),
        prefixes,
        distinct: true,
        projection: Projection::Var(reference.target().to_string()),
        patterns,
    }
}

/// Rebuild a resource tree from a query, rooted at the projected variable.
///
/// Patterns unreachable from the root are ignored. Variable predicates
/// become variable edges; a variable already on the current path is emitted
/// as a leaf.
pub fn tree_from_query(query: &SelectQuery) -> Result<ResourceTree, QueryParseError> {
    let target = query.target();
    if !query.vars().contains(target) {
        return Err(QueryParseError::UnboundProjection(target.to_string()));
    }

    let mut by_subject: BTreeMap<&Term, Vec<&TriplePattern>> = BTreeMap::new();
    for p in &query.patterns {
        by_subject.entry(&p.subject).or_default().push(p);
    }

    let root = Term::Var(target.to_string());
    let mut path = HashSet::new();
    let tree = build(&root, &by_subject, &mut path);

    let used = tree.branch_count();
    if used < query.patterns.len() {
        tracing::debug!(
            patterns = query.patterns.len(),
            used,
            "ignored patterns not connected to the projected variable"
        );
    }
    Ok(tree)
}

fn build<'q>(
    term: &'q Term,
    by_subject: &BTreeMap<&'q Term, Vec<&'q TriplePattern>>,
    path: &mut HashSet<&'q Term>,
) -> ResourceTree {
    let data = match term {
        Term::Var(_) => Node::Var,
        Term::Node(node) => node.clone(),
    };
    let mut tree = ResourceTree::new(data);
    if !path.insert(term) {
        return tree;
    }
    if let Some(patterns) = by_subject.get(term) {
        for &p in patterns {
            let edge = match &p.predicate {
                Term::Var(_) => Node::Var,
                Term::Node(node) => node.clone(),
            };
            let child = build(&p.object, by_subject, path);
            tree.add_child(edge, child);
        }
    }
    path.remove(term);
    tree
}

/// Length of the longest subject-object join chain starting at the
/// projected variable.
pub fn join_depth(query: &SelectQuery) -> Result<usize, QueryParseError> {
    Ok(tree_from_query(query)?.depth())
}
