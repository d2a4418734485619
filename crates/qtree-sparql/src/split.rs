//! Splitting large tree queries into independently executable parts.
//!
//! Root branches of a tree query share nothing but the root variable, so the
//! answer of the whole query is the intersection of the answers of any
//! partition of its root branches. Large queries are cut along that line.

use crate::endpoint::{Endpoint, EndpointError};
use crate::query::{PrefixMap, SelectQuery};
use crate::render::render;
use qtree_core::{Node, ResourceTree};
use std::collections::BTreeSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SplitConfig {
    /// Trees with at most this many triple patterns are not split.
    pub clause_threshold: usize,
    /// Upper bound on the simple root branches carried by one part.
    pub max_root_patterns: usize,
}

impl Default for SplitConfig {
    fn default() -> Self {
        Self {
            clause_threshold: 10,
            max_root_patterns: 20,
        }
    }
}

/// Partition `tree` into clusters of root branches.
///
/// Simple branches (leaf children) are chunked. Every complex branch forms a
/// cluster together with the first chunk; remaining chunks stand alone. The
/// clusters are returned in canonical order.
pub fn split_tree(tree: &ResourceTree, config: &SplitConfig) -> Vec<ResourceTree> {
    if tree.branch_count() <= config.clause_threshold {
        return vec![tree.clone()];
    }

    let (simple, complex): (Vec<(&Node, &ResourceTree)>, Vec<(&Node, &ResourceTree)>) =
        tree.branches().partition(|(_, child)| child.is_leaf());

    let chunks: Vec<&[(&Node, &ResourceTree)]> =
        simple.chunks(config.max_root_patterns.max(1)).collect();
    let shared = chunks.first().copied().unwrap_or(&[]);

    let mut clusters = BTreeSet::new();
    for &branch in &complex {
        clusters.insert(part(tree.data(), std::iter::once(branch).chain(shared.iter().copied())));
    }
    let skip = usize::from(!complex.is_empty());
    for chunk in chunks.iter().skip(skip) {
        clusters.insert(part(tree.data(), chunk.iter().copied()));
    }

    tracing::debug!(
        patterns = tree.branch_count(),
        clusters = clusters.len(),
        "split tree query"
    );
    clusters.into_iter().collect()
}

fn part<'t>(
    root: &Node,
    branches: impl IntoIterator<Item = (&'t Node, &'t ResourceTree)>,
) -> ResourceTree {
    let mut out = ResourceTree::new(root.clone());
    for (edge, child) in branches {
        out.add_child(edge.clone(), child.clone());
    }
    out
}

/// [`split_tree`] followed by rendering of every part.
pub fn split_query(
    tree: &ResourceTree,
    base: Option<&str>,
    prefixes: &PrefixMap,
    config: &SplitConfig,
) -> Vec<SelectQuery> {
    split_tree(tree, config)
        .iter()
        .map(|part| render(part, base, prefixes))
        .collect()
}

/// Execute every part and intersect the answers, stopping at the first
/// empty intermediate result.
pub fn execute_split<E: Endpoint + ?Sized>(
    endpoint: &E,
    parts: &[SelectQuery],
) -> Result<BTreeSet<Node>, EndpointError> {
    let mut acc: Option<BTreeSet<Node>> = None;
    for part in parts {
        let result = endpoint.resources(part)?;
        let next = match acc {
            None => result,
            Some(prev) => prev.intersection(&result).cloned().collect(),
        };
        if next.is_empty() {
            return Ok(next);
        }
        acc = Some(next);
    }
    Ok(acc.unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use super::*;
    use qtree_core::subsumes;

    fn ex(s: &str) -> Node {
        Node::iri(format!("http://ex.org/{s}"))
    }

    fn wide_tree(simple: usize, complex: usize) -> ResourceTree {
        let mut tree = ResourceTree::top();
        for i in 0..simple {
            tree.add_child(ex(&format!("p{i}")), ResourceTree::new(ex("o")));
        }
        for i in 0..complex {
            tree.add_child(
                ex(&format!("q{i}")),
                ResourceTree::var().with_child(ex("r"), ResourceTree::new(ex("o"))),
            );
        }
        tree
    }

    #[test]
    fn small_trees_are_not_split() {
        let tree = wide_tree(3, 1);
        assert_eq!(split_tree(&tree, &SplitConfig::default()), vec![tree]);
    }

    #[test]
    fn clusters_cover_every_root_branch() {
        let tree = wide_tree(7, 2);
        let config = SplitConfig {
            clause_threshold: 4,
            max_root_patterns: 3,
        };
        let parts = split_tree(&tree, &config);
        // two complex clusters (each with the first chunk) + two remaining chunks
        assert_eq!(parts.len(), 4);
        for (edge, child) in tree.branches() {
            assert!(parts.iter().any(|p| p.children(edge).any(|c| c == child)));
        }
        for part in &parts {
            assert!(subsumes(part, &tree));
        }
    }

    #[test]
    fn simple_only_trees_split_into_chunks() {
        let tree = wide_tree(12, 0);
        let config = SplitConfig {
            clause_threshold: 10,
            max_root_patterns: 5,
        };
        let parts = split_tree(&tree, &config);
        assert_eq!(parts.len(), 3);
        assert_eq!(parts.iter().map(|p| p.branch_count()).sum::<usize>(), 12);
    }
}
