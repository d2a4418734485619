//! Least general generalization of resource trees.
//!
//! The generalization of two trees keeps root data only where both agree and
//! pairs every child of a shared edge with every child of the same edge in
//! the other tree. Pairs whose generalization is strictly more general than
//! a sibling pair's are discarded, which leaves exactly the best-matching
//! pairs and yields the core of the product tree. Because the result is
//! always minimized it is canonical: `lgg(a, b) == lgg(b, a)`, and a left
//! fold over any permutation of the inputs produces the same tree.

use crate::error::CoreError;
use crate::node::Node;
use crate::prune::retain_most_specific;
use crate::tree::ResourceTree;

/// The most specific tree subsuming both `a` and `b`.
///
/// Edges present in only one tree are dropped. The inputs are not modified.
pub fn lgg(a: &ResourceTree, b: &ResourceTree) -> ResourceTree {
    let data = if a.data() == b.data() {
        a.data().clone()
    } else {
        Node::Var
    };

    let mut branches = Vec::new();
    for edge in a.edges() {
        if !b.has_edge(edge) {
            continue;
        }
        for left in a.children(edge) {
            for right in b.children(edge) {
                branches.push((edge.clone(), lgg(left, right)));
            }
        }
    }

    let mut out = ResourceTree::new(data);
    for (edge, child) in retain_most_specific(branches) {
        out.add_child(edge, child);
    }
    out
}

/// Left fold of [`lgg`] over `trees`.
pub fn lgg_all<'t, I>(trees: I) -> Result<ResourceTree, CoreError>
where
    I: IntoIterator<Item = &'t ResourceTree>,
{
    let mut iter = trees.into_iter();
    let first = iter.next().ok_or(CoreError::EmptyInput)?;
    let mut acc = first.minimize();
    for tree in iter {
        acc = lgg(&acc, tree);
    }
    tracing::trace!(nodes = acc.node_count(), "generalized tree set");
    Ok(acc)
}

/// Like [`lgg_all`], but a result that constrains nothing is an error.
pub fn generalize_subset<'t, I>(trees: I) -> Result<ResourceTree, CoreError>
where
    I: IntoIterator<Item = &'t ResourceTree>,
{
    let tree = lgg_all(trees)?;
    if tree.is_top() {
        return Err(CoreError::Degenerate);
    }
    Ok(tree)
}
