//! Resource trees: the bounded neighbourhood of a graph node as a rooted,
//! edge-labelled tree.
//!
//! Children are stored in a `BTreeMap<edge, BTreeSet<child>>`, so traversal
//! order, equality, hashing and the canonical string form are all derived from
//! the structure alone. Two structurally equal trees therefore always render to
//! byte-identical text.
//!
//! Children live inside ordered sets and cannot be mutated in place. Every
//! mutating helper here takes the affected child out, transforms it and
//! reinserts it, which keeps the set ordering consistent.

use crate::node::Node;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

pub type Children = BTreeSet<ResourceTree>;

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ResourceTree {
    data: Node,
    resolved: bool,
    edges: BTreeMap<Node, Children>,
}

impl Default for ResourceTree {
    fn default() -> Self {
        Self::top()
    }
}

impl ResourceTree {
    /// A childless tree carrying `data`.
    ///
    /// Concrete data marks the node as resolved (an existing graph resource
    /// or literal); the variable sentinel yields a synthetic node.
    pub fn new(data: Node) -> Self {
        Self {
            resolved: data.is_concrete(),
            data,
            edges: BTreeMap::new(),
        }
    }

    /// The top of the generalization lattice: a variable root with no edges.
    pub fn top() -> Self {
        Self::new(Node::Var)
    }

    pub fn var() -> Self {
        Self::top()
    }

    /// Builder form of [`ResourceTree::add_child`].
    pub fn with_child(mut self, edge: Node, child: ResourceTree) -> Self {
        self.add_child(edge, child);
        self
    }

    pub fn data(&self) -> &Node {
        &self.data
    }

    pub fn is_resolved(&self) -> bool {
        self.resolved
    }

    pub fn set_data(&mut self, data: Node) {
        self.resolved = data.is_concrete();
        self.data = data;
    }

    /// Outgoing edge labels, in canonical order.
    pub fn edges(&self) -> impl Iterator<Item = &Node> {
        self.edges.keys()
    }

    /// Children reachable over `edge`, in canonical order.
    pub fn children(&self, edge: &Node) -> impl Iterator<Item = &ResourceTree> {
        self.edges.get(edge).into_iter().flat_map(|set| set.iter())
    }

    pub fn child_set(&self, edge: &Node) -> Option<&Children> {
        self.edges.get(edge)
    }

    /// Every `(edge, child)` pair directly below the root.
    pub fn branches(&self) -> impl Iterator<Item = (&Node, &ResourceTree)> {
        self.edges
            .iter()
            .flat_map(|(edge, children)| children.iter().map(move |child| (edge, child)))
    }

    pub fn has_edge(&self, edge: &Node) -> bool {
        self.edges.contains_key(edge)
    }

    pub fn add_child(&mut self, edge: Node, child: ResourceTree) -> bool {
        self.edges.entry(edge).or_default().insert(child)
    }

    pub fn remove_edge(&mut self, edge: &Node) -> Option<Children> {
        self.edges.remove(edge)
    }

    /// Remove a single child; the edge disappears with its last child.
    pub fn remove_child(&mut self, edge: &Node, child: &ResourceTree) -> bool {
        let Some(children) = self.edges.get_mut(edge) else {
            return false;
        };
        let removed = children.remove(child);
        if children.is_empty() {
            self.edges.remove(edge);
        }
        removed
    }

    /// Keep only the branches for which `keep` returns true.
    pub fn retain_branches<F>(&mut self, mut keep: F)
    where
        F: FnMut(&Node, &ResourceTree) -> bool,
    {
        for (edge, children) in self.edges.iter_mut() {
            children.retain(|child| keep(edge, child));
        }
        self.edges.retain(|_, children| !children.is_empty());
    }

    /// Rebuild every child through `f`; returning `None` drops the child.
    pub fn map_children<F>(&mut self, mut f: F)
    where
        F: FnMut(&Node, ResourceTree) -> Option<ResourceTree>,
    {
        let edges = std::mem::take(&mut self.edges);
        for (edge, children) in edges {
            let rebuilt: Children = children
                .into_iter()
                .filter_map(|child| f(&edge, child))
                .collect();
            if !rebuilt.is_empty() {
                self.edges.insert(edge, rebuilt);
            }
        }
    }

    pub fn is_leaf(&self) -> bool {
        self.edges.is_empty()
    }

    /// A variable with no constraining structure below it.
    pub fn is_var_leaf(&self) -> bool {
        self.data.is_var() && self.edges.is_empty()
    }

    /// Whether this tree is the top element (matches every resource).
    pub fn is_top(&self) -> bool {
        self.is_var_leaf()
    }

    pub fn node_count(&self) -> usize {
        1 + self
            .edges
            .values()
            .flat_map(|children| children.iter())
            .map(ResourceTree::node_count)
            .sum::<usize>()
    }

    /// Number of `(edge, child)` pairs in the whole tree, i.e. the number of
    /// triple patterns the tree renders to.
    pub fn branch_count(&self) -> usize {
        self.branches()
            .map(|(_, child)| 1 + child.branch_count())
            .sum()
    }

    /// Length of the longest root-to-leaf path, counted in edges.
    pub fn depth(&self) -> usize {
        self.branches()
            .map(|(_, child)| 1 + child.depth())
            .max()
            .unwrap_or(0)
    }

    /// Deterministic, indentation-based text form.
    pub fn canonical_string(&self) -> String {
        self.to_string()
    }

    fn write_indented(&self, f: &mut fmt::Formatter<'_>, indent: usize) -> fmt::Result {
        for (edge, child) in self.branches() {
            writeln!(f, "{:width$}{edge} -> {}", "", child.data, width = indent * 2)?;
            child.write_indented(f, indent + 1)?;
        }
        Ok(())
    }
}

impl fmt::Display for ResourceTree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", self.data)?;
        self.write_indented(f, 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::RDF_TYPE_IRI;

    fn person() -> ResourceTree {
        ResourceTree::top().with_child(
            Node::iri(RDF_TYPE_IRI),
            ResourceTree::new(Node::iri("http://ex.org/Person")),
        )
    }

    #[test]
    fn top_is_var_leaf() {
        let top = ResourceTree::top();
        assert!(top.is_top());
        assert!(!top.is_resolved());
        assert_eq!(top.node_count(), 1);
        assert_eq!(top.branch_count(), 0);
        assert_eq!(top.depth(), 0);
    }

    #[test]
    fn remove_child_drops_empty_edge() {
        let mut tree = person();
        let ty = Node::iri(RDF_TYPE_IRI);
        let child = ResourceTree::new(Node::iri("http://ex.org/Person"));
        assert!(tree.remove_child(&ty, &child));
        assert!(!tree.has_edge(&ty));
        assert!(tree.is_top());
    }

    #[test]
    fn map_children_rebuilds_in_order() {
        let mut tree = person().with_child(Node::iri("http://ex.org/name"), ResourceTree::var());
        tree.map_children(|_, child| (!child.is_var_leaf()).then_some(child));
        assert_eq!(tree, person());
    }

    #[test]
    fn canonical_string_is_structural() {
        let a = person().with_child(Node::iri("http://ex.org/knows"), ResourceTree::var());
        let b = ResourceTree::top()
            .with_child(Node::iri("http://ex.org/knows"), ResourceTree::var())
            .with_child(
                Node::iri(RDF_TYPE_IRI),
                ResourceTree::new(Node::iri("http://ex.org/Person")),
            );
        assert_eq!(a, b);
        assert_eq!(a.canonical_string(), b.canonical_string());
        assert!(a.canonical_string().contains("-> <http://ex.org/Person>"));
    }

    #[test]
    fn depth_and_counts() {
        let inner = ResourceTree::var().with_child(Node::iri("http://ex.org/p"), ResourceTree::var());
        let tree = person().with_child(Node::iri("http://ex.org/q"), inner);
        assert_eq!(tree.depth(), 2);
        assert_eq!(tree.branch_count(), 3);
        assert_eq!(tree.node_count(), 4);
    }
}
