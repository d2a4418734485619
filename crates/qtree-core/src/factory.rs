//! Build resource trees from bounded descriptions.

use crate::node::{Node, Triple, RDF_TYPE_IRI};
use crate::tree::ResourceTree;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashSet};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TreeFactoryConfig {
    /// Maximum number of edges from the root to any node.
    pub max_depth: usize,
    /// Children kept per (node, edge), in canonical order.
    pub max_children_per_edge: usize,
    pub drop_predicate_prefixes: Vec<String>,
    pub drop_predicates: Vec<String>,
    /// Expand the description of classes reached over `rdf:type`.
    pub expand_type_objects: bool,
}

impl Default for TreeFactoryConfig {
    fn default() -> Self {
        Self {
            max_depth: 3,
            max_children_per_edge: 50,
            drop_predicate_prefixes: Vec::new(),
            drop_predicates: Vec::new(),
            expand_type_objects: false,
        }
    }
}

/// Turns a set of triples around a resource into a [`ResourceTree`].
///
/// Blank nodes are existential: they become variable nodes that keep their
/// outgoing structure. Literals are always leaves. A node already on the
/// current root-to-node path is emitted as a leaf, so cycles terminate.
#[derive(Debug, Clone, Default)]
pub struct TreeFactory {
    config: TreeFactoryConfig,
}

impl TreeFactory {
    pub fn new(config: TreeFactoryConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &TreeFactoryConfig {
        &self.config
    }

    pub fn keeps_predicate(&self, predicate: &Node) -> bool {
        let Some(iri) = predicate.as_iri() else {
            return false;
        };
        !self.config.drop_predicates.iter().any(|p| p == iri)
            && !self
                .config
                .drop_predicate_prefixes
                .iter()
                .any(|prefix| iri.starts_with(prefix.as_str()))
    }

    pub fn build(&self, root: &Node, triples: &[Triple]) -> ResourceTree {
        let mut index: BTreeMap<&Node, BTreeMap<&Node, BTreeSet<&Node>>> = BTreeMap::new();
        for t in triples {
            if !self.keeps_predicate(&t.predicate) {
                continue;
            }
            index
                .entry(&t.subject)
                .or_default()
                .entry(&t.predicate)
                .or_default()
                .insert(&t.object);
        }

        let mut path = HashSet::new();
        let tree = self.expand(root, &index, 0, &mut path);
        tracing::debug!(
            resource = %root,
            triples = triples.len(),
            nodes = tree.node_count(),
            depth = tree.depth(),
            "built resource tree"
        );
        tree
    }

    fn expand<'t>(
        &self,
        node: &'t Node,
        index: &BTreeMap<&'t Node, BTreeMap<&'t Node, BTreeSet<&'t Node>>>,
        depth: usize,
        path: &mut HashSet<&'t Node>,
    ) -> ResourceTree {
        let data = match node {
            Node::Blank(_) => Node::Var,
            other => other.clone(),
        };
        let mut tree = ResourceTree::new(data);
        if depth >= self.config.max_depth || node.is_literal() || !path.insert(node) {
            return tree;
        }

        if let Some(edges) = index.get(node) {
            for (predicate, objects) in edges {
                let is_type = predicate.as_iri() == Some(RDF_TYPE_IRI);
                for object in objects.iter().take(self.config.max_children_per_edge) {
                    let child = if is_type && !self.config.expand_type_objects {
                        ResourceTree::new((*object).clone())
                    } else {
                        self.expand(*object, index, depth + 1, path)
                    };
                    tree.add_child((*predicate).clone(), child);
                }
            }
        }

        path.remove(node);
        tree
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn iri(s: &str) -> Node {
        Node::iri(format!("http://ex.org/{s}"))
    }

    fn t(s: Node, p: Node, o: Node) -> Triple {
        Triple::new(s, p, o)
    }

    #[test]
    fn builds_nested_tree_and_stops_at_depth() {
        let triples = vec![
            t(iri("alice"), Node::rdf_type(), iri("Person")),
            t(iri("alice"), iri("knows"), iri("bob")),
            t(iri("bob"), iri("knows"), iri("carol")),
            t(iri("carol"), iri("knows"), iri("dave")),
        ];
        let factory = TreeFactory::new(TreeFactoryConfig {
            max_depth: 2,
            ..Default::default()
        });
        let tree = factory.build(&iri("alice"), &triples);
        assert_eq!(tree.data(), &iri("alice"));
        assert_eq!(tree.depth(), 2);
        let bob = tree.children(&iri("knows")).next().cloned().unwrap_or_default();
        assert_eq!(bob.data(), &iri("bob"));
        let carol = bob.children(&iri("knows")).next().cloned().unwrap_or_default();
        assert!(carol.is_leaf());
    }

    #[test]
    fn blank_nodes_become_structured_vars() {
        let triples = vec![
            t(iri("alice"), iri("address"), Node::blank("b0")),
            t(Node::blank("b0"), iri("city"), Node::literal("Leipzig")),
        ];
        let tree = TreeFactory::default().build(&iri("alice"), &triples);
        let addr = tree.children(&iri("address")).next().cloned().unwrap_or_default();
        assert!(addr.data().is_var());
        assert!(!addr.is_resolved());
        assert_eq!(addr.children(&iri("city")).count(), 1);
    }

    #[test]
    fn cycles_terminate() {
        let triples = vec![
            t(iri("a"), iri("p"), iri("b")),
            t(iri("b"), iri("p"), iri("a")),
        ];
        let factory = TreeFactory::new(TreeFactoryConfig {
            max_depth: 10,
            ..Default::default()
        });
        let tree = factory.build(&iri("a"), &triples);
        assert_eq!(tree.depth(), 2);
    }

    #[test]
    fn drops_filtered_predicates_and_caps_children() {
        let triples = vec![
            t(iri("a"), iri("p"), iri("x1")),
            t(iri("a"), iri("p"), iri("x2")),
            t(iri("a"), iri("p"), iri("x3")),
            t(iri("a"), Node::iri("http://www.w3.org/2002/07/owl#sameAs"), iri("a2")),
            t(iri("a"), iri("wikiPageID"), Node::literal("7")),
        ];
        let factory = TreeFactory::new(TreeFactoryConfig {
            max_children_per_edge: 2,
            drop_predicate_prefixes: vec!["http://www.w3.org/2002/07/owl#".into()],
            drop_predicates: vec!["http://ex.org/wikiPageID".into()],
            ..Default::default()
        });
        let tree = factory.build(&iri("a"), &triples);
        assert_eq!(tree.edges().count(), 1);
        assert_eq!(tree.children(&iri("p")).count(), 2);
    }

    #[test]
    fn type_objects_are_leaves_by_default() {
        let triples = vec![
            t(iri("a"), Node::rdf_type(), iri("Person")),
            t(
                iri("Person"),
                Node::iri(crate::node::RDFS_SUBCLASS_OF_IRI),
                iri("Agent"),
            ),
        ];
        let tree = TreeFactory::default().build(&iri("a"), &triples);
        assert_eq!(tree.branch_count(), 1);
    }
}
