//! Tree simplification: minimization, entailment-scoped pruning and
//! variable-leaf removal.
//!
//! Every function here reads its input and returns a new tree; callers that
//! share a tree across candidate branches never observe a mutation.

use crate::node::{Node, RDF_TYPE_IRI};
use crate::ontology::{AxiomCheck, PropertyCharacteristic, SuperClassLookup};
use crate::subsumption::SubsumptionChecker;
use crate::tree::ResourceTree;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Semantics under which a simplification must not lose information.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Entailment {
    /// Plain graph membership.
    #[default]
    Rdf,
    /// Schema-aware: class hierarchy and declared property axioms hold.
    Rdfs,
}

#[derive(Clone, Copy, Default)]
pub struct PruneScope<'a> {
    pub entailment: Entailment,
    pub super_classes: Option<&'a dyn SuperClassLookup>,
    pub axioms: Option<&'a dyn AxiomCheck>,
}

impl<'a> PruneScope<'a> {
    pub fn rdf() -> Self {
        Self::default()
    }

    pub fn rdfs(super_classes: &'a dyn SuperClassLookup) -> Self {
        Self {
            entailment: Entailment::Rdfs,
            super_classes: Some(super_classes),
            axioms: None,
        }
    }

    pub fn with_axioms(mut self, axioms: &'a dyn AxiomCheck) -> Self {
        self.axioms = Some(axioms);
        self
    }
}

impl std::fmt::Debug for PruneScope<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PruneScope")
            .field("entailment", &self.entailment)
            .field("super_classes", &self.super_classes.is_some())
            .field("axioms", &self.axioms.is_some())
            .finish()
    }
}

// ============================================================================
// Minimization
// ============================================================================

impl ResourceTree {
    /// The core of this tree: every branch subsumed by a sibling branch
    /// under a unifying edge is removed, bottom-up.
    ///
    /// The result is equivalent to `self` under subsumption, and equivalent
    /// trees minimize to equal trees.
    pub fn minimize(&self) -> ResourceTree {
        let branches = self
            .branches()
            .map(|(edge, child)| (edge.clone(), child.minimize()))
            .collect();
        let mut out = ResourceTree::new(self.data().clone());
        for (edge, child) in retain_most_specific(branches) {
            out.add_child(edge, child);
        }
        out
    }
}

/// Drop every branch that is at least as general as some other branch.
///
/// Among mutually equivalent branches the first in canonical order is kept.
pub(crate) fn retain_most_specific(
    mut branches: Vec<(Node, ResourceTree)>,
) -> Vec<(Node, ResourceTree)> {
    branches.sort();
    branches.dedup();
    let n = branches.len();
    if n < 2 {
        return branches;
    }

    let mut redundant = vec![false; n];
    {
        let mut checker = SubsumptionChecker::new();
        for i in 0..n {
            let (edge_i, child_i) = &branches[i];
            for j in 0..n {
                if i == j {
                    continue;
                }
                let (edge_j, child_j) = &branches[j];
                if !edge_i.unifies_with(edge_j) || !checker.subsumes(child_i, child_j) {
                    continue;
                }
                let converse = edge_j.unifies_with(edge_i) && checker.subsumes(child_j, child_i);
                if !converse || j < i {
                    redundant[i] = true;
                    break;
                }
            }
        }
    }

    branches
        .into_iter()
        .zip(redundant)
        .filter_map(|(branch, drop)| (!drop).then_some(branch))
        .collect()
}

// ============================================================================
// Pruning
// ============================================================================

/// Simplify `tree` without losing information under `scope`.
///
/// Under RDF semantics this is [`ResourceTree::minimize`]. Under RDFS it
/// additionally drops `rdf:type` children whose class is a super-class of a
/// sibling type, and variable leaves hanging off properties declared
/// reflexive, then minimizes again.
pub fn prune(tree: &ResourceTree, scope: PruneScope<'_>) -> ResourceTree {
    match scope.entailment {
        Entailment::Rdf => tree.minimize(),
        Entailment::Rdfs => {
            let mut out = tree.clone();
            prune_rdfs(&mut out, &scope);
            out.minimize()
        }
    }
}

fn prune_rdfs(tree: &mut ResourceTree, scope: &PruneScope<'_>) {
    tree.map_children(|_, mut child| {
        prune_rdfs(&mut child, scope);
        Some(child)
    });

    if let Some(lookup) = scope.super_classes {
        let rdf_type = Node::iri(RDF_TYPE_IRI);
        let types: Vec<Node> = tree
            .children(&rdf_type)
            .filter(|c| c.is_leaf() && c.data().is_concrete())
            .map(|c| c.data().clone())
            .collect();
        let present: BTreeSet<&Node> = types.iter().collect();
        let mut removed: BTreeSet<Node> = BTreeSet::new();
        for ty in &types {
            if removed.contains(ty) {
                continue;
            }
            for sup in lookup.super_classes(ty) {
                if &sup != ty && present.contains(&sup) && !removed.contains(&sup) {
                    tracing::trace!(class = %ty, super_class = %sup, "dropping implied type edge");
                    removed.insert(sup);
                }
            }
        }
        for class in removed {
            tree.remove_child(&rdf_type, &ResourceTree::new(class));
        }
    }

    if let Some(axioms) = scope.axioms {
        tree.retain_branches(|edge, child| {
            let reflexive = edge
                .as_iri()
                .is_some_and(|p| axioms.is_declared(p, PropertyCharacteristic::Reflexive));
            !(reflexive && child.is_var_leaf())
        });
    }
}

/// Strip variable leaves, cascading upwards: a node left without children
/// and carrying a variable is removed in turn. The root always survives.
pub fn remove_var_leafs(tree: &ResourceTree) -> ResourceTree {
    let mut out = tree.clone();
    strip_var_leafs(&mut out);
    out
}

fn strip_var_leafs(tree: &mut ResourceTree) {
    tree.map_children(|_, mut child| {
        strip_var_leafs(&mut child);
        (!child.is_var_leaf()).then_some(child)
    });
}

/// Drops variable leaves over predicates known to be carried by (almost)
/// every resource, which therefore carry no information.
#[derive(Debug, Clone, Default)]
pub struct PredicateExistenceFilter {
    predicates: BTreeSet<Node>,
}

impl PredicateExistenceFilter {
    pub fn new<I: IntoIterator<Item = Node>>(predicates: I) -> Self {
        Self {
            predicates: predicates.into_iter().collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.predicates.is_empty()
    }

    pub fn apply(&self, tree: &ResourceTree) -> ResourceTree {
        let mut out = tree.clone();
        self.filter(&mut out);
        out
    }

    fn filter(&self, tree: &mut ResourceTree) {
        tree.map_children(|edge, mut child| {
            self.filter(&mut child);
            (!(child.is_var_leaf() && self.predicates.contains(edge))).then_some(child)
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn ty() -> Node {
        Node::iri(RDF_TYPE_IRI)
    }

    fn leaf(iri: &str) -> ResourceTree {
        ResourceTree::new(Node::iri(iri))
    }

    struct Hierarchy(BTreeMap<Node, BTreeSet<Node>>);

    impl SuperClassLookup for Hierarchy {
        fn super_classes(&self, class: &Node) -> BTreeSet<Node> {
            self.0.get(class).cloned().unwrap_or_default()
        }
    }

    struct Reflexive(&'static str);

    impl AxiomCheck for Reflexive {
        fn is_declared(&self, property: &str, c: PropertyCharacteristic) -> bool {
            property == self.0 && c == PropertyCharacteristic::Reflexive
        }
    }

    #[test]
    fn minimize_removes_subsumed_siblings() {
        let p = Node::iri("http://ex.org/p");
        let tree = ResourceTree::top()
            .with_child(p.clone(), ResourceTree::var())
            .with_child(p.clone(), leaf("http://ex.org/a"));
        let min = tree.minimize();
        assert_eq!(min, ResourceTree::top().with_child(p, leaf("http://ex.org/a")));
    }

    #[test]
    fn minimize_keeps_independent_branches() {
        let tree = ResourceTree::top()
            .with_child(ty(), leaf("http://ex.org/Person"))
            .with_child(Node::iri("http://ex.org/name"), ResourceTree::var());
        assert_eq!(tree.minimize(), tree);
    }

    #[test]
    fn rdfs_prune_drops_super_types() {
        let mut map = BTreeMap::new();
        map.insert(
            Node::iri("http://ex.org/Student"),
            BTreeSet::from([Node::iri("http://ex.org/Person")]),
        );
        let hierarchy = Hierarchy(map);
        let tree = ResourceTree::top()
            .with_child(ty(), leaf("http://ex.org/Person"))
            .with_child(ty(), leaf("http://ex.org/Student"));

        let pruned = prune(&tree, PruneScope::rdfs(&hierarchy));
        assert_eq!(pruned, ResourceTree::top().with_child(ty(), leaf("http://ex.org/Student")));
        assert_eq!(prune(&tree, PruneScope::rdf()), tree);
    }

    #[test]
    fn rdfs_prune_keeps_one_of_equivalent_classes() {
        let a = Node::iri("http://ex.org/A");
        let b = Node::iri("http://ex.org/B");
        let mut map = BTreeMap::new();
        map.insert(a.clone(), BTreeSet::from([b.clone()]));
        map.insert(b.clone(), BTreeSet::from([a.clone()]));
        let hierarchy = Hierarchy(map);
        let tree = ResourceTree::top()
            .with_child(ty(), ResourceTree::new(a.clone()))
            .with_child(ty(), ResourceTree::new(b));
        let pruned = prune(&tree, PruneScope::rdfs(&hierarchy));
        assert_eq!(pruned, ResourceTree::top().with_child(ty(), ResourceTree::new(a)));
    }

    #[test]
    fn rdfs_prune_drops_reflexive_var_leaves() {
        let axioms = Reflexive("http://ex.org/sameAsSelf");
        let tree = ResourceTree::top()
            .with_child(Node::iri("http://ex.org/sameAsSelf"), ResourceTree::var())
            .with_child(ty(), leaf("http://ex.org/Person"));
        let scope = PruneScope::rdfs(&crate::ontology::NoSuperClasses).with_axioms(&axioms);
        let pruned = prune(&tree, scope);
        assert_eq!(pruned, ResourceTree::top().with_child(ty(), leaf("http://ex.org/Person")));
    }

    #[test]
    fn var_leaves_are_removed_in_cascade() {
        let knows = Node::iri("http://ex.org/knows");
        let tree = ResourceTree::top()
            .with_child(ty(), leaf("http://ex.org/Person"))
            .with_child(
                knows,
                ResourceTree::var().with_child(Node::iri("http://ex.org/name"), ResourceTree::var()),
            );
        let stripped = remove_var_leafs(&tree);
        assert_eq!(stripped, ResourceTree::top().with_child(ty(), leaf("http://ex.org/Person")));
        assert!(remove_var_leafs(&ResourceTree::top()).is_top());
    }

    #[test]
    fn existence_filter_only_touches_listed_predicates() {
        let label = Node::iri("http://www.w3.org/2000/01/rdf-schema#label");
        let name = Node::iri("http://ex.org/name");
        let tree = ResourceTree::top()
            .with_child(label.clone(), ResourceTree::var())
            .with_child(name.clone(), ResourceTree::var())
            .with_child(label.clone(), ResourceTree::new(Node::literal("x")));
        let filtered = PredicateExistenceFilter::new([label.clone()]).apply(&tree);
        let expected = ResourceTree::top()
            .with_child(name, ResourceTree::var())
            .with_child(label, ResourceTree::new(Node::literal("x")));
        assert_eq!(filtered, expected);
    }
}
