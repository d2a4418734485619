//! Schema services read off a loaded graph.
//!
//! [`ClassHierarchy`] answers super-class lookups from `rdfs:subClassOf` and
//! `owl:equivalentClass`. [`PropertyAxioms`] answers whether a property is
//! typed with one of the OWL characteristic classes.

use crate::graph::Graph;
use qtree_core::node::{OWL_EQUIVALENT_CLASS_IRI, RDFS_SUBCLASS_OF_IRI};
use qtree_core::{AxiomCheck, Node, PropertyCharacteristic, SuperClassLookup, RDF_TYPE_IRI};
use std::collections::{BTreeMap, BTreeSet};

// ============================================================================
// Class hierarchy
// ============================================================================

/// Transitively closed super-class relation.
///
/// Equivalent classes are each other's super-classes. A class is never its
/// own super-class, even through a cycle.
#[derive(Debug, Clone, Default)]
pub struct ClassHierarchy {
    direct: BTreeMap<Node, BTreeSet<Node>>,
    closure: BTreeMap<Node, BTreeSet<Node>>,
}

impl ClassHierarchy {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_graph(graph: &Graph) -> Self {
        let mut hierarchy = Self::new();
        for t in graph.matches(None, Some(&Node::iri(RDFS_SUBCLASS_OF_IRI)), None) {
            hierarchy.add_direct(t.subject.clone(), t.object.clone());
        }
        for t in graph.matches(None, Some(&Node::iri(OWL_EQUIVALENT_CLASS_IRI)), None) {
            hierarchy.add_direct(t.subject.clone(), t.object.clone());
            hierarchy.add_direct(t.object.clone(), t.subject.clone());
        }
        hierarchy.close();
        tracing::debug!(classes = hierarchy.closure.len(), "built class hierarchy");
        hierarchy
    }

    /// Declare `sub rdfs:subClassOf sup` and recompute the closure.
    pub fn with_subclass(mut self, sub: Node, sup: Node) -> Self {
        self.add_direct(sub, sup);
        self.close();
        self
    }

    fn add_direct(&mut self, sub: Node, sup: Node) {
        if sub.is_resource() && sup.is_resource() {
            self.direct.entry(sub).or_default().insert(sup);
        }
    }

    fn close(&mut self) {
        let mut closure = BTreeMap::new();
        for class in self.direct.keys() {
            let mut reached = BTreeSet::new();
            let mut stack: Vec<&Node> = vec![class];
            while let Some(current) = stack.pop() {
                for sup in self.direct.get(current).into_iter().flatten() {
                    if reached.insert(sup.clone()) {
                        stack.push(sup);
                    }
                }
            }
            reached.remove(class);
            closure.insert(class.clone(), reached);
        }
        self.closure = closure;
    }

    pub fn is_empty(&self) -> bool {
        self.direct.is_empty()
    }
}

impl SuperClassLookup for ClassHierarchy {
    fn super_classes(&self, class: &Node) -> BTreeSet<Node> {
        self.closure.get(class).cloned().unwrap_or_default()
    }

    fn is_super_class_of(&self, sup: &Node, sub: &Node) -> bool {
        self.closure.get(sub).is_some_and(|s| s.contains(sup))
    }
}

// ============================================================================
// Property axioms
// ============================================================================

#[derive(Debug, Clone, Default)]
pub struct PropertyAxioms {
    declared: BTreeMap<String, BTreeSet<PropertyCharacteristic>>,
}

impl PropertyAxioms {
    pub fn new() -> Self {
        Self::default()
    }

    /// Collect `p rdf:type owl:XProperty` declarations.
    pub fn from_graph(graph: &Graph) -> Self {
        let mut axioms = Self::new();
        for t in graph.matches(None, Some(&Node::iri(RDF_TYPE_IRI)), None) {
            let (Some(property), Some(class)) = (t.subject.as_iri(), t.object.as_iri()) else {
                continue;
            };
            if let Some(c) = PropertyCharacteristic::from_owl_iri(class) {
                axioms.insert(property, c);
            }
        }
        axioms
    }

    pub fn declare(mut self, property: impl Into<String>, c: PropertyCharacteristic) -> Self {
        self.insert(property, c);
        self
    }

    fn insert(&mut self, property: impl Into<String>, c: PropertyCharacteristic) {
        self.declared.entry(property.into()).or_default().insert(c);
    }

    pub fn characteristics(&self, property: &str) -> impl Iterator<Item = PropertyCharacteristic> + '_ {
        self.declared.get(property).into_iter().flatten().copied()
    }
}

impl AxiomCheck for PropertyAxioms {
    fn is_declared(&self, property: &str, characteristic: PropertyCharacteristic) -> bool {
        self.declared
            .get(property)
            .is_some_and(|set| set.contains(&characteristic))
    }
}
