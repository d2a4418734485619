//! Ontology services the core consumes but does not implement.
//!
//! The core never reasons over a schema itself. It asks a collaborator for
//! the super-classes of a class (to drop redundant type edges) and, as an
//! auxiliary signal, whether a property carries a declared characteristic.

use crate::node::Node;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

// ============================================================================
// Property characteristics
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum PropertyCharacteristic {
    Functional,
    InverseFunctional,
    Transitive,
    Symmetric,
    Asymmetric,
    Reflexive,
    Irreflexive,
}

impl PropertyCharacteristic {
    pub const ALL: [PropertyCharacteristic; 7] = [
        PropertyCharacteristic::Functional,
        PropertyCharacteristic::InverseFunctional,
        PropertyCharacteristic::Transitive,
        PropertyCharacteristic::Symmetric,
        PropertyCharacteristic::Asymmetric,
        PropertyCharacteristic::Reflexive,
        PropertyCharacteristic::Irreflexive,
    ];

    /// The OWL class a property is typed with to declare this characteristic.
    pub fn owl_iri(self) -> &'static str {
        match self {
            PropertyCharacteristic::Functional => "http://www.w3.org/2002/07/owl#FunctionalProperty",
            PropertyCharacteristic::InverseFunctional => {
                "http://www.w3.org/2002/07/owl#InverseFunctionalProperty"
            }
            PropertyCharacteristic::Transitive => "http://www.w3.org/2002/07/owl#TransitiveProperty",
            PropertyCharacteristic::Symmetric => "http://www.w3.org/2002/07/owl#SymmetricProperty",
            PropertyCharacteristic::Asymmetric => "http://www.w3.org/2002/07/owl#AsymmetricProperty",
            PropertyCharacteristic::Reflexive => "http://www.w3.org/2002/07/owl#ReflexiveProperty",
            PropertyCharacteristic::Irreflexive => {
                "http://www.w3.org/2002/07/owl#IrreflexiveProperty"
            }
        }
    }

    pub fn from_owl_iri(iri: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.owl_iri() == iri)
    }
}

// ============================================================================
// Collaborator traits
// ============================================================================

/// Transitive super-class lookup.
///
/// Implementations must be safe to call repeatedly; any caching is their
/// own concern.
pub trait SuperClassLookup {
    /// All strict super-classes of `class`, transitively. Unknown classes
    /// have none.
    fn super_classes(&self, class: &Node) -> BTreeSet<Node>;

    fn is_super_class_of(&self, sup: &Node, sub: &Node) -> bool {
        self.super_classes(sub).contains(sup)
    }
}

/// "Is `property` already declared to have characteristic `c`?"
pub trait AxiomCheck {
    fn is_declared(&self, property: &str, characteristic: PropertyCharacteristic) -> bool;
}

/// A lookup that knows no classes.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoSuperClasses;

impl SuperClassLookup for NoSuperClasses {
    fn super_classes(&self, _class: &Node) -> BTreeSet<Node> {
        BTreeSet::new()
    }
}
