//! # qtree-core
//!
//! Resource trees and the generalization lattice they live in.
//!
//! - [`node`]: RDF terms and triples.
//! - [`tree`]: the edge-labelled [`ResourceTree`].
//! - [`subsumption`]: the partial order between trees.
//! - [`lgg`]: least general generalization of two or more trees.
//! - [`prune`]: minimization, entailment-scoped pruning, variable-leaf removal.
//! - [`factory`]: trees from bounded descriptions.
//! - [`metrics`]: precision, recall, F-measure, predictive accuracy, MCC.
//! - [`ontology`]: super-class and axiom collaborators.
//!
//! The crate is synchronous and holds no shared state; every operation takes
//! its inputs by reference and returns fresh trees.

pub mod error;
pub mod factory;
pub mod lgg;
pub mod metrics;
pub mod node;
pub mod ontology;
pub mod prune;
pub mod subsumption;
pub mod tree;

pub use error::CoreError;
pub use factory::{TreeFactory, TreeFactoryConfig};
pub use lgg::{generalize_subset, lgg, lgg_all};
pub use metrics::{Measure, Score};
pub use node::{Literal, Node, Triple, RDF_TYPE_IRI};
pub use ontology::{AxiomCheck, NoSuperClasses, PropertyCharacteristic, SuperClassLookup};
pub use prune::{prune, remove_var_leafs, Entailment, PredicateExistenceFilter, PruneScope};
pub use subsumption::{equivalent, subsumes, SubsumptionChecker};
pub use tree::ResourceTree;
