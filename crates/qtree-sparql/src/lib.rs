//! # qtree-sparql
//!
//! The boundary between resource trees and query strings.
//!
//! - [`render`]: tree -> `SELECT DISTINCT ?x0 WHERE { ... }`
//! - [`parser`]: the BGP subset of SPARQL back into a [`SelectQuery`]
//! - [`transform`]: count queries, conjunction, tree reconstruction, join depth
//! - [`split`]: cutting large tree queries into joinable parts
//! - [`endpoint`]: the [`Endpoint`] collaborator trait

pub mod endpoint;
pub mod parser;
pub mod query;
pub mod render;
pub mod split;
pub mod transform;

pub use endpoint::{Binding, Endpoint, EndpointError};
pub use parser::{parse_query, QueryParseError};
pub use query::{PrefixMap, Projection, SelectQuery, Term, TriplePattern};
pub use render::{render, render_string, tree_to_patterns, VarAllocator, ROOT_VAR};
pub use split::{execute_split, split_query, split_tree, SplitConfig};
pub use transform::{conjoin, count_query, join_depth, tree_from_query, COUNT_ALIAS};
