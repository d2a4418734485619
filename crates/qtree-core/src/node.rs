//! RDF terms as they appear inside resource trees.
//!
//! A tree node carries exactly one `Node`: an IRI, a literal, a blank node or
//! the variable sentinel. Edge labels reuse the same type so that a fully
//! generalized edge can be represented by `Node::Var` as well.

use serde::{Deserialize, Serialize};
use std::fmt;

pub const RDF_TYPE_IRI: &str = "http://www.w3.org/1999/02/22-rdf-syntax-ns#type";
pub const RDFS_SUBCLASS_OF_IRI: &str = "http://www.w3.org/2000/01/rdf-schema#subClassOf";
pub const RDFS_LABEL_IRI: &str = "http://www.w3.org/2000/01/rdf-schema#label";
pub const OWL_CLASS_IRI: &str = "http://www.w3.org/2002/07/owl#Class";
pub const OWL_EQUIVALENT_CLASS_IRI: &str = "http://www.w3.org/2002/07/owl#equivalentClass";
pub const OWL_SAME_AS_IRI: &str = "http://www.w3.org/2002/07/owl#sameAs";
pub const XSD_INTEGER_IRI: &str = "http://www.w3.org/2001/XMLSchema#integer";
pub const XSD_STRING_IRI: &str = "http://www.w3.org/2001/XMLSchema#string";

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Literal {
    pub lexical: String,
    pub datatype: Option<String>,
    pub language: Option<String>,
}

/// A term in a resource tree.
///
/// `Var` sorts before every concrete term, so unconstrained children are
/// always visited first in canonical traversal.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Node {
    Var,
    Iri(String),
    Blank(String),
    Literal(Literal),
}

impl Node {
    pub fn iri(iri: impl Into<String>) -> Self {
        Node::Iri(iri.into())
    }

    pub fn blank(id: impl Into<String>) -> Self {
        Node::Blank(id.into())
    }

    pub fn literal(lexical: impl Into<String>) -> Self {
        Node::Literal(Literal {
            lexical: lexical.into(),
            datatype: None,
            language: None,
        })
    }

    pub fn typed_literal(lexical: impl Into<String>, datatype: impl Into<String>) -> Self {
        Node::Literal(Literal {
            lexical: lexical.into(),
            datatype: Some(datatype.into()),
            language: None,
        })
    }

    pub fn lang_literal(lexical: impl Into<String>, language: impl Into<String>) -> Self {
        Node::Literal(Literal {
            lexical: lexical.into(),
            datatype: None,
            language: Some(language.into()),
        })
    }

    pub fn rdf_type() -> Self {
        Node::Iri(RDF_TYPE_IRI.to_string())
    }

    pub fn is_var(&self) -> bool {
        matches!(self, Node::Var)
    }

    pub fn is_concrete(&self) -> bool {
        !self.is_var()
    }

    pub fn is_literal(&self) -> bool {
        matches!(self, Node::Literal(_))
    }

    pub fn is_resource(&self) -> bool {
        matches!(self, Node::Iri(_) | Node::Blank(_))
    }

    pub fn as_iri(&self) -> Option<&str> {
        match self {
            Node::Iri(iri) => Some(iri.as_str()),
            _ => None,
        }
    }

    /// Whether `self`, read as a pattern, matches `other`.
    ///
    /// The variable sentinel unifies with anything; concrete terms only with
    /// an equal term.
    pub fn unifies_with(&self, other: &Node) -> bool {
        self.is_var() || self == other
    }
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Node::Var => write!(f, "?"),
            Node::Iri(iri) => write!(f, "<{iri}>"),
            Node::Blank(id) => write!(f, "_:{id}"),
            Node::Literal(lit) => {
                write!(f, "\"{}\"", escape_literal(&lit.lexical))?;
                if let Some(lang) = &lit.language {
                    write!(f, "@{lang}")
                } else if let Some(dt) = &lit.datatype {
                    write!(f, "^^<{dt}>")
                } else {
                    Ok(())
                }
            }
        }
    }
}

/// Escape a lexical form for N-Triples / SPARQL string syntax.
pub fn escape_literal(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            other => out.push(other),
        }
    }
    out
}

/// Inverse of [`escape_literal`]. Unknown escapes are kept verbatim.
pub fn unescape_literal(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('r') => out.push('\r'),
            Some('t') => out.push('\t'),
            Some('"') => out.push('"'),
            Some('\\') => out.push('\\'),
            Some(other) => {
                out.push('\\');
                out.push(other);
            }
            None => out.push('\\'),
        }
    }
    out
}

/// A single statement of a bounded description.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Triple {
    pub subject: Node,
    pub predicate: Node,
    pub object: Node,
}

impl Triple {
    pub fn new(subject: Node, predicate: Node, object: Node) -> Self {
        Self {
            subject,
            predicate,
            object,
        }
    }
}

impl fmt::Display for Triple {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {} .", self.subject, self.predicate, self.object)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn var_sorts_first_and_unifies_with_everything() {
        let mut nodes = vec![Node::iri("http://ex.org/a"), Node::literal("x"), Node::Var];
        nodes.sort();
        assert_eq!(nodes[0], Node::Var);
        assert!(Node::Var.unifies_with(&Node::literal("x")));
        assert!(!Node::iri("http://ex.org/a").unifies_with(&Node::Var));
    }

    #[test]
    fn literal_escaping_round_trips() {
        let raw = "say \"hi\"\n\\done";
        assert_eq!(unescape_literal(&escape_literal(raw)), raw);
    }

    #[test]
    fn displays_ntriples_terms() {
        assert_eq!(Node::iri("http://ex.org/a").to_string(), "<http://ex.org/a>");
        assert_eq!(Node::lang_literal("chat", "fr").to_string(), "\"chat\"@fr");
        assert_eq!(
            Node::typed_literal("1", XSD_INTEGER_IRI).to_string(),
            format!("\"1\"^^<{XSD_INTEGER_IRI}>")
        );
    }
}
