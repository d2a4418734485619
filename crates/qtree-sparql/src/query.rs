//! A small query model: the basic-graph-pattern subset of SPARQL `SELECT`
//! that resource trees render to and that reference queries are written in.

use qtree_core::node::{escape_literal, Literal, RDF_TYPE_IRI};
use qtree_core::Node;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// Namespace prefix -> namespace IRI.
pub type PrefixMap = BTreeMap<String, String>;

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Term {
    /// A variable, stored without its `?` sigil.
    Var(String),
    /// A concrete IRI or literal. Never `Node::Var`.
    Node(Node),
}

impl Term {
    pub fn var(name: impl Into<String>) -> Self {
        Term::Var(name.into())
    }

    pub fn iri(iri: impl Into<String>) -> Self {
        Term::Node(Node::iri(iri))
    }

    pub fn as_var(&self) -> Option<&str> {
        match self {
            Term::Var(v) => Some(v.as_str()),
            Term::Node(_) => None,
        }
    }

    pub fn is_var(&self) -> bool {
        matches!(self, Term::Var(_))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TriplePattern {
    pub subject: Term,
    pub predicate: Term,
    pub object: Term,
}

impl TriplePattern {
    pub fn new(subject: Term, predicate: Term, object: Term) -> Self {
        Self {
            subject,
            predicate,
            object,
        }
    }

    pub fn vars(&self) -> impl Iterator<Item = &str> {
        [&self.subject, &self.predicate, &self.object]
            .into_iter()
            .filter_map(Term::as_var)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Projection {
    Var(String),
    CountDistinct { var: String, alias: String },
}

impl Projection {
    /// The variable the query is about.
    pub fn target(&self) -> &str {
        match self {
            Projection::Var(v) => v,
            Projection::CountDistinct { var, .. } => var,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectQuery {
    pub base: Option<String>,
    pub prefixes: PrefixMap,
    pub distinct: bool,
    pub projection: Projection,
    pub patterns: Vec<TriplePattern>,
}

impl SelectQuery {
    pub fn new(target: impl Into<String>, patterns: Vec<TriplePattern>) -> Self {
        Self {
            base: None,
            prefixes: PrefixMap::new(),
            distinct: true,
            projection: Projection::Var(target.into()),
            patterns,
        }
    }

    pub fn target(&self) -> &str {
        self.projection.target()
    }

    pub fn is_count(&self) -> bool {
        matches!(self.projection, Projection::CountDistinct { .. })
    }

    pub fn vars(&self) -> BTreeSet<&str> {
        self.patterns.iter().flat_map(TriplePattern::vars).collect()
    }

    /// Keep only the prefix declarations actually used by some pattern.
    pub fn retain_used_prefixes(&mut self) {
        let mut used: BTreeSet<String> = BTreeSet::new();
        for p in &self.patterns {
            for (term, predicate) in [(&p.subject, false), (&p.predicate, true), (&p.object, false)] {
                let iri = match term {
                    Term::Node(Node::Iri(iri)) if predicate && iri == RDF_TYPE_IRI => continue,
                    Term::Node(Node::Iri(iri)) => iri,
                    Term::Node(Node::Literal(Literal {
                        datatype: Some(dt),
                        language: None,
                        ..
                    })) => dt,
                    _ => continue,
                };
                if let Some((prefix, _)) = compact(iri, &self.prefixes) {
                    used.insert(prefix.to_string());
                }
            }
        }
        self.prefixes.retain(|prefix, _| used.contains(prefix));
    }

    fn write_term(&self, f: &mut fmt::Formatter<'_>, term: &Term, predicate: bool) -> fmt::Result {
        match term {
            Term::Var(v) => write!(f, "?{v}"),
            Term::Node(Node::Iri(iri)) => {
                if predicate && iri == RDF_TYPE_IRI {
                    return f.write_str("a");
                }
                self.write_iri(f, iri)
            }
            Term::Node(Node::Literal(lit)) => self.write_literal(f, lit),
            Term::Node(Node::Blank(id)) => write!(f, "_:{id}"),
            Term::Node(Node::Var) => f.write_str("[]"),
        }
    }

    fn write_iri(&self, f: &mut fmt::Formatter<'_>, iri: &str) -> fmt::Result {
        if let Some((prefix, local)) = compact(iri, &self.prefixes) {
            return write!(f, "{prefix}:{local}");
        }
        if let Some(base) = &self.base {
            if let Some(rel) = iri.strip_prefix(base.as_str()) {
                if !rel.is_empty() && is_local_name(rel) {
                    return write!(f, "<{rel}>");
                }
            }
        }
        write!(f, "<{iri}>")
    }

    fn write_literal(&self, f: &mut fmt::Formatter<'_>, lit: &Literal) -> fmt::Result {
        write!(f, "\"{}\"", escape_literal(&lit.lexical))?;
        if let Some(lang) = &lit.language {
            write!(f, "@{lang}")
        } else if let Some(dt) = &lit.datatype {
            f.write_str("^^")?;
            self.write_iri(f, dt)
        } else {
            Ok(())
        }
    }
}

impl fmt::Display for SelectQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(base) = &self.base {
            writeln!(f, "BASE <{base}>")?;
        }
        for (prefix, ns) in &self.prefixes {
            writeln!(f, "PREFIX {prefix}: <{ns}>")?;
        }
        f.write_str("SELECT ")?;
        if self.distinct && !self.is_count() {
            f.write_str("DISTINCT ")?;
        }
        match &self.projection {
            Projection::Var(v) => write!(f, "?{v}")?,
            Projection::CountDistinct { var, alias } => {
                write!(f, "(COUNT(DISTINCT ?{var}) AS ?{alias})")?
            }
        }
        writeln!(f, " WHERE {{")?;
        for p in &self.patterns {
            f.write_str("  ")?;
            self.write_term(f, &p.subject, false)?;
            f.write_str(" ")?;
            self.write_term(f, &p.predicate, true)?;
            f.write_str(" ")?;
            self.write_term(f, &p.object, false)?;
            writeln!(f, " .")?;
        }
        f.write_str("}")
    }
}

pub(crate) fn is_local_name(s: &str) -> bool {
    !s.is_empty()
        && s.chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}

/// Longest matching namespace wins.
fn compact<'p>(iri: &'p str, prefixes: &'p PrefixMap) -> Option<(&'p str, &'p str)> {
    prefixes
        .iter()
        .filter_map(|(prefix, ns)| {
            let local = iri.strip_prefix(ns.as_str())?;
            is_local_name(local).then_some((prefix.as_str(), local, ns.len()))
        })
        .max_by_key(|(_, _, len)| *len)
        .map(|(prefix, local, _)| (prefix, local))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn displays_count_query() {
        let q = SelectQuery {
            projection: Projection::CountDistinct {
                var: "s".into(),
                alias: "cnt".into(),
            },
            ..SelectQuery::new(
                "s",
                vec![TriplePattern::new(
                    Term::var("s"),
                    Term::iri(RDF_TYPE_IRI),
                    Term::var("type"),
                )],
            )
        };
        assert_eq!(
            q.to_string(),
            "SELECT (COUNT(DISTINCT ?s) AS ?cnt) WHERE {\n  ?s a ?type .\n}"
        );
    }

    #[test]
    fn compacts_iris_with_longest_prefix() {
        let mut prefixes = PrefixMap::new();
        prefixes.insert("ex".into(), "http://ex.org/".into());
        prefixes.insert("exo".into(), "http://ex.org/onto/".into());
        prefixes.insert("unused".into(), "http://unused.org/".into());
        let mut q = SelectQuery::new(
            "x0",
            vec![TriplePattern::new(
                Term::var("x0"),
                Term::iri("http://ex.org/onto/knows"),
                Term::iri("http://ex.org/bob"),
            )],
        );
        q.prefixes = prefixes;
        q.retain_used_prefixes();
        let text = q.to_string();
        assert!(text.contains("exo:knows ex:bob"));
        assert!(!text.contains("unused"));
    }
}
