//! RDF/OWL loading for qtree.
//!
//! This crate supplies the collaborators the learning core consumes:
//!
//! - [`Graph`]: an in-memory triple store loaded with **Sophia** from
//!   N-Triples (`.nt`), Turtle (`.ttl`), N-Quads (`.nq`), TriG (`.trig`) or
//!   RDF/XML (`.rdf`, `.owl`, `.xml`). Named graphs are merged.
//! - [`MemoryEndpoint`]: answers the BGP query subset and bounded-description
//!   requests over a [`Graph`].
//! - [`ClassHierarchy`] and [`PropertyAxioms`]: super-class lookup and
//!   declared property characteristics.

pub mod endpoint;
pub mod graph;
pub mod owl;

pub use endpoint::MemoryEndpoint;
pub use graph::Graph;
pub use owl::{ClassHierarchy, PropertyAxioms};

use qtree_core::node::{unescape_literal, XSD_STRING_IRI};
use qtree_core::{Node, Triple};
use sophia::api::prelude::*;
use sophia::api::triple::Triple as _;
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RdfFormat {
    NTriples,
    Turtle,
    NQuads,
    TriG,
    RdfXml,
}

impl RdfFormat {
    pub fn from_path(path: &Path) -> Result<Self, IngestError> {
        let ext = path
            .extension()
            .and_then(|s| s.to_str())
            .unwrap_or("")
            .to_lowercase();
        match ext.as_str() {
            "nt" | "ntriples" => Ok(RdfFormat::NTriples),
            "ttl" | "turtle" => Ok(RdfFormat::Turtle),
            "nq" | "nquads" => Ok(RdfFormat::NQuads),
            "trig" => Ok(RdfFormat::TriG),
            "rdf" | "owl" | "xml" => Ok(RdfFormat::RdfXml),
            other => Err(IngestError::UnsupportedFormat(other.to_string())),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum IngestError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {format:?}: {message}")]
    Parse { format: RdfFormat, message: String },

    #[error("unsupported RDF format: .{0}")]
    UnsupportedFormat(String),

    #[error("unsupported RDF term form: {0}")]
    UnsupportedTerm(String),
}

// ============================================================================
// Term conversion
// ============================================================================

/// Convert a term from its N-Triples display form.
fn node_from_display(term: &str) -> Result<Node, IngestError> {
    let s = term.trim();

    if let Some(iri) = s.strip_prefix('<').and_then(|t| t.strip_suffix('>')) {
        return Ok(Node::iri(iri));
    }

    if let Some(id) = s.strip_prefix("_:") {
        return Ok(Node::blank(id));
    }

    if s.starts_with('"') {
        let mut end_quote = None;
        let mut escaped = false;
        for (i, ch) in s.char_indices().skip(1) {
            if ch == '"' && !escaped {
                end_quote = Some(i);
                break;
            }
            escaped = ch == '\\' && !escaped;
        }
        let Some(end) = end_quote else {
            return Err(IngestError::UnsupportedTerm(s.to_string()));
        };

        let lexical = unescape_literal(&s[1..end]);
        let rest = s[end + 1..].trim();
        if let Some(lang) = rest.strip_prefix('@') {
            return Ok(Node::lang_literal(lexical, lang));
        }
        if let Some(dt) = rest.strip_prefix("^^") {
            let dt = dt.trim();
            let dt = dt
                .strip_prefix('<')
                .and_then(|t| t.strip_suffix('>'))
                .unwrap_or(dt);
            if dt == XSD_STRING_IRI || dt.is_empty() {
                return Ok(Node::literal(lexical));
            }
            return Ok(Node::typed_literal(lexical, dt));
        }
        return Ok(Node::literal(lexical));
    }

    Err(IngestError::UnsupportedTerm(s.to_string()))
}

fn push_triple(
    out: &mut Vec<Triple>,
    subject: &str,
    predicate: &str,
    object: &str,
) -> Result<(), IngestError> {
    let subject = node_from_display(subject)?;
    let predicate = node_from_display(predicate)?;
    if !subject.is_resource() || predicate.as_iri().is_none() {
        return Ok(());
    }
    let object = node_from_display(object)?;
    out.push(Triple::new(subject, predicate, object));
    Ok(())
}

macro_rules! collect_statements {
    (triples, $parser:expr, $format:expr) => {{
        let mut out: Vec<Triple> = Vec::new();
        let mut parser = $parser;
        parser
            .try_for_each_triple(|t| -> Result<(), IngestError> {
                push_triple(
                    &mut out,
                    &t.s().to_string(),
                    &t.p().to_string(),
                    &t.o().to_string(),
                )
            })
            .map_err(|e| IngestError::Parse {
                format: $format,
                message: e.to_string(),
            })?;
        out
    }};
    (quads, $parser:expr, $format:expr) => {{
        let mut out: Vec<Triple> = Vec::new();
        let mut parser = $parser;
        parser
            .try_for_each_quad(|q| -> Result<(), IngestError> {
                push_triple(
                    &mut out,
                    &q.s().to_string(),
                    &q.p().to_string(),
                    &q.o().to_string(),
                )
            })
            .map_err(|e| IngestError::Parse {
                format: $format,
                message: e.to_string(),
            })?;
        out
    }};
}

/// Parse RDF bytes into triples, merging named graphs into one.
pub fn parse_triples(bytes: &[u8], format: RdfFormat) -> Result<Vec<Triple>, IngestError> {
    let reader = std::io::BufReader::new(std::io::Cursor::new(bytes));
    let triples = match format {
        RdfFormat::NTriples => collect_statements!(
            triples,
            sophia::turtle::parser::nt::parse_bufread(reader),
            format
        ),
        RdfFormat::Turtle => collect_statements!(
            triples,
            sophia::turtle::parser::turtle::parse_bufread(reader),
            format
        ),
        RdfFormat::NQuads => collect_statements!(
            quads,
            sophia::turtle::parser::nq::parse_bufread(reader),
            format
        ),
        RdfFormat::TriG => collect_statements!(
            quads,
            sophia::turtle::parser::trig::parse_bufread(reader),
            format
        ),
        RdfFormat::RdfXml => {
            collect_statements!(triples, sophia::xml::parser::parse_bufread(reader), format)
        }
    };
    tracing::debug!(?format, triples = triples.len(), "parsed RDF");
    Ok(triples)
}

/// Read and parse an RDF file; the format follows the file extension.
pub fn parse_file(path: &Path) -> Result<Vec<Triple>, IngestError> {
    let format = RdfFormat::from_path(path)?;
    let bytes = std::fs::read(path).map_err(|source| IngestError::Io {
        path: path.display().to_string(),
        source,
    })?;
    parse_triples(&bytes, format)
}

/// Load a file straight into a [`Graph`].
pub fn load_graph(path: &Path) -> Result<Graph, IngestError> {
    let triples = parse_file(path)?;
    tracing::info!(path = %path.display(), triples = triples.len(), "loaded graph");
    Ok(Graph::from_triples(triples))
}
