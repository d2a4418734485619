//! Parser for the `SELECT` / basic-graph-pattern subset of SPARQL.
//!
//! Supported:
//! - `BASE <iri>` and `PREFIX p: <iri>` declarations,
//! - `SELECT [DISTINCT] ?v` and `SELECT (COUNT([DISTINCT] ?v) AS ?alias)`,
//! - an optional `WHERE` keyword followed by `{ ... }` with triple patterns,
//!   including `;` and `,` abbreviations,
//! - IRIs, prefixed names, `a`, `?`/`$` variables, plain/typed/language
//!   literals and integers, `#` comments.
//!
//! Parsing is done in two passes: nom recognizes the syntax into borrowed raw
//! terms, then prefixed names and relative IRIs are resolved against the
//! prologue.

use crate::query::{PrefixMap, Projection, SelectQuery, Term, TriplePattern};
use nom::{
    branch::alt,
    bytes::complete::{tag, tag_no_case, take_while, take_while1},
    character::complete::{
        alpha1, alphanumeric1, anychar, char as pchar, digit1, multispace1, none_of, one_of,
        satisfy,
    },
    combinator::{all_consuming, map, opt, peek, recognize, value},
    multi::{many0, separated_list1},
    sequence::{delimited, pair, preceded, separated_pair, terminated, tuple},
    IResult,
};
use qtree_core::node::{unescape_literal, XSD_INTEGER_IRI};
use qtree_core::{Node, RDF_TYPE_IRI};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QueryParseError {
    #[error("syntax error at offset {offset}: {message}")]
    Syntax { offset: usize, message: String },

    #[error("undeclared prefix `{0}:`")]
    UnknownPrefix(String),

    #[error("projected variable ?{0} does not occur in the WHERE clause")]
    UnboundProjection(String),
}

/// Parse a query string.
pub fn parse_query(text: &str) -> Result<SelectQuery, QueryParseError> {
    let raw = match all_consuming(query)(text) {
        Ok((_, raw)) => raw,
        Err(nom::Err::Error(e)) | Err(nom::Err::Failure(e)) => {
            let offset = text.len() - e.input.len();
            let snippet: String = e.input.chars().take(24).collect();
            return Err(QueryParseError::Syntax {
                offset,
                message: format!("unexpected input near `{snippet}`"),
            });
        }
        Err(nom::Err::Incomplete(_)) => {
            return Err(QueryParseError::Syntax {
                offset: text.len(),
                message: "unexpected end of query".to_string(),
            })
        }
    };
    raw.resolve()
}

// ============================================================================
// Raw syntax
// ============================================================================

#[derive(Debug, Clone, Copy)]
enum RawIri<'a> {
    Full(&'a str),
    Prefixed(&'a str, &'a str),
}

#[derive(Debug, Clone, Copy)]
enum RawTerm<'a> {
    Var(&'a str),
    Iri(RawIri<'a>),
    Literal {
        lexical: &'a str,
        language: Option<&'a str>,
        datatype: Option<RawIri<'a>>,
    },
    Integer(&'a str),
    TypeKeyword,
}

enum Decl<'a> {
    Base(&'a str),
    Prefix(&'a str, &'a str),
}

enum RawProjection<'a> {
    Var(&'a str),
    Count { var: &'a str, alias: &'a str },
}

struct RawQuery<'a> {
    decls: Vec<Decl<'a>>,
    distinct: bool,
    projection: RawProjection<'a>,
    patterns: Vec<(RawTerm<'a>, RawTerm<'a>, RawTerm<'a>)>,
}

fn is_pn_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_' || c == '-'
}

fn comment(input: &str) -> IResult<&str, &str> {
    recognize(pair(pchar('#'), take_while(|c| c != '\n')))(input)
}

/// Whitespace and comments.
fn sp(input: &str) -> IResult<&str, ()> {
    value((), many0(alt((multispace1, comment))))(input)
}

fn iriref(input: &str) -> IResult<&str, &str> {
    delimited(
        pchar('<'),
        take_while(|c: char| c != '>' && c != '<' && c != '"' && !c.is_whitespace()),
        pchar('>'),
    )(input)
}

fn pname(input: &str) -> IResult<&str, (&str, &str)> {
    separated_pair(take_while(is_pn_char), pchar(':'), take_while(is_pn_char))(input)
}

fn raw_iri(input: &str) -> IResult<&str, RawIri<'_>> {
    alt((
        map(iriref, RawIri::Full),
        map(pname, |(prefix, local)| RawIri::Prefixed(prefix, local)),
    ))(input)
}

fn var(input: &str) -> IResult<&str, &str> {
    preceded(
        one_of("?$"),
        take_while1(|c: char| c.is_ascii_alphanumeric() || c == '_'),
    )(input)
}

fn string_body(input: &str) -> IResult<&str, &str> {
    delimited(
        pchar('"'),
        recognize(many0(alt((
            recognize(pair(pchar('\\'), anychar)),
            recognize(none_of("\"\\")),
        )))),
        pchar('"'),
    )(input)
}

fn lang_tag(input: &str) -> IResult<&str, &str> {
    preceded(
        pchar('@'),
        recognize(pair(alpha1, many0(pair(pchar('-'), alphanumeric1)))),
    )(input)
}

fn literal(input: &str) -> IResult<&str, RawTerm<'_>> {
    let (input, lexical) = string_body(input)?;
    let (input, language) = opt(lang_tag)(input)?;
    let (input, datatype) = if language.is_none() {
        opt(preceded(tag("^^"), raw_iri))(input)?
    } else {
        (input, None)
    };
    Ok((
        input,
        RawTerm::Literal {
            lexical,
            language,
            datatype,
        },
    ))
}

fn integer(input: &str) -> IResult<&str, RawTerm<'_>> {
    map(recognize(pair(opt(one_of("+-")), digit1)), RawTerm::Integer)(input)
}

fn term(input: &str) -> IResult<&str, RawTerm<'_>> {
    alt((
        map(var, RawTerm::Var),
        literal,
        integer,
        map(raw_iri, RawTerm::Iri),
    ))(input)
}

fn verb(input: &str) -> IResult<&str, RawTerm<'_>> {
    alt((
        term,
        value(
            RawTerm::TypeKeyword,
            terminated(pchar('a'), peek(satisfy(|c: char| c.is_whitespace()))),
        ),
    ))(input)
}

fn object_list(input: &str) -> IResult<&str, Vec<RawTerm<'_>>> {
    separated_list1(tuple((sp, pchar(','), sp)), term)(input)
}

fn predicate_object(input: &str) -> IResult<&str, (RawTerm<'_>, Vec<RawTerm<'_>>)> {
    separated_pair(verb, sp, object_list)(input)
}

type RawPattern<'a> = (RawTerm<'a>, RawTerm<'a>, RawTerm<'a>);

fn triples_same_subject(input: &str) -> IResult<&str, Vec<RawPattern<'_>>> {
    let (input, subject) = term(input)?;
    let (input, _) = sp(input)?;
    let (input, first) = predicate_object(input)?;
    let (input, rest) = many0(preceded(tuple((sp, pchar(';'), sp)), opt(predicate_object)))(input)?;

    let mut out = Vec::new();
    for (predicate, objects) in std::iter::once(first).chain(rest.into_iter().flatten()) {
        for object in objects {
            out.push((subject, predicate, object));
        }
    }
    Ok((input, out))
}

fn triples_block(input: &str) -> IResult<&str, Vec<RawPattern<'_>>> {
    let (input, groups) = many0(terminated(
        preceded(sp, triples_same_subject),
        opt(preceded(sp, pchar('.'))),
    ))(input)?;
    Ok((input, groups.into_iter().flatten().collect()))
}

fn base_decl(input: &str) -> IResult<&str, Decl<'_>> {
    map(preceded(pair(tag_no_case("BASE"), sp), iriref), Decl::Base)(input)
}

fn prefix_decl(input: &str) -> IResult<&str, Decl<'_>> {
    map(
        tuple((
            tag_no_case("PREFIX"),
            sp,
            take_while(is_pn_char),
            pchar(':'),
            sp,
            iriref,
        )),
        |(_, _, prefix, _, _, ns)| Decl::Prefix(prefix, ns),
    )(input)
}

fn count_projection(input: &str) -> IResult<&str, RawProjection<'_>> {
    let (input, _) = pchar('(')(input)?;
    let (input, _) = sp(input)?;
    let (input, _) = tag_no_case("COUNT")(input)?;
    let (input, _) = sp(input)?;
    let (input, _) = pchar('(')(input)?;
    let (input, _) = sp(input)?;
    let (input, _) = opt(terminated(tag_no_case("DISTINCT"), sp))(input)?;
    let (input, v) = var(input)?;
    let (input, _) = sp(input)?;
    let (input, _) = pchar(')')(input)?;
    let (input, _) = sp(input)?;
    let (input, _) = tag_no_case("AS")(input)?;
    let (input, _) = sp(input)?;
    let (input, alias) = var(input)?;
    let (input, _) = sp(input)?;
    let (input, _) = pchar(')')(input)?;
    Ok((input, RawProjection::Count { var: v, alias }))
}

fn query(input: &str) -> IResult<&str, RawQuery<'_>> {
    let (input, decls) = many0(preceded(sp, alt((base_decl, prefix_decl))))(input)?;
    let (input, _) = sp(input)?;
    let (input, _) = tag_no_case("SELECT")(input)?;
    let (input, _) = sp(input)?;
    let (input, distinct) = opt(terminated(tag_no_case("DISTINCT"), sp))(input)?;
    let (input, projection) = alt((map(var, RawProjection::Var), count_projection))(input)?;
    let (input, _) = sp(input)?;
    let (input, _) = opt(terminated(tag_no_case("WHERE"), sp))(input)?;
    let (input, _) = pchar('{')(input)?;
    let (input, patterns) = triples_block(input)?;
    let (input, _) = sp(input)?;
    let (input, _) = pchar('}')(input)?;
    let (input, _) = sp(input)?;
    Ok((
        input,
        RawQuery {
            decls,
            distinct: distinct.is_some(),
            projection,
            patterns,
        },
    ))
}

// ============================================================================
// Resolution
// ============================================================================

impl<'a> RawQuery<'a> {
    fn resolve(self) -> Result<SelectQuery, QueryParseError> {
        let mut base = None;
        let mut prefixes = PrefixMap::new();
        for decl in &self.decls {
            match decl {
                Decl::Base(iri) => base = Some(iri.to_string()),
                Decl::Prefix(prefix, ns) => {
                    prefixes.insert(prefix.to_string(), ns.to_string());
                }
            }
        }

        let resolver = Resolver {
            base: base.as_deref(),
            prefixes: &prefixes,
        };
        let patterns = self
            .patterns
            .iter()
            .map(|(s, p, o)| {
                Ok(TriplePattern::new(
                    resolver.term(s)?,
                    resolver.term(p)?,
                    resolver.term(o)?,
                ))
            })
            .collect::<Result<Vec<_>, QueryParseError>>()?;

        let projection = match self.projection {
            RawProjection::Var(v) => Projection::Var(v.to_string()),
            RawProjection::Count { var, alias } => Projection::CountDistinct {
                var: var.to_string(),
                alias: alias.to_string(),
            },
        };
        let target = projection.target().to_string();
        if !patterns
            .iter()
            .any(|p| p.vars().any(|v| v == target.as_str()))
        {
            return Err(QueryParseError::UnboundProjection(target));
        }

        Ok(SelectQuery {
            base,
            prefixes,
            distinct: self.distinct,
            projection,
            patterns,
        })
    }
}

struct Resolver<'q> {
    base: Option<&'q str>,
    prefixes: &'q PrefixMap,
}

impl Resolver<'_> {
    fn iri(&self, raw: &RawIri<'_>) -> Result<String, QueryParseError> {
        match raw {
            RawIri::Full(iri) => match self.base {
                Some(base) if !iri.contains(':') => Ok(format!("{base}{iri}")),
                _ => Ok(iri.to_string()),
            },
            RawIri::Prefixed(prefix, local) => self
                .prefixes
                .get(*prefix)
                .map(|ns| format!("{ns}{local}"))
                .ok_or_else(|| QueryParseError::UnknownPrefix(prefix.to_string())),
        }
    }

    fn term(&self, raw: &RawTerm<'_>) -> Result<Term, QueryParseError> {
        Ok(match raw {
            RawTerm::Var(v) => Term::Var(v.to_string()),
            RawTerm::Iri(iri) => Term::Node(Node::Iri(self.iri(iri)?)),
            RawTerm::TypeKeyword => Term::Node(Node::iri(RDF_TYPE_IRI)),
            RawTerm::Integer(lexical) => Term::Node(Node::typed_literal(
                lexical.trim_start_matches('+'),
                XSD_INTEGER_IRI,
            )),
            RawTerm::Literal {
                lexical,
                language,
                datatype,
            } => {
                let lexical = unescape_literal(lexical);
                let node = match (language, datatype) {
                    (Some(lang), _) => Node::lang_literal(lexical, *lang),
                    (None, Some(dt)) => Node::typed_literal(lexical, self.iri(dt)?),
                    (None, None) => Node::literal(lexical),
                };
                Term::Node(node)
            }
        })
    }
}
