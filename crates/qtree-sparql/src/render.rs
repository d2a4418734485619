//! Resource tree -> `SELECT` query.

use crate::query::{PrefixMap, SelectQuery, Term, TriplePattern};
use qtree_core::{Node, ResourceTree};

/// The projected variable every rendered query binds the root to.
pub const ROOT_VAR: &str = "x0";

/// Fresh variable names for one rendering.
///
/// Counters live here rather than in any global so that renderings are
/// reproducible and independent.
#[derive(Debug, Clone, Default)]
pub struct VarAllocator {
    next_node: usize,
    next_predicate: usize,
}

impl VarAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start numbering node variables at `first` (e.g. after `x0`).
    pub fn starting_at(first: usize) -> Self {
        Self {
            next_node: first,
            next_predicate: 0,
        }
    }

    pub fn node(&mut self) -> String {
        let v = format!("x{}", self.next_node);
        self.next_node += 1;
        v
    }

    pub fn predicate(&mut self) -> String {
        let v = format!("p{}", self.next_predicate);
        self.next_predicate += 1;
        v
    }
}

/// Flatten `tree` into triple patterns with the root bound to `?x0`.
///
/// The root's own data is ignored: the query asks for resources that look
/// like the tree, not for the example the tree was built from. Variable and
/// blank-node children become fresh variables; concrete children are kept
/// verbatim and their own edges are emitted with them as subject. A tree
/// without edges renders to the single pattern `?x0 ?p0 ?o0`.
pub fn tree_to_patterns(tree: &ResourceTree) -> Vec<TriplePattern> {
    let mut vars = VarAllocator::starting_at(1);
    let mut patterns = Vec::with_capacity(tree.branch_count());
    if tree.is_leaf() {
        patterns.push(TriplePattern::new(
            Term::var(ROOT_VAR),
            Term::var(vars.predicate()),
            Term::var("o0"),
        ));
        return patterns;
    }
    emit(tree, Term::var(ROOT_VAR), &mut vars, &mut patterns);
    patterns
}

fn emit(
    tree: &ResourceTree,
    subject: Term,
    vars: &mut VarAllocator,
    patterns: &mut Vec<TriplePattern>,
) {
    for (edge, child) in tree.branches() {
        let predicate = match edge {
            Node::Var | Node::Blank(_) => Term::var(vars.predicate()),
            concrete => Term::Node(concrete.clone()),
        };
        let object = match child.data() {
            Node::Var | Node::Blank(_) => Term::var(vars.node()),
            concrete => Term::Node(concrete.clone()),
        };
        patterns.push(TriplePattern::new(subject.clone(), predicate, object.clone()));
        emit(child, object, vars, patterns);
    }
}

/// Render `tree` as `SELECT DISTINCT ?x0 WHERE { ... }`.
///
/// Only prefixes that abbreviate some IRI of the result are declared.
pub fn render(tree: &ResourceTree, base: Option<&str>, prefixes: &PrefixMap) -> SelectQuery {
    let mut query = SelectQuery::new(ROOT_VAR, tree_to_patterns(tree));
    query.base = base.map(str::to_string);
    query.prefixes = prefixes.clone();
    query.retain_used_prefixes();
    query
}

/// [`render`] straight to text.
pub fn render_string(tree: &ResourceTree, base: Option<&str>, prefixes: &PrefixMap) -> String {
    render(tree, base, prefixes).to_string()
}
