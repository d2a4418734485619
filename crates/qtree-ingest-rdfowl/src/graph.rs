//! In-memory triple store with subject, predicate and object indexes.

use qtree_core::{Node, Triple, RDF_TYPE_IRI};
use std::collections::{BTreeMap, BTreeSet, VecDeque};

#[derive(Debug, Clone, Default)]
pub struct Graph {
    triples: BTreeSet<Triple>,
    by_subject: BTreeMap<Node, BTreeSet<Triple>>,
    by_predicate: BTreeMap<Node, BTreeSet<Triple>>,
    by_object: BTreeMap<Node, BTreeSet<Triple>>,
}

impl Graph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_triples<I: IntoIterator<Item = Triple>>(triples: I) -> Self {
        let mut graph = Self::new();
        for t in triples {
            graph.insert(t);
        }
        graph
    }

    /// Returns `false` if the triple was already present.
    pub fn insert(&mut self, triple: Triple) -> bool {
        if !self.triples.insert(triple.clone()) {
            return false;
        }
        self.by_subject
            .entry(triple.subject.clone())
            .or_default()
            .insert(triple.clone());
        self.by_predicate
            .entry(triple.predicate.clone())
            .or_default()
            .insert(triple.clone());
        self.by_object
            .entry(triple.object.clone())
            .or_default()
            .insert(triple);
        true
    }

    pub fn len(&self) -> usize {
        self.triples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.triples.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Triple> {
        self.triples.iter()
    }

    pub fn contains(&self, triple: &Triple) -> bool {
        self.triples.contains(triple)
    }

    pub fn outgoing(&self, subject: &Node) -> impl Iterator<Item = &Triple> {
        self.by_subject.get(subject).into_iter().flatten()
    }

    /// All triples matching the bound positions; `None` matches anything.
    ///
    /// The smallest available index is scanned.
    pub fn matches<'g>(
        &'g self,
        subject: Option<&Node>,
        predicate: Option<&Node>,
        object: Option<&Node>,
    ) -> Box<dyn Iterator<Item = &'g Triple> + 'g> {
        let candidates: [(Option<&BTreeSet<Triple>>, bool); 3] = [
            (subject.and_then(|s| self.by_subject.get(s)), subject.is_some()),
            (predicate.and_then(|p| self.by_predicate.get(p)), predicate.is_some()),
            (object.and_then(|o| self.by_object.get(o)), object.is_some()),
        ];
        if candidates.iter().any(|(set, bound)| *bound && set.is_none()) {
            return Box::new(std::iter::empty());
        }

        let smallest = candidates
            .iter()
            .filter_map(|(set, _)| *set)
            .min_by_key(|set| set.len());
        let source: Box<dyn Iterator<Item = &'g Triple> + 'g> = match smallest {
            Some(set) => Box::new(set.iter()),
            None => Box::new(self.triples.iter()),
        };

        let subject = subject.cloned();
        let predicate = predicate.cloned();
        let object = object.cloned();
        Box::new(source.filter(move |t| {
            subject.as_ref().map_or(true, |s| &t.subject == s)
                && predicate.as_ref().map_or(true, |p| &t.predicate == p)
                && object.as_ref().map_or(true, |o| &t.object == o)
        }))
    }

    /// Outgoing triples reachable from `resource` in at most `depth` hops.
    ///
    /// Depth 0 yields nothing; depth 1 yields the resource's own triples.
    pub fn bounded_description(&self, resource: &Node, depth: usize) -> Vec<Triple> {
        let mut out = BTreeSet::new();
        let mut seen: BTreeSet<&Node> = BTreeSet::new();
        let mut queue: VecDeque<(&Node, usize)> = VecDeque::new();
        queue.push_back((resource, 0));
        seen.insert(resource);

        while let Some((node, hops)) = queue.pop_front() {
            if hops >= depth {
                continue;
            }
            for t in self.outgoing(node) {
                out.insert(t.clone());
                if t.object.is_resource() && seen.insert(&t.object) {
                    queue.push_back((&t.object, hops + 1));
                }
            }
        }
        out.into_iter().collect()
    }

    /// Subjects carrying at least one `rdf:type` assertion.
    pub fn typed_instances(&self) -> BTreeSet<Node> {
        self.matches(None, Some(&Node::iri(RDF_TYPE_IRI)), None)
            .map(|t| t.subject.clone())
            .collect()
    }

    pub fn instances_of(&self, class: &Node) -> BTreeSet<Node> {
        self.matches(None, Some(&Node::iri(RDF_TYPE_IRI)), Some(class))
            .map(|t| t.subject.clone())
            .collect()
    }
}

impl FromIterator<Triple> for Graph {
    fn from_iter<I: IntoIterator<Item = Triple>>(iter: I) -> Self {
        Graph::from_triples(iter)
    }
}
