//! Baseline solutions the learned trees are compared against.

use crate::error::LearnError;
use crate::examples::ExamplesSet;
use qtree_core::metrics::predictive_accuracy;
use qtree_core::{lgg_all, Node, ResourceTree};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Baseline {
    /// `rdf:type` of the class most positives carry.
    MostFrequentType,
    /// The edge/value pair most positives carry.
    MostFrequentEdge,
    /// The edge/value pair with the best predictive accuracy over all
    /// examples.
    #[default]
    MostInformativeEdge,
    /// Generalization of all positives.
    Lgg,
}

impl Baseline {
    pub const ALL: [Baseline; 4] = [
        Baseline::MostFrequentType,
        Baseline::MostFrequentEdge,
        Baseline::MostInformativeEdge,
        Baseline::Lgg,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Baseline::MostFrequentType => "most_frequent_type",
            Baseline::MostFrequentEdge => "most_frequent_edge",
            Baseline::MostInformativeEdge => "most_informative_edge",
            Baseline::Lgg => "lgg",
        }
    }

    /// Compute the baseline solution. Sets without any usable edge yield
    /// the top tree.
    pub fn apply(self, examples: &ExamplesSet) -> Result<ResourceTree, LearnError> {
        let solution = match self {
            Baseline::MostFrequentType => {
                let mut counts: BTreeMap<&Node, usize> = BTreeMap::new();
                for tree in examples.positive_trees() {
                    for child in tree.children(&Node::rdf_type()) {
                        *counts.entry(child.data()).or_default() += 1;
                    }
                }
                most_frequent(counts)
                    .map(|ty| single_edge(Node::rdf_type(), ty.clone()))
                    .unwrap_or_default()
            }
            Baseline::MostFrequentEdge => most_frequent(edge_value_counts(examples))
                .map(|(edge, value)| single_edge(edge.clone(), value.clone()))
                .unwrap_or_default(),
            Baseline::MostInformativeEdge => most_informative_edge(examples),
            Baseline::Lgg => lgg_all(examples.positive_trees())?,
        };
        tracing::debug!(baseline = self.name(), solution = %solution.canonical_string(), "baseline");
        Ok(solution)
    }
}

impl fmt::Display for Baseline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

fn single_edge(edge: Node, value: Node) -> ResourceTree {
    ResourceTree::top().with_child(edge, ResourceTree::new(value))
}

/// Root edge/value pairs over the positives, one count per child.
fn edge_value_counts(examples: &ExamplesSet) -> BTreeMap<(&Node, &Node), usize> {
    let mut counts = BTreeMap::new();
    for tree in examples.positive_trees() {
        for (edge, child) in tree.branches() {
            *counts.entry((edge, child.data())).or_default() += 1;
        }
    }
    counts
}

/// Highest count; the first key in order wins ties.
fn most_frequent<K: Ord>(counts: BTreeMap<K, usize>) -> Option<K> {
    let mut best: Option<(K, usize)> = None;
    for (key, count) in counts {
        if best.as_ref().map_or(true, |(_, c)| count > *c) {
            best = Some((key, count));
        }
    }
    best.map(|(key, _)| key)
}

fn most_informative_edge(examples: &ExamplesSet) -> ResourceTree {
    let nr_pos = examples.positive_count() as u64;
    let nr_neg = examples.negative_count() as u64;

    let mut best = ResourceTree::top();
    let mut best_accuracy = -1.0;
    for ((edge, value), count) in edge_value_counts(examples) {
        let tp = (count as u64).min(nr_pos);
        let fp = examples
            .negative_trees()
            .filter(|n| n.children(edge).any(|c| c.data() == value))
            .count() as u64;
        let tn = nr_neg - fp;
        let accuracy = predictive_accuracy(nr_pos, nr_neg, tp, tn, 1.0);
        if accuracy >= best_accuracy {
            best = single_edge(edge.clone(), value.clone());
            best_accuracy = accuracy;
        }
    }
    best
}
