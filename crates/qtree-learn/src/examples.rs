//! Labelled examples for a learning task.
//!
//! An [`ExamplesSet`] maps every example resource to its tree. Positives are
//! split into correct ones and injected noise (negatives presented as
//! positives); the learner sees both as positive, the evaluation harness
//! tells them apart.

use crate::error::{InputError, LearnError};
use qtree_core::{Node, ResourceTree, TreeFactory};
use qtree_sparql::{Endpoint, SelectQuery, Term};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

// ============================================================================
// Examples set
// ============================================================================

#[derive(Debug, Clone)]
pub struct ExamplesSet {
    positives: BTreeMap<Node, ResourceTree>,
    noisy: BTreeSet<Node>,
    negatives: BTreeMap<Node, ResourceTree>,
}

impl ExamplesSet {
    /// Validate and assemble an examples set.
    ///
    /// Identifiers must be unique across all three groups, positives and
    /// negatives must be non-empty and noise may make up at most half of the
    /// positives.
    pub fn new(
        correct_positives: Vec<(Node, ResourceTree)>,
        false_positives: Vec<(Node, ResourceTree)>,
        negatives: Vec<(Node, ResourceTree)>,
    ) -> Result<Self, InputError> {
        let mut positive_map = BTreeMap::new();
        let mut noisy = BTreeSet::new();
        for (node, tree) in correct_positives {
            if positive_map.insert(node.clone(), tree).is_some() {
                return Err(InputError::DuplicateExample(node.to_string()));
            }
        }
        for (node, tree) in false_positives {
            if positive_map.insert(node.clone(), tree).is_some() {
                return Err(InputError::DuplicateExample(node.to_string()));
            }
            noisy.insert(node);
        }

        let mut negative_map = BTreeMap::new();
        for (node, tree) in negatives {
            if positive_map.contains_key(&node) {
                return Err(InputError::OverlappingExamples(node.to_string()));
            }
            if negative_map.insert(node.clone(), tree).is_some() {
                return Err(InputError::DuplicateExample(node.to_string()));
            }
        }

        if positive_map.is_empty() {
            return Err(InputError::NoPositiveExamples);
        }
        if negative_map.is_empty() {
            return Err(InputError::NoNegativeExamples);
        }
        if noisy.len() > positive_map.len() / 2 {
            return Err(InputError::ExcessiveNoise {
                noisy: noisy.len(),
                total: positive_map.len(),
            });
        }

        Ok(Self {
            positives: positive_map,
            noisy,
            negatives: negative_map,
        })
    }

    /// All positives, noise included, in identifier order.
    pub fn positives(&self) -> impl Iterator<Item = (&Node, &ResourceTree)> {
        self.positives.iter()
    }

    pub fn negatives(&self) -> impl Iterator<Item = (&Node, &ResourceTree)> {
        self.negatives.iter()
    }

    pub fn correct_positives(&self) -> impl Iterator<Item = (&Node, &ResourceTree)> {
        self.positives.iter().filter(|(n, _)| !self.noisy.contains(*n))
    }

    pub fn noisy_positives(&self) -> impl Iterator<Item = (&Node, &ResourceTree)> {
        self.positives.iter().filter(|(n, _)| self.noisy.contains(*n))
    }

    pub fn positive_trees(&self) -> impl Iterator<Item = &ResourceTree> {
        self.positives.values()
    }

    pub fn negative_trees(&self) -> impl Iterator<Item = &ResourceTree> {
        self.negatives.values()
    }

    pub fn positive_count(&self) -> usize {
        self.positives.len()
    }

    pub fn negative_count(&self) -> usize {
        self.negatives.len()
    }

    pub fn noise_count(&self) -> usize {
        self.noisy.len()
    }

    /// Observed noise ratio.
    pub fn noise(&self) -> f64 {
        self.noisy.len() as f64 / self.positives.len() as f64
    }
}

// ============================================================================
// Example candidates
// ============================================================================

/// Number of positives replaced by noise: `ceil(noise * n)`, at most `n / 2`.
pub fn noise_replacements(noise: f64, positives: usize) -> usize {
    if noise <= 0.0 || positives == 0 {
        return 0;
    }
    let wanted = (noise * positives as f64).ceil() as usize;
    wanted.min(positives / 2)
}

/// How noise candidates (negatives later presented as positives) are found.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NoiseMethod {
    /// A seeded random sample of typed resources outside the reference
    /// answers and the negatives.
    #[default]
    Random,
    /// Near misses: resources matching the reference once one pattern's
    /// concrete object is replaced by a variable, minus the reference
    /// answers. Falls back to `Random` when no pattern can be relaxed or
    /// nothing is found.
    Similar,
}

/// Pools from which examples for one reference query are drawn.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExampleCandidates {
    pub positives: Vec<Node>,
    pub negatives: Vec<Node>,
    pub noise: Vec<Node>,
}

/// Resources chosen for one task, before their trees are built.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExampleSelection {
    pub correct_positives: Vec<Node>,
    pub false_positives: Vec<Node>,
    pub negatives: Vec<Node>,
}

impl ExampleCandidates {
    /// Positives are the reference answers. Negatives are typed resources
    /// outside them; noise candidates are a seeded random sample of the
    /// typed resources left over.
    pub fn from_reference<E: Endpoint + ?Sized>(
        endpoint: &E,
        reference: &SelectQuery,
        max_negatives: usize,
        max_noise: usize,
        seed: u64,
    ) -> Result<Self, LearnError> {
        Self::from_reference_with(
            endpoint,
            reference,
            max_negatives,
            max_noise,
            NoiseMethod::Random,
            seed,
        )
    }

    /// Like [`ExampleCandidates::from_reference`] with a choice of noise
    /// method. Near-miss noise is chosen before the negatives so that the
    /// two pools stay disjoint.
    pub fn from_reference_with<E: Endpoint + ?Sized>(
        endpoint: &E,
        reference: &SelectQuery,
        max_negatives: usize,
        max_noise: usize,
        method: NoiseMethod,
        seed: u64,
    ) -> Result<Self, LearnError> {
        let positives = endpoint.resources(reference)?;
        let typed = endpoint.resources(&typed_resources_query())?;

        if method == NoiseMethod::Similar {
            let noise = near_misses(endpoint, reference, &positives, max_noise)?;
            if !noise.is_empty() {
                let negatives: Vec<Node> = typed
                    .iter()
                    .filter(|n| !positives.contains(*n) && !noise.contains(*n))
                    .take(max_negatives)
                    .cloned()
                    .collect();
                tracing::info!(
                    positives = positives.len(),
                    negatives = negatives.len(),
                    noise = noise.len(),
                    method = ?method,
                    "generated example candidates"
                );
                return Ok(Self {
                    positives: positives.into_iter().collect(),
                    negatives,
                    noise,
                });
            }
            tracing::debug!(query = %reference, "no near misses, sampling noise at random");
        }

        let negatives: Vec<Node> = typed
            .iter()
            .filter(|n| !positives.contains(*n))
            .take(max_negatives)
            .cloned()
            .collect();

        let mut rest: Vec<Node> = typed
            .into_iter()
            .filter(|n| !positives.contains(n) && !negatives.contains(n))
            .collect();
        let mut rng = StdRng::seed_from_u64(seed);
        rest.shuffle(&mut rng);
        rest.truncate(max_noise);
        rest.sort();

        tracing::info!(
            positives = positives.len(),
            negatives = negatives.len(),
            noise = rest.len(),
            "generated example candidates"
        );
        Ok(Self {
            positives: positives.into_iter().collect(),
            negatives,
            noise: rest,
        })
    }

    /// Draw a deterministic selection.
    ///
    /// Each pool is sorted and shuffled with one seeded generator. Noise then
    /// replaces the first [`noise_replacements`] positives, bounded by the
    /// size of the noise pool.
    pub fn select(
        &self,
        nr_positives: usize,
        nr_negatives: usize,
        noise: f64,
        seed: u64,
    ) -> ExampleSelection {
        let mut rng = StdRng::seed_from_u64(seed);

        let mut positives = self.positives.clone();
        positives.sort();
        positives.shuffle(&mut rng);
        positives.truncate(nr_positives);

        let mut negatives = self.negatives.clone();
        negatives.sort();
        negatives.shuffle(&mut rng);
        negatives.truncate(nr_negatives);

        let mut false_positives = Vec::new();
        if noise > 0.0 {
            let mut pool = self.noise.clone();
            pool.sort();
            pool.shuffle(&mut rng);
            let replace = noise_replacements(noise, positives.len()).min(pool.len());
            tracing::info!(
                replace,
                positives = positives.len(),
                "replacing positives to introduce noise"
            );
            positives.drain(..replace);
            pool.truncate(replace);
            false_positives = pool;
        }

        positives.sort();
        negatives.sort();
        false_positives.sort();
        ExampleSelection {
            correct_positives: positives,
            false_positives,
            negatives,
        }
    }
}

/// Resources matching `reference` with one concrete object relaxed to a
/// variable, excluding `positives`. Sorted, at most `limit`.
fn near_misses<E: Endpoint + ?Sized>(
    endpoint: &E,
    reference: &SelectQuery,
    positives: &BTreeSet<Node>,
    limit: usize,
) -> Result<Vec<Node>, LearnError> {
    let taken = reference.vars();
    let mut fresh = String::from("relaxed");
    while taken.contains(fresh.as_str()) {
        fresh.push('_');
    }

    let mut found = BTreeSet::new();
    for (i, pattern) in reference.patterns.iter().enumerate() {
        if !matches!(pattern.object, Term::Node(_)) {
            continue;
        }
        let mut relaxed = reference.clone();
        relaxed.patterns[i].object = Term::var(fresh.clone());
        found.extend(
            endpoint
                .resources(&relaxed)?
                .into_iter()
                .filter(|n| !positives.contains(n)),
        );
    }
    Ok(found.into_iter().take(limit).collect())
}

impl ExampleSelection {
    /// Build example trees from bounded descriptions.
    ///
    /// A resource whose description cannot be fetched is dropped with a
    /// warning; the remaining examples are validated as an [`ExamplesSet`].
    pub fn build<E: Endpoint + ?Sized>(
        &self,
        endpoint: &E,
        factory: &TreeFactory,
    ) -> Result<ExamplesSet, LearnError> {
        let build_all = |nodes: &[Node]| -> Vec<(Node, ResourceTree)> {
            nodes
                .iter()
                .filter_map(|node| {
                    match endpoint.construct_description(node, factory.config().max_depth) {
                        Ok(triples) => Some((node.clone(), factory.build(node, &triples))),
                        Err(e) => {
                            tracing::warn!(example = %node, error = %e, "dropping example");
                            None
                        }
                    }
                })
                .collect()
        };
        ExamplesSet::new(
            build_all(&self.correct_positives),
            build_all(&self.false_positives),
            build_all(&self.negatives),
        )
        .map_err(LearnError::from)
    }
}

/// `SELECT DISTINCT ?x0 WHERE { ?x0 a ?x1 . }`
pub fn typed_resources_query() -> SelectQuery {
    qtree_sparql::render(
        &ResourceTree::top().with_child(Node::rdf_type(), ResourceTree::var()),
        None,
        &Default::default(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ex(s: &str) -> Node {
        Node::iri(format!("http://ex.org/{s}"))
    }

    fn leaf(s: &str) -> (Node, ResourceTree) {
        (ex(s), ResourceTree::new(ex(s)))
    }

    #[test]
    fn rejects_empty_and_overlapping_sets() {
        assert_eq!(
            ExamplesSet::new(vec![], vec![], vec![leaf("n")]).unwrap_err(),
            InputError::NoPositiveExamples
        );
        assert_eq!(
            ExamplesSet::new(vec![leaf("p")], vec![], vec![]).unwrap_err(),
            InputError::NoNegativeExamples
        );
        assert!(matches!(
            ExamplesSet::new(vec![leaf("p")], vec![], vec![leaf("p")]).unwrap_err(),
            InputError::OverlappingExamples(_)
        ));
        assert!(matches!(
            ExamplesSet::new(vec![leaf("p"), leaf("p")], vec![], vec![leaf("n")]).unwrap_err(),
            InputError::DuplicateExample(_)
        ));
    }

    #[test]
    fn noise_is_bounded_by_half_the_positives() {
        let ok = ExamplesSet::new(vec![leaf("p")], vec![leaf("f")], vec![leaf("n")]);
        assert_eq!(ok.expect("one of two is noise").noise_count(), 1);
        let err = ExamplesSet::new(
            vec![leaf("p")],
            vec![leaf("f"), leaf("g")],
            vec![leaf("n")],
        )
        .unwrap_err();
        assert_eq!(err, InputError::ExcessiveNoise { noisy: 2, total: 3 });
    }

    #[test]
    fn replacement_count_rounds_up_and_caps() {
        assert_eq!(noise_replacements(0.2, 20), 4);
        assert_eq!(noise_replacements(0.1, 5), 1);
        assert_eq!(noise_replacements(0.9, 20), 10);
        assert_eq!(noise_replacements(0.0, 20), 0);
        assert_eq!(noise_replacements(0.5, 1), 0);
    }

    #[test]
    fn selection_is_deterministic_and_disjoint() {
        let candidates = ExampleCandidates {
            positives: (0..30).map(|i| ex(&format!("p{i:02}"))).collect(),
            negatives: (0..30).map(|i| ex(&format!("n{i:02}"))).collect(),
            noise: (0..10).map(|i| ex(&format!("f{i:02}"))).collect(),
        };
        let a = candidates.select(20, 20, 0.2, 123);
        let b = candidates.select(20, 20, 0.2, 123);
        assert_eq!(a, b);
        assert_eq!(a.correct_positives.len(), 16);
        assert_eq!(a.false_positives.len(), 4);
        assert_eq!(a.negatives.len(), 20);
        assert!(a.correct_positives.windows(2).all(|w| w[0] < w[1]));
        assert!(a
            .false_positives
            .iter()
            .all(|f| candidates.noise.contains(f)));

        let c = candidates.select(20, 20, 0.2, 7);
        assert_ne!(a, c);
    }

    #[test]
    fn noise_is_limited_by_the_pool() {
        let candidates = ExampleCandidates {
            positives: (0..10).map(|i| ex(&format!("p{i}"))).collect(),
            negatives: vec![ex("n")],
            noise: vec![ex("f")],
        };
        let s = candidates.select(10, 10, 0.4, 1);
        assert_eq!(s.false_positives, vec![ex("f")]);
        assert_eq!(s.correct_positives.len(), 9);
    }

    mod props {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #![proptest_config(ProptestConfig {
                cases: 256,
                failure_persistence: None,
                ..ProptestConfig::default()
            })]

            #[test]
            fn replacements_never_exceed_half(noise in 0.0f64..1.0, n in 0usize..200) {
                let r = noise_replacements(noise, n);
                prop_assert!(r <= n / 2);
                prop_assert!(r as f64 >= (noise * n as f64).floor().min((n / 2) as f64));
            }

            #[test]
            fn selections_are_disjoint(seed in any::<u64>(), noise in 0.0f64..0.6) {
                let candidates = ExampleCandidates {
                    positives: (0..12).map(|i| ex(&format!("p{i:02}"))).collect(),
                    negatives: (0..8).map(|i| ex(&format!("n{i:02}"))).collect(),
                    noise: (0..6).map(|i| ex(&format!("f{i:02}"))).collect(),
                };
                let s = candidates.select(10, 5, noise, seed);
                prop_assert_eq!(s.correct_positives.len() + s.false_positives.len(), 10);
                prop_assert!(s.false_positives.len() <= 5);
                for f in &s.false_positives {
                    prop_assert!(!s.correct_positives.contains(f));
                    prop_assert!(!s.negatives.contains(f));
                }
            }
        }
    }
}
