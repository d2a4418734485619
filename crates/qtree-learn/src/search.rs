//! The heuristic search core.
//!
//! Candidates are generalizations of subsets of the positive example trees.
//! Small example sets are enumerated exhaustively; larger ones are explored
//! by greedy extension from every positive, then by seeded random subsets.
//! Each candidate is scored by the configured heuristic on its coverage of
//! the examples and the best `top_k` are kept.
//!
//! ```text
//! Init -> GeneratingCandidates <-> Scoring -> Converged | Timeout
//! ```
//!
//! The wall-clock budget is checked between candidates, never inside one
//! generalization.

use crate::error::{InputError, LearnError};
use crate::examples::ExamplesSet;
use crate::heuristic::{Coverage, HeuristicConfig, QueryTreeHeuristic};
use qtree_core::{
    generalize_subset, lgg, prune, subsumes, CoreError, Entailment, PruneScope, ResourceTree,
};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::HashMap;
use std::time::{Duration, Instant};

// ============================================================================
// Configuration
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LearnerConfig {
    pub max_execution_time_secs: u64,
    /// Example sets up to this size are enumerated exhaustively.
    pub exhaustive_threshold: usize,
    /// Upper bound on generated candidates, duplicates included.
    pub max_combinations: usize,
    pub top_k: usize,
    pub seed: u64,
    pub noise: f64,
    pub heuristic: HeuristicConfig,
    pub entailment: Entailment,
}

impl Default for LearnerConfig {
    fn default() -> Self {
        Self {
            max_execution_time_secs: 60,
            exhaustive_threshold: 10,
            max_combinations: 2048,
            top_k: 20,
            seed: 123,
            noise: 0.0,
            heuristic: HeuristicConfig::default(),
            entailment: Entailment::Rdf,
        }
    }
}

impl LearnerConfig {
    pub fn max_execution_time(&self) -> Duration {
        Duration::from_secs(self.max_execution_time_secs)
    }
}

// ============================================================================
// Results
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchState {
    Init,
    GeneratingCandidates,
    Scoring,
    Converged,
    Timeout,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchStatus {
    /// Every candidate within the combination budget was considered.
    Converged,
    /// The time budget ran out; the ranking holds what was found so far.
    Timeout,
    /// Nothing could be ranked.
    Failed,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchStats {
    pub generated: usize,
    pub scored: usize,
    pub duplicates: usize,
    pub degenerate: usize,
    pub anomalies: usize,
    pub elapsed_ms: u64,
}

/// A scored candidate. Immutable once created.
#[derive(Debug, Clone)]
pub struct EvaluatedTree {
    tree: ResourceTree,
    score: f64,
    coverage: Coverage,
    canonical: String,
}

impl EvaluatedTree {
    pub fn new(tree: ResourceTree, score: f64, coverage: Coverage) -> Self {
        let canonical = tree.canonical_string();
        Self {
            tree,
            score,
            coverage,
            canonical,
        }
    }

    pub fn tree(&self) -> &ResourceTree {
        &self.tree
    }

    pub fn score(&self) -> f64 {
        self.score
    }

    pub fn coverage(&self) -> &Coverage {
        &self.coverage
    }

    /// Ranking order: higher score first, then fewer nodes, then the
    /// canonical string form.
    pub fn rank_cmp(&self, other: &Self) -> Ordering {
        other
            .score
            .total_cmp(&self.score)
            .then_with(|| self.tree.node_count().cmp(&other.tree.node_count()))
            .then_with(|| self.canonical.cmp(&other.canonical))
    }
}

#[derive(Debug, Clone)]
pub struct SearchOutcome {
    pub status: SearchStatus,
    /// Best first, at most `top_k` long.
    pub solutions: Vec<EvaluatedTree>,
    pub stats: SearchStats,
}

impl SearchOutcome {
    pub fn best(&self) -> Option<&EvaluatedTree> {
        self.solutions.first()
    }
}

// ============================================================================
// Learner
// ============================================================================

#[derive(Debug)]
pub struct QueryTreeLearner {
    config: LearnerConfig,
    heuristic: Box<dyn QueryTreeHeuristic>,
}

impl QueryTreeLearner {
    pub fn new(config: LearnerConfig) -> Self {
        let heuristic = config.heuristic.build(config.noise);
        Self { config, heuristic }
    }

    pub fn with_heuristic(mut self, heuristic: Box<dyn QueryTreeHeuristic>) -> Self {
        self.heuristic = heuristic;
        self
    }

    pub fn config(&self) -> &LearnerConfig {
        &self.config
    }

    pub fn heuristic(&self) -> &dyn QueryTreeHeuristic {
        self.heuristic.as_ref()
    }

    /// Learn without schema collaborators.
    pub fn learn(&self, examples: &ExamplesSet) -> Result<SearchOutcome, LearnError> {
        let scope = PruneScope {
            entailment: self.config.entailment,
            ..PruneScope::default()
        };
        self.learn_with(examples, scope)
    }

    /// Learn, simplifying every example tree under `scope` first.
    pub fn learn_with(
        &self,
        examples: &ExamplesSet,
        scope: PruneScope<'_>,
    ) -> Result<SearchOutcome, LearnError> {
        let started = Instant::now();
        let deadline = started + self.config.max_execution_time();
        let mut state = SearchState::Init;
        tracing::debug!(?state, heuristic = self.heuristic.name(), "starting search");

        if examples.positive_count() == 0 {
            return Err(InputError::NoPositiveExamples.into());
        }
        if examples.negative_count() == 0 {
            return Err(InputError::NoNegativeExamples.into());
        }

        let positives: Vec<ResourceTree> =
            examples.positive_trees().map(|t| prune(t, scope)).collect();
        let negatives: Vec<ResourceTree> =
            examples.negative_trees().map(|t| prune(t, scope)).collect();

        let mut ranking = Ranking::new(self.config.top_k);
        let mut seen: HashMap<ResourceTree, Option<f64>> = HashMap::new();
        let mut stats = SearchStats::default();
        let mut generator = CandidateGenerator::new(&positives, &self.config);
        let mut feedback: Option<f64> = None;

        loop {
            if Instant::now() >= deadline {
                state = SearchState::Timeout;
                break;
            }

            state = SearchState::GeneratingCandidates;
            let Some(next) = generator.next(feedback.take()) else {
                state = SearchState::Converged;
                break;
            };
            stats.generated += 1;

            let candidate = match next {
                Ok(tree) => tree,
                Err(e) => {
                    stats.degenerate += 1;
                    tracing::debug!(?state, error = %e, "skipping subset");
                    continue;
                }
            };

            if let Some(cached) = seen.get(&candidate) {
                stats.duplicates += 1;
                feedback = *cached;
                continue;
            }

            state = SearchState::Scoring;
            let coverage = Coverage {
                covered_positives: positives.iter().filter(|p| subsumes(&candidate, p)).count(),
                total_positives: positives.len(),
                covered_negatives: negatives.iter().filter(|n| subsumes(&candidate, n)).count(),
                total_negatives: negatives.len(),
            };
            let score = self.heuristic.score(&candidate, &coverage);
            stats.scored += 1;

            if score.is_nan() {
                stats.anomalies += 1;
                tracing::debug!(candidate = %candidate.canonical_string(), "heuristic returned NaN");
                seen.insert(candidate, None);
                continue;
            }

            tracing::trace!(
                ?state,
                score,
                pos = coverage.covered_positives,
                neg = coverage.covered_negatives,
                "scored candidate"
            );
            seen.insert(candidate.clone(), Some(score));
            ranking.offer(EvaluatedTree::new(candidate, score, coverage));
            feedback = Some(score);
        }

        stats.elapsed_ms = started.elapsed().as_millis() as u64;
        let solutions = ranking.into_vec();
        let status = match state {
            SearchState::Timeout => SearchStatus::Timeout,
            _ if solutions.is_empty() => SearchStatus::Failed,
            _ => SearchStatus::Converged,
        };
        tracing::info!(
            ?status,
            generated = stats.generated,
            scored = stats.scored,
            solutions = solutions.len(),
            best = solutions.first().map(|s| s.score),
            "search finished"
        );

        Ok(SearchOutcome {
            status,
            solutions,
            stats,
        })
    }
}

// ============================================================================
// Ranking
// ============================================================================

struct Ranking {
    capacity: usize,
    entries: Vec<EvaluatedTree>,
}

impl Ranking {
    fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            entries: Vec::new(),
        }
    }

    fn offer(&mut self, candidate: EvaluatedTree) {
        let pos = self
            .entries
            .partition_point(|e| e.rank_cmp(&candidate) == Ordering::Less);
        if pos >= self.capacity {
            return;
        }
        self.entries.insert(pos, candidate);
        self.entries.truncate(self.capacity);
    }

    fn into_vec(self) -> Vec<EvaluatedTree> {
        self.entries
    }
}

// ============================================================================
// Candidate generation
// ============================================================================

struct Greedy {
    seed: usize,
    next: usize,
    current: Option<(ResourceTree, f64)>,
    pending: Option<ResourceTree>,
}

enum Phase {
    /// `memo[mask]` holds the generalization of the subset `mask`.
    Exhaustive {
        mask: usize,
        memo: Vec<Option<ResourceTree>>,
    },
    Greedy(Greedy),
    Random(StdRng),
    Done,
}

/// Produces one candidate per call. The caller reports the score of the
/// previous candidate, which steers greedy extension.
struct CandidateGenerator<'e> {
    trees: &'e [ResourceTree],
    budget: usize,
    produced: usize,
    seed: u64,
    phase: Phase,
}

impl<'e> CandidateGenerator<'e> {
    fn new(trees: &'e [ResourceTree], config: &LearnerConfig) -> Self {
        let n = trees.len();
        let phase = if n <= config.exhaustive_threshold && n < usize::BITS as usize - 1 {
            Phase::Exhaustive {
                mask: 1,
                memo: vec![None; 1 << n],
            }
        } else {
            Phase::Greedy(Greedy {
                seed: 0,
                next: 0,
                current: None,
                pending: None,
            })
        };
        Self {
            trees,
            budget: config.max_combinations,
            produced: 0,
            seed: config.seed,
            phase,
        }
    }

    fn next(&mut self, feedback: Option<f64>) -> Option<Result<ResourceTree, CoreError>> {
        if self.produced >= self.budget {
            return None;
        }
        loop {
            let out = match &mut self.phase {
                Phase::Exhaustive { mask, memo } => Self::exhaustive(self.trees, mask, memo),
                Phase::Greedy(g) => Self::greedy(self.trees, g, feedback),
                Phase::Random(rng) => Self::random(self.trees, rng),
                Phase::Done => return None,
            };
            if let Some(out) = out {
                self.produced += 1;
                return Some(out);
            }
            self.phase = match self.phase {
                Phase::Greedy(_) if self.trees.len() > 1 => {
                    Phase::Random(StdRng::seed_from_u64(self.seed))
                }
                _ => Phase::Done,
            };
        }
    }

    fn exhaustive(
        trees: &[ResourceTree],
        mask: &mut usize,
        memo: &mut [Option<ResourceTree>],
    ) -> Option<Result<ResourceTree, CoreError>> {
        if *mask >= memo.len() {
            return None;
        }
        let current = *mask;
        *mask += 1;

        let lowest = current.trailing_zeros() as usize;
        let rest = current & (current - 1);
        let tree = match memo.get(rest).and_then(Option::as_ref) {
            Some(prefix) if rest != 0 => lgg(prefix, &trees[lowest]),
            _ => trees[lowest].minimize(),
        };
        let out = if tree.is_top() {
            Err(CoreError::Degenerate)
        } else {
            Ok(tree.clone())
        };
        memo[current] = Some(tree);
        Some(out)
    }

    fn greedy(
        trees: &[ResourceTree],
        g: &mut Greedy,
        feedback: Option<f64>,
    ) -> Option<Result<ResourceTree, CoreError>> {
        if let Some(proposal) = g.pending.take() {
            if let Some(score) = feedback {
                if g.current.as_ref().map_or(true, |(_, best)| score >= *best) {
                    g.current = Some((proposal, score));
                }
            }
            if g.current.is_none() {
                g.seed += 1;
                g.next = 0;
            }
        }

        let n = trees.len();
        loop {
            if g.seed >= n {
                return None;
            }
            if g.current.is_none() {
                let start = trees[g.seed].minimize();
                g.pending = Some(start.clone());
                return Some(Ok(start));
            }
            if g.next == g.seed {
                g.next += 1;
                continue;
            }
            if g.next >= n {
                g.seed += 1;
                g.next = 0;
                g.current = None;
                continue;
            }
            let j = g.next;
            g.next += 1;

            let Some((current, _)) = &g.current else {
                continue;
            };
            let proposal = lgg(current, &trees[j]);
            if &proposal == current {
                continue;
            }
            if proposal.is_top() {
                return Some(Err(CoreError::Degenerate));
            }
            g.pending = Some(proposal.clone());
            return Some(Ok(proposal));
        }
    }

    fn random(trees: &[ResourceTree], rng: &mut StdRng) -> Option<Result<ResourceTree, CoreError>> {
        let n = trees.len();
        if n < 2 {
            return None;
        }
        let size = rng.gen_range(2..=n);
        let mut picked = rand::seq::index::sample(rng, n, size).into_vec();
        picked.sort_unstable();
        Some(generalize_subset(picked.iter().map(|&i| &trees[i])))
    }
}
