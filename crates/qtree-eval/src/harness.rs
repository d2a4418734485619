//! The evaluation harness.
//!
//! For every combination of heuristic measure, number of examples, noise
//! level and reference query, examples are drawn, a baseline and the
//! learner are run, and the results are scored against the reference.
//! Tasks run on a dedicated rayon pool and own all of their state; only
//! the endpoint (with its cache) is shared.

use crate::cache::CachingEndpoint;
use crate::matching::best_matching;
use crate::report::{
    ConfigurationSummary, EvaluationReport, SkippedQuery, TaskOutcome, TaskReport, TaskResult,
};
use crate::retry::{RetryPolicy, RetryingEndpoint};
use crate::scoring::{ScoringConfig, ScoringEngine};
use anyhow::{anyhow, Context, Result};
use qtree_core::{Measure, TreeFactory, TreeFactoryConfig};
use qtree_learn::{
    Baseline, ExampleCandidates, HeuristicConfig, LearnerConfig, NoiseMethod, QueryTreeLearner,
};
use qtree_sparql::{join_depth, Endpoint, PrefixMap, SelectQuery};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Instant;

// ============================================================================
// Configuration
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EvaluationConfig {
    pub nr_of_examples: Vec<usize>,
    pub noise_levels: Vec<f64>,
    pub measures: Vec<Measure>,
    /// Reference queries joining deeper than this are skipped.
    pub max_tree_depth: usize,
    pub max_queries: Option<usize>,
    pub threads: usize,
    pub retries: u32,
    pub retry_backoff_ms: u64,
    pub cache_capacity: usize,
    pub max_negative_candidates: usize,
    pub max_noise_candidates: usize,
    pub noise_method: NoiseMethod,
    pub baseline: Baseline,
    pub tree_factory: TreeFactoryConfig,
    pub learner: LearnerConfig,
    pub scoring: ScoringConfig,
}

impl Default for EvaluationConfig {
    fn default() -> Self {
        Self {
            nr_of_examples: vec![20],
            noise_levels: vec![0.0, 0.2],
            measures: Measure::ALL.to_vec(),
            max_tree_depth: 3,
            max_queries: None,
            threads: 1,
            retries: 3,
            retry_backoff_ms: 200,
            cache_capacity: 1024,
            max_negative_candidates: 100,
            max_noise_candidates: 100,
            noise_method: NoiseMethod::Random,
            baseline: Baseline::MostInformativeEdge,
            tree_factory: TreeFactoryConfig::default(),
            learner: LearnerConfig::default(),
            scoring: ScoringConfig::default(),
        }
    }
}

impl EvaluationConfig {
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_retries: self.retries,
            backoff_ms: self.retry_backoff_ms,
        }
    }

    /// Total number of tasks for `queries` reference queries.
    pub fn task_count(&self, queries: usize) -> usize {
        self.measures.len() * self.nr_of_examples.len() * self.noise_levels.len() * queries
    }
}

// ============================================================================
// Harness
// ============================================================================

type SharedEndpoint<E> = CachingEndpoint<RetryingEndpoint<E>>;

#[derive(Debug, Clone, Copy)]
struct Task<'q> {
    measure: Measure,
    nr_of_examples: usize,
    noise: f64,
    query: &'q SelectQuery,
    candidates: &'q ExampleCandidates,
}

pub struct Evaluation<E> {
    endpoint: SharedEndpoint<E>,
    config: EvaluationConfig,
    base: Option<String>,
    prefixes: PrefixMap,
}

impl<E: Endpoint> Evaluation<E> {
    /// Wrap `endpoint` with retries and a result cache.
    pub fn new(endpoint: E, config: EvaluationConfig) -> Self {
        let endpoint = CachingEndpoint::new(
            RetryingEndpoint::new(endpoint, config.retry_policy()),
            config.cache_capacity,
        );
        Self {
            endpoint,
            config,
            base: None,
            prefixes: PrefixMap::new(),
        }
    }

    pub fn with_namespaces(mut self, base: Option<String>, prefixes: PrefixMap) -> Self {
        self.base = base;
        self.prefixes = prefixes;
        self
    }

    pub fn config(&self) -> &EvaluationConfig {
        &self.config
    }

    pub fn endpoint(&self) -> &SharedEndpoint<E> {
        &self.endpoint
    }

    /// Keep queries within `max_tree_depth`. With `max_queries` set, the
    /// subset is balanced over join depths: for each depth from 1 to
    /// `max_tree_depth`, the first `max_queries / max_tree_depth` queries
    /// of that depth (at least one).
    pub fn select_queries(&self, queries: Vec<SelectQuery>) -> Vec<SelectQuery> {
        let max_depth = self.config.max_tree_depth;
        let kept: Vec<(usize, SelectQuery)> = queries
            .into_iter()
            .filter_map(|q| match join_depth(&q) {
                Ok(depth) if depth <= max_depth => Some((depth, q)),
                Ok(depth) => {
                    tracing::debug!(query = %q, depth, "skipping deep reference query");
                    None
                }
                Err(e) => {
                    tracing::warn!(query = %q, error = %e, "skipping reference query");
                    None
                }
            })
            .collect();
        let Some(max) = self.config.max_queries else {
            return kept.into_iter().map(|(_, q)| q).collect();
        };

        let quota = (max / max_depth.max(1)).max(1);
        let mut selected = Vec::new();
        for depth in 1..=max_depth {
            selected.extend(
                kept.iter()
                    .filter(|(d, _)| *d == depth)
                    .take(quota)
                    .map(|(_, q)| q.clone()),
            );
        }
        tracing::info!(
            candidates = kept.len(),
            selected = selected.len(),
            per_depth = quota,
            "balanced reference queries by join depth"
        );
        selected
    }

    /// Run every task and aggregate the results.
    ///
    /// A query whose example candidates cannot be generated is skipped; a
    /// task that fails is recorded as failed. Neither aborts the run.
    pub fn run(&self, queries: Vec<SelectQuery>) -> Result<EvaluationReport> {
        let started = Instant::now();
        let queries = self.select_queries(queries);
        tracing::info!(queries = queries.len(), "loaded reference queries");

        let engine = ScoringEngine::new(&self.endpoint, self.config.scoring.clone())
            .context("failed to determine the knowledge base size")?
            .with_namespaces(self.base.clone(), self.prefixes.clone());
        let factory = TreeFactory::new(self.config.tree_factory.clone());

        let mut prepared = Vec::new();
        let mut skipped_queries = Vec::new();
        for query in &queries {
            match ExampleCandidates::from_reference_with(
                &self.endpoint,
                query,
                self.config.max_negative_candidates,
                self.config.max_noise_candidates,
                self.config.noise_method,
                self.config.learner.seed,
            ) {
                Ok(candidates) if !candidates.positives.is_empty() => {
                    prepared.push((query, candidates))
                }
                Ok(_) => skipped_queries.push(SkippedQuery {
                    query: query.to_string(),
                    reason: "reference query returns no result".to_string(),
                }),
                Err(e) => {
                    tracing::warn!(query = %query, error = %e, "failed to generate examples");
                    skipped_queries.push(SkippedQuery {
                        query: query.to_string(),
                        reason: e.to_string(),
                    });
                }
            }
        }

        let mut tasks = Vec::new();
        for &measure in &self.config.measures {
            for &nr_of_examples in &self.config.nr_of_examples {
                for &noise in &self.config.noise_levels {
                    for (query, candidates) in prepared.iter() {
                        tasks.push(Task {
                            measure,
                            nr_of_examples,
                            noise,
                            query: *query,
                            candidates,
                        });
                    }
                }
            }
        }
        let total = tasks.len();
        tracing::info!(tasks = total, threads = self.config.threads, "starting evaluation");

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.config.threads.max(1))
            .build()
            .context("failed to build evaluation thread pool")?;
        let finished = AtomicUsize::new(0);
        let reports: Vec<TaskReport> = pool.install(|| {
            tasks
                .par_iter()
                .map(|task| {
                    let outcome = match self.run_task(&engine, &factory, task) {
                        Ok(result) => TaskOutcome::Completed(result),
                        Err(e) => {
                            tracing::error!(query = %task.query, error = %e, "evaluation task failed");
                            TaskOutcome::Failed {
                                error: format!("{e:#}"),
                            }
                        }
                    };
                    let done = finished.fetch_add(1, Ordering::Relaxed) + 1;
                    tracing::info!(done, total, "evaluation progress");
                    TaskReport {
                        query: task.query.to_string(),
                        measure: task.measure,
                        nr_of_examples: task.nr_of_examples,
                        noise: task.noise,
                        outcome,
                    }
                })
                .collect()
        });

        let mut configurations = Vec::new();
        for &measure in &self.config.measures {
            for &nr_of_examples in &self.config.nr_of_examples {
                for &noise in &self.config.noise_levels {
                    configurations.push(ConfigurationSummary::of(
                        measure,
                        nr_of_examples,
                        noise,
                        &reports,
                    ));
                }
            }
        }

        Ok(EvaluationReport {
            kb_size: engine.kb_size(),
            queries: queries.len(),
            skipped_queries,
            configurations,
            tasks: reports,
            cache: self.endpoint.stats(),
            elapsed_ms: started.elapsed().as_millis() as u64,
        })
    }

    fn run_task(
        &self,
        engine: &ScoringEngine<&SharedEndpoint<E>>,
        factory: &TreeFactory,
        task: &Task<'_>,
    ) -> Result<TaskResult> {
        let noise = task.noise;
        tracing::debug!(
            query = %task.query,
            measure = %task.measure,
            examples = task.nr_of_examples,
            noise,
            "processing query"
        );

        let examples = task
            .candidates
            .select(task.nr_of_examples, task.nr_of_examples, noise, self.config.learner.seed)
            .build(&self.endpoint, factory)
            .context("failed to build examples")?;

        let baseline_tree = self.config.baseline.apply(&examples)?;
        let baseline = engine
            .score(task.query, &baseline_tree, noise)
            .context("failed to score baseline")?;

        let learner = QueryTreeLearner::new(LearnerConfig {
            noise,
            heuristic: HeuristicConfig {
                measure: task.measure,
                ..self.config.learner.heuristic.clone()
            },
            ..self.config.learner.clone()
        });
        let outcome = learner.learn(&examples)?;
        let returned = outcome
            .best()
            .ok_or_else(|| anyhow!("search returned no solution ({:?})", outcome.status))?;
        let learned = engine
            .score(task.query, returned.tree(), noise)
            .context("failed to score learned query")?;

        let (best_rank, best_tree) = match best_matching(&outcome.solutions, &examples) {
            Some(found) if found.rank > 0 => {
                let tree = outcome
                    .solutions
                    .get(found.rank)
                    .map(|s| s.tree())
                    .ok_or_else(|| anyhow!("best matching rank {} out of range", found.rank))?;
                (found.rank, tree)
            }
            _ => (0, returned.tree()),
        };
        let best = if best_rank > 0 {
            tracing::debug!(rank = best_rank, "best matching solution differs from returned one");
            engine
                .score(task.query, best_tree, noise)
                .context("failed to score best matching query")?
        } else {
            learned
        };

        Ok(TaskResult {
            status: outcome.status,
            returned_solutions: outcome.solutions.len(),
            baseline_query: engine.render(&baseline_tree).to_string(),
            baseline,
            learned_query: engine.render(returned.tree()).to_string(),
            learned,
            best_rank,
            best_query: engine.render(best_tree).to_string(),
            best,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use qtree_core::{Node, Triple};
    use qtree_ingest_rdfowl::{Graph, MemoryEndpoint};
    use qtree_sparql::parse_query;

    fn ex(s: &str) -> Node {
        Node::iri(format!("http://ex.org/{s}"))
    }

    fn endpoint() -> MemoryEndpoint {
        let mut triples = Vec::new();
        for i in 0..6 {
            triples.push(Triple::new(ex(&format!("p{i}")), Node::rdf_type(), ex("Person")));
            triples.push(Triple::new(ex(&format!("d{i}")), Node::rdf_type(), ex("Dog")));
        }
        MemoryEndpoint::new(Graph::from_triples(triples))
    }

    fn query(text: &str) -> SelectQuery {
        parse_query(&format!("PREFIX ex: <http://ex.org/> {text}")).expect("query")
    }

    #[test]
    fn empty_config_object_gives_defaults() {
        let cfg: EvaluationConfig = serde_json::from_str("{}").expect("config");
        assert_eq!(cfg, EvaluationConfig::default());
        assert_eq!(cfg.task_count(5), 3 * 2 * 5);
    }

    #[test]
    fn deep_queries_are_filtered() {
        let eval = Evaluation::new(
            endpoint(),
            EvaluationConfig {
                max_tree_depth: 1,
                max_queries: Some(1),
                ..EvaluationConfig::default()
            },
        );
        let shallow = query("SELECT ?s WHERE { ?s a ex:Person . }");
        let deep = query("SELECT ?s WHERE { ?s ex:p ?o . ?o ex:q ?z . }");
        let kept = eval.select_queries(vec![deep, shallow.clone(), shallow.clone()]);
        assert_eq!(kept, vec![shallow]);
    }

    #[test]
    fn query_budget_is_split_over_join_depths() {
        let eval = Evaluation::new(
            endpoint(),
            EvaluationConfig {
                max_tree_depth: 2,
                max_queries: Some(4),
                ..EvaluationConfig::default()
            },
        );
        let flat = |class: &str| query(&format!("SELECT ?s WHERE {{ ?s a ex:{class} . }}"));
        let nested = |class: &str| {
            query(&format!("SELECT ?s WHERE {{ ?s ex:owns ?o . ?o a ex:{class} . }}"))
        };
        let deepest = query("SELECT ?s WHERE { ?s ex:p ?o . ?o ex:q ?z . ?z a ex:A . }");

        let kept = eval.select_queries(vec![
            nested("A"),
            nested("B"),
            nested("C"),
            deepest,
            flat("A"),
            flat("B"),
            flat("C"),
        ]);
        assert_eq!(
            kept,
            vec![flat("A"), flat("B"), nested("A"), nested("B")]
        );
    }

    #[test]
    fn without_a_budget_every_shallow_query_is_kept() {
        let eval = Evaluation::new(
            endpoint(),
            EvaluationConfig {
                max_tree_depth: 1,
                ..EvaluationConfig::default()
            },
        );
        let a = query("SELECT ?s WHERE { ?s a ex:Person . }");
        let b = query("SELECT ?s WHERE { ?s a ex:Dog . }");
        let kept = eval.select_queries(vec![b.clone(), a.clone()]);
        assert_eq!(kept, vec![b, a]);
    }

    #[test]
    fn run_reports_every_task() {
        let config = EvaluationConfig {
            nr_of_examples: vec![3],
            noise_levels: vec![0.0],
            measures: vec![Measure::FMeasure],
            threads: 2,
            retry_backoff_ms: 0,
            ..EvaluationConfig::default()
        };
        let eval = Evaluation::new(endpoint(), config);
        let report = eval
            .run(vec![
                query("SELECT ?s WHERE { ?s a ex:Person . }"),
                query("SELECT ?s WHERE { ?s a ex:Cat . }"),
            ])
            .expect("report");

        assert_eq!(report.kb_size, 12);
        assert_eq!(report.skipped_queries.len(), 1);
        assert_eq!(report.tasks.len(), 1);
        let result = report.tasks[0].result().expect("completed");
        assert_eq!(result.learned.fmeasure, 1.0);
        assert_eq!(result.best_rank, 0);
        assert_eq!(report.configurations.len(), 1);
        assert_eq!(report.configurations[0].completed, 1);
        assert!(report.cache.hits > 0);
        assert!(report.to_json().expect("json").contains("\"kb_size\": 12"));
    }
}
