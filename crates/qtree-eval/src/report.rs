//! Evaluation results and their aggregation.

use crate::cache::CacheStats;
use anyhow::{Context, Result};
use qtree_core::{Measure, Score};
use qtree_learn::SearchStatus;
use serde::Serialize;
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Stats {
    pub count: usize,
    pub mean: f64,
    pub min: f64,
    pub max: f64,
}

impl Stats {
    /// `None` for an empty sample.
    pub fn of(values: &[f64]) -> Option<Self> {
        if values.is_empty() {
            return None;
        }
        let min = values.iter().copied().fold(f64::INFINITY, f64::min);
        let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let mean = values.iter().sum::<f64>() / values.len() as f64;
        Some(Self {
            count: values.len(),
            mean,
            min,
            max,
        })
    }
}

/// Per-metric statistics over a set of scores.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct MetricSummary {
    pub precision: Option<Stats>,
    pub recall: Option<Stats>,
    pub fmeasure: Option<Stats>,
    pub predictive_accuracy: Option<Stats>,
    pub matthews_correlation: Option<Stats>,
}

impl MetricSummary {
    pub fn of<'a>(scores: impl IntoIterator<Item = &'a Score>) -> Self {
        let scores: Vec<&Score> = scores.into_iter().collect();
        let column = |f: fn(&Score) -> f64| Stats::of(&scores.iter().map(|s| f(s)).collect::<Vec<_>>());
        Self {
            precision: column(|s| s.precision),
            recall: column(|s| s.recall),
            fmeasure: column(|s| s.fmeasure),
            predictive_accuracy: column(|s| s.predictive_accuracy),
            matthews_correlation: column(|s| s.matthews_correlation),
        }
    }
}

/// What one (measure, #examples, noise, query) run produced.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TaskResult {
    pub status: SearchStatus,
    pub returned_solutions: usize,
    pub baseline_query: String,
    pub baseline: Score,
    pub learned_query: String,
    pub learned: Score,
    /// Rank of the best matching solution; 0 when it is the returned one.
    pub best_rank: usize,
    pub best_query: String,
    pub best: Score,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum TaskOutcome {
    Completed(TaskResult),
    Failed { error: String },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TaskReport {
    pub query: String,
    pub measure: Measure,
    pub nr_of_examples: usize,
    pub noise: f64,
    #[serde(flatten)]
    pub outcome: TaskOutcome,
}

impl TaskReport {
    pub fn result(&self) -> Option<&TaskResult> {
        match &self.outcome {
            TaskOutcome::Completed(result) => Some(result),
            TaskOutcome::Failed { .. } => None,
        }
    }
}

/// Aggregate over all queries of one (measure, #examples, noise) setting.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConfigurationSummary {
    pub measure: Measure,
    pub nr_of_examples: usize,
    pub noise: f64,
    pub completed: usize,
    pub failed: usize,
    pub returned_solutions: Option<Stats>,
    pub baseline: MetricSummary,
    pub learned: MetricSummary,
    pub best: MetricSummary,
    pub best_rank: Option<Stats>,
}

impl ConfigurationSummary {
    pub fn of(measure: Measure, nr_of_examples: usize, noise: f64, tasks: &[TaskReport]) -> Self {
        let mine: Vec<&TaskReport> = tasks
            .iter()
            .filter(|t| t.measure == measure && t.nr_of_examples == nr_of_examples && t.noise == noise)
            .collect();
        let results: Vec<&TaskResult> = mine.iter().filter_map(|t| t.result()).collect();
        Self {
            measure,
            nr_of_examples,
            noise,
            completed: results.len(),
            failed: mine.len() - results.len(),
            returned_solutions: Stats::of(
                &results.iter().map(|r| r.returned_solutions as f64).collect::<Vec<_>>(),
            ),
            baseline: MetricSummary::of(results.iter().map(|r| &r.baseline)),
            learned: MetricSummary::of(results.iter().map(|r| &r.learned)),
            best: MetricSummary::of(results.iter().map(|r| &r.best)),
            best_rank: Stats::of(&results.iter().map(|r| r.best_rank as f64).collect::<Vec<_>>()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SkippedQuery {
    pub query: String,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EvaluationReport {
    pub kb_size: u64,
    pub queries: usize,
    pub skipped_queries: Vec<SkippedQuery>,
    pub configurations: Vec<ConfigurationSummary>,
    pub tasks: Vec<TaskReport>,
    pub cache: CacheStats,
    pub elapsed_ms: u64,
}

impl EvaluationReport {
    pub fn failed_tasks(&self) -> impl Iterator<Item = &TaskReport> {
        self.tasks.iter().filter(|t| t.result().is_none())
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).context("failed to serialize evaluation report")
    }

    pub fn write_json(&self, path: &Path) -> Result<()> {
        std::fs::write(path, self.to_json()?)
            .with_context(|| format!("failed to write report to {}", path.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn stats_of_a_sample() {
        assert_eq!(Stats::of(&[]), None);
        let s = Stats::of(&[0.5, 1.0, 0.0]).expect("stats");
        assert_eq!(s.count, 3);
        assert_relative_eq!(s.mean, 0.5);
        assert_relative_eq!(s.min, 0.0);
        assert_relative_eq!(s.max, 1.0);
    }

    fn task(noise: f64, outcome: TaskOutcome) -> TaskReport {
        TaskReport {
            query: "SELECT ?s WHERE { ?s ?p ?o . }".into(),
            measure: Measure::FMeasure,
            nr_of_examples: 10,
            noise,
            outcome,
        }
    }

    fn completed(fmeasure_counts: (u64, u64, u64, u64), rank: usize) -> TaskOutcome {
        let (tp, fp, tn, fn_) = fmeasure_counts;
        let score = Score::from_counts(tp, fp, tn, fn_).expect("score");
        TaskOutcome::Completed(TaskResult {
            status: SearchStatus::Converged,
            returned_solutions: 4,
            baseline_query: String::new(),
            baseline: score,
            learned_query: String::new(),
            learned: score,
            best_rank: rank,
            best_query: String::new(),
            best: score,
        })
    }

    #[test]
    fn summaries_aggregate_only_their_setting() {
        let tasks = vec![
            task(0.0, completed((10, 0, 10, 0), 0)),
            task(0.0, completed((5, 5, 5, 5), 2)),
            task(0.0, TaskOutcome::Failed { error: "boom".into() }),
            task(0.2, completed((1, 0, 0, 0), 0)),
        ];
        let summary = ConfigurationSummary::of(Measure::FMeasure, 10, 0.0, &tasks);
        assert_eq!((summary.completed, summary.failed), (2, 1));
        let f = summary.learned.fmeasure.expect("fmeasure");
        assert_relative_eq!(f.mean, 0.75);
        assert_relative_eq!(summary.best_rank.expect("rank").max, 2.0);
    }

    #[test]
    fn report_serializes_outcome_tags() {
        let failed = task(0.0, TaskOutcome::Failed { error: "boom".into() });
        let json = serde_json::to_value(&failed).expect("json");
        assert_eq!(json["outcome"], "failed");
        assert_eq!(json["error"], "boom");
        assert_eq!(json["measure"], "f_measure");
    }
}
