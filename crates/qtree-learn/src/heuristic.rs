//! Pluggable scoring functions for candidate generalizations.

use qtree_core::metrics::{f_beta, matthews_correlation, predictive_accuracy};
use qtree_core::{Measure, ResourceTree};
use serde::{Deserialize, Serialize};
use std::fmt;

/// How many examples of each label a candidate covers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Coverage {
    pub covered_positives: usize,
    pub total_positives: usize,
    pub covered_negatives: usize,
    pub total_negatives: usize,
}

impl Coverage {
    pub fn true_positives(&self) -> u64 {
        self.covered_positives as u64
    }

    pub fn false_negatives(&self) -> u64 {
        self.total_positives.saturating_sub(self.covered_positives) as u64
    }

    pub fn false_positives(&self) -> u64 {
        self.covered_negatives as u64
    }

    pub fn true_negatives(&self) -> u64 {
        self.total_negatives.saturating_sub(self.covered_negatives) as u64
    }

    /// Fraction of positives the candidate fails to cover.
    pub fn miss_ratio(&self) -> f64 {
        if self.total_positives == 0 {
            return 0.0;
        }
        self.false_negatives() as f64 / self.total_positives as f64
    }

    /// `measure` over the example confusion matrix, weighting with `beta`
    /// where the measure takes one.
    pub fn measure(&self, measure: Measure, beta: f64) -> f64 {
        let (tp, fp, tn, fn_) = (
            self.true_positives(),
            self.false_positives(),
            self.true_negatives(),
            self.false_negatives(),
        );
        match measure {
            Measure::PredAcc => predictive_accuracy(
                self.total_positives as u64,
                self.total_negatives as u64,
                tp,
                tn,
                beta,
            ),
            Measure::FMeasure => {
                let precision = if tp + fp == 0 {
                    1.0
                } else {
                    tp as f64 / (tp + fp) as f64
                };
                let recall = if tp + fn_ == 0 {
                    1.0
                } else {
                    tp as f64 / (tp + fn_) as f64
                };
                f_beta(precision, recall, beta)
            }
            Measure::MatthewsCorrelation => matthews_correlation(tp, fp, tn, fn_),
        }
    }
}

/// Scores a candidate from its example coverage. Higher is better.
pub trait QueryTreeHeuristic: fmt::Debug + Send + Sync {
    fn name(&self) -> &'static str;

    fn score(&self, candidate: &ResourceTree, coverage: &Coverage) -> f64;
}

// ============================================================================
// Simple
// ============================================================================

/// The chosen measure over coverage, nothing else.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SimpleHeuristic {
    pub measure: Measure,
    pub beta: f64,
}

impl Default for SimpleHeuristic {
    fn default() -> Self {
        Self {
            measure: Measure::PredAcc,
            beta: 1.0,
        }
    }
}

impl QueryTreeHeuristic for SimpleHeuristic {
    fn name(&self) -> &'static str {
        "simple"
    }

    fn score(&self, _candidate: &ResourceTree, coverage: &Coverage) -> f64 {
        coverage.measure(self.measure, self.beta)
    }
}

// ============================================================================
// Complex
// ============================================================================

/// Coverage measure with noise tolerance and a specificity bonus.
///
/// Missing positives up to the noise ratio is free; every missed fraction
/// beyond it is subtracted. Larger trees earn a bonus below
/// `specificity_weight / examples`, so specificity only separates candidates
/// of equal coverage under predictive accuracy.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ComplexHeuristic {
    pub measure: Measure,
    pub beta: f64,
    pub noise: f64,
    pub specificity_weight: f64,
}

impl Default for ComplexHeuristic {
    fn default() -> Self {
        Self {
            measure: Measure::PredAcc,
            beta: 1.0,
            noise: 0.0,
            specificity_weight: 0.1,
        }
    }
}

impl QueryTreeHeuristic for ComplexHeuristic {
    fn name(&self) -> &'static str {
        "complex"
    }

    fn score(&self, candidate: &ResourceTree, coverage: &Coverage) -> f64 {
        let base = coverage.measure(self.measure, self.beta);
        let excess = (coverage.miss_ratio() - self.noise).max(0.0);

        let examples = (coverage.total_positives + coverage.total_negatives).max(1) as f64;
        let size = candidate.branch_count() as f64;
        let specificity = size / (size + 1.0);

        base - excess + self.specificity_weight * specificity / examples
    }
}

// ============================================================================
// Configuration
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HeuristicKind {
    #[default]
    Simple,
    Complex,
}

impl fmt::Display for HeuristicKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HeuristicKind::Simple => f.write_str("simple"),
            HeuristicKind::Complex => f.write_str("complex"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HeuristicConfig {
    pub kind: HeuristicKind,
    pub measure: Measure,
    pub specificity_weight: f64,
    pub beta: f64,
}

impl Default for HeuristicConfig {
    fn default() -> Self {
        Self {
            kind: HeuristicKind::Simple,
            measure: Measure::PredAcc,
            specificity_weight: 0.1,
            beta: 1.0,
        }
    }
}

impl HeuristicConfig {
    pub fn build(&self, noise: f64) -> Box<dyn QueryTreeHeuristic> {
        match self.kind {
            HeuristicKind::Simple => Box::new(SimpleHeuristic {
                measure: self.measure,
                beta: self.beta,
            }),
            HeuristicKind::Complex => Box::new(ComplexHeuristic {
                measure: self.measure,
                beta: self.beta,
                noise,
                specificity_weight: self.specificity_weight,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use qtree_core::Node;

    fn coverage(cp: usize, tp: usize, cn: usize, tn: usize) -> Coverage {
        Coverage {
            covered_positives: cp,
            total_positives: tp,
            covered_negatives: cn,
            total_negatives: tn,
        }
    }

    fn tree(branches: usize) -> ResourceTree {
        let mut t = ResourceTree::top();
        for i in 0..branches {
            t.add_child(
                Node::iri(format!("http://ex.org/p{i}")),
                ResourceTree::new(Node::iri("http://ex.org/o")),
            );
        }
        t
    }

    #[test]
    fn simple_heuristic_measures() {
        let c = coverage(8, 10, 2, 10);
        let acc = SimpleHeuristic::default();
        assert_relative_eq!(acc.score(&tree(1), &c), 16.0 / 20.0);

        let f = SimpleHeuristic {
            measure: Measure::FMeasure,
            beta: 1.0,
        };
        assert_relative_eq!(f.score(&tree(1), &c), 0.8);

        let mcc = SimpleHeuristic {
            measure: Measure::MatthewsCorrelation,
            beta: 1.0,
        };
        assert_relative_eq!(mcc.score(&tree(1), &c), 0.6, epsilon = 1e-12);
    }

    #[test]
    fn complex_heuristic_tolerates_configured_noise() {
        let h = ComplexHeuristic {
            noise: 0.2,
            specificity_weight: 0.0,
            ..ComplexHeuristic::default()
        };
        let within = coverage(8, 10, 0, 10);
        let beyond = coverage(6, 10, 0, 10);
        assert_relative_eq!(h.score(&tree(1), &within), 0.9);
        assert_relative_eq!(h.score(&tree(1), &beyond), 0.8 - 0.2, epsilon = 1e-12);
    }

    #[test]
    fn specificity_only_breaks_coverage_ties() {
        let h = ComplexHeuristic::default();
        let c = coverage(10, 10, 0, 10);
        let worse = coverage(10, 10, 1, 10);
        assert!(h.score(&tree(3), &c) > h.score(&tree(1), &c));
        assert!(h.score(&tree(1), &c) > h.score(&tree(50), &worse));
    }

    #[test]
    fn config_defaults_and_build() {
        let cfg: HeuristicConfig = serde_json::from_str("{}").expect("defaults");
        assert_eq!(cfg, HeuristicConfig::default());
        assert_eq!(cfg.build(0.0).name(), "simple");

        let cfg: HeuristicConfig =
            serde_json::from_str(r#"{"kind":"complex","measure":"f_measure"}"#).expect("complex");
        assert_eq!(cfg.build(0.1).name(), "complex");
    }
}
