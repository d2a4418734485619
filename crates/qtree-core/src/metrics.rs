//! Binary classification metrics.

use crate::error::CoreError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Quality measure a heuristic or report optimizes for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Measure {
    #[default]
    PredAcc,
    FMeasure,
    MatthewsCorrelation,
}

impl Measure {
    pub const ALL: [Measure; 3] = [
        Measure::PredAcc,
        Measure::FMeasure,
        Measure::MatthewsCorrelation,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Measure::PredAcc => "predictive_accuracy",
            Measure::FMeasure => "fmeasure",
            Measure::MatthewsCorrelation => "matthews_correlation",
        }
    }
}

impl fmt::Display for Measure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Harmonic mean of precision and recall; 0 when both are 0.
pub fn f_score(precision: f64, recall: f64) -> f64 {
    f_beta(precision, recall, 1.0)
}

pub fn f_beta(precision: f64, recall: f64, beta: f64) -> f64 {
    let b2 = beta * beta;
    let denom = b2 * precision + recall;
    if denom == 0.0 {
        0.0
    } else {
        (1.0 + b2) * precision * recall / denom
    }
}

/// `(tp + beta * tn) / (nr_pos + beta * nr_neg)`.
pub fn predictive_accuracy(nr_pos: u64, nr_neg: u64, tp: u64, tn: u64, beta: f64) -> f64 {
    (tp as f64 + beta * tn as f64) / (nr_pos as f64 + beta * nr_neg as f64)
}

/// Matthews correlation coefficient; 0 when any marginal is empty.
pub fn matthews_correlation(tp: u64, fp: u64, tn: u64, fn_: u64) -> f64 {
    let (tp, fp, tn, fn_) = (tp as f64, fp as f64, tn as f64, fn_ as f64);
    let denom = ((tp + fp) * (tp + fn_) * (tn + fp) * (tn + fn_)).sqrt();
    if denom == 0.0 {
        0.0
    } else {
        (tp * tn - fp * fn_) / denom
    }
}

// ============================================================================
// Score
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Score {
    pub true_positives: u64,
    pub false_positives: u64,
    pub true_negatives: u64,
    pub false_negatives: u64,
    pub precision: f64,
    pub recall: f64,
    pub fmeasure: f64,
    pub predictive_accuracy: f64,
    pub matthews_correlation: f64,
}

impl Score {
    /// Derive all metrics from a confusion matrix.
    ///
    /// Precision is 1.0 when nothing was predicted and recall is 1.0 when
    /// nothing was expected. A NaN in any derived value is an error.
    pub fn from_counts(tp: u64, fp: u64, tn: u64, fn_: u64) -> Result<Self, CoreError> {
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
        let fmeasure = f_score(precision, recall);
        let total = tp + fp + tn + fn_;
        let predictive_accuracy = (tp + tn) as f64 / total as f64;
        let matthews_correlation = matthews_correlation(tp, fp, tn, fn_);

        let anomaly = |measure: &'static str| CoreError::ScoringAnomaly {
            measure,
            tp,
            fp,
            tn,
            fn_,
        };
        for (name, value) in [
            ("precision", precision),
            ("recall", recall),
            ("fmeasure", fmeasure),
            ("predictive_accuracy", predictive_accuracy),
            ("matthews_correlation", matthews_correlation),
        ] {
            if value.is_nan() {
                return Err(anomaly(name));
            }
        }

        Ok(Self {
            true_positives: tp,
            false_positives: fp,
            true_negatives: tn,
            false_negatives: fn_,
            precision,
            recall,
            fmeasure,
            predictive_accuracy,
            matthews_correlation,
        })
    }

    pub fn measure(&self, measure: Measure) -> f64 {
        match measure {
            Measure::PredAcc => self.predictive_accuracy,
            Measure::FMeasure => self.fmeasure,
            Measure::MatthewsCorrelation => self.matthews_correlation,
        }
    }
}

impl fmt::Display for Score {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "tp={} fp={} tn={} fn={}",
            self.true_positives, self.false_positives, self.true_negatives, self.false_negatives
        )?;
        writeln!(f, "Precision: {:.4}", self.precision)?;
        writeln!(f, "Recall: {:.4}", self.recall)?;
        writeln!(f, "F-measure: {:.4}", self.fmeasure)?;
        writeln!(f, "Predictive accuracy: {:.4}", self.predictive_accuracy)?;
        write!(f, "MCC: {:.4}", self.matthews_correlation)
    }
}
