//! Confusion-matrix rates at fixed decision thresholds

use crate::error::{EvalError, Result};
use crate::metrics::classification::check_binary_inputs;
use ndarray::Array1;
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::warn;

/// Confusion counts for a binarized prediction
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfusionCounts {
    pub tn: usize,
    pub fp: usize,
    pub fn_: usize,
    pub tp: usize,
}

impl ConfusionCounts {
    /// Count outcomes against `predicted_positive(p)`
    pub fn tally<F>(y_true: &Array1<f64>, y_pred: &Array1<f64>, predicted_positive: F) -> Self
    where
        F: Fn(f64) -> bool,
    {
        let mut counts = Self::default();
        for (&y, &p) in y_true.iter().zip(y_pred.iter()) {
            match (y == 1.0, predicted_positive(p)) {
                (true, true) => counts.tp += 1,
                (false, true) => counts.fp += 1,
                (false, false) => counts.tn += 1,
                (true, false) => counts.fn_ += 1,
            }
        }
        counts
    }

    pub fn negatives(&self) -> usize {
        self.tn + self.fp
    }

    pub fn positives(&self) -> usize {
        self.tp + self.fn_
    }
}

/// Rates derived at one threshold
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThresholdRow {
    pub threshold: f64,
    pub sensitivity: f64,
    pub specificity: f64,
    pub likelihood_ratio_neg: f64,
    pub likelihood_ratio_pos: f64,
    pub tp: usize,
    pub fp: usize,
    pub tn: usize,
    pub fn_: usize,
    /// Size of the negative class (survived)
    pub total_negative: usize,
    /// Size of the positive class (deceased)
    pub total_positive: usize,
}

/// One row per threshold, in the caller's order
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThresholdTable {
    pub rows: Vec<ThresholdRow>,
    pub diagnostics: Vec<String>,
}

impl ThresholdTable {
    pub fn row(&self, threshold: f64) -> Option<&ThresholdRow> {
        self.rows.iter().find(|r| r.threshold == threshold)
    }

    pub fn to_dataframe(&self) -> Result<DataFrame> {
        let col = |f: fn(&ThresholdRow) -> f64| self.rows.iter().map(f).collect::<Vec<f64>>();
        let count = |f: fn(&ThresholdRow) -> usize| {
            self.rows.iter().map(|r| f(r) as u64).collect::<Vec<u64>>()
        };
        let df = df!(
            "threshold" => col(|r| r.threshold),
            "sensitivity" => col(|r| r.sensitivity),
            "specificity" => col(|r| r.specificity),
            "likelihood_ratio_neg" => col(|r| r.likelihood_ratio_neg),
            "likelihood_ratio_pos" => col(|r| r.likelihood_ratio_pos),
            "tp" => count(|r| r.tp),
            "fp" => count(|r| r.fp),
            "tn" => count(|r| r.tn),
            "fn" => count(|r| r.fn_),
            "total_survived" => count(|r| r.total_negative),
            "total_deceased" => count(|r| r.total_positive)
        )?;
        Ok(df)
    }
}

impl fmt::Display for ThresholdTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "{:>9} {:>8} {:>8} {:>8} {:>8} {:>7} {:>7} {:>7} {:>7}",
            "threshold", "sens", "spec", "LR-", "LR+", "tp", "fp", "tn", "fn"
        )?;
        for r in &self.rows {
            writeln!(
                f,
                "{:>9.3} {:>8.4} {:>8.4} {:>8.4} {:>8.4} {:>7} {:>7} {:>7} {:>7}",
                r.threshold,
                r.sensitivity,
                r.specificity,
                r.likelihood_ratio_neg,
                r.likelihood_ratio_pos,
                r.tp,
                r.fp,
                r.tn,
                r.fn_
            )?;
        }
        Ok(())
    }
}

/// Computes confusion-derived rates at a list of thresholds
///
/// A prediction is positive when `score > threshold`.
///
/// LR+ = sensitivity / (1 - specificity) is NaN when specificity is 1, even if
/// sensitivity is also 1. LR- = (1 - sensitivity) / specificity is NaN when
/// specificity is 0. Each undefined ratio adds a diagnostic to the table.
#[derive(Debug, Clone)]
pub struct ThresholdAnalyzer {
    thresholds: Vec<f64>,
}

impl Default for ThresholdAnalyzer {
    fn default() -> Self {
        Self::new(vec![0.1, 0.5])
    }
}

impl ThresholdAnalyzer {
    pub fn new(thresholds: Vec<f64>) -> Self {
        Self { thresholds }
    }

    pub fn analyze(&self, y_true: &Array1<f64>, y_pred: &Array1<f64>) -> Result<ThresholdTable> {
        check_binary_inputs(y_true, y_pred)?;
        if self.thresholds.is_empty() {
            return Err(EvalError::InvalidInput("No thresholds given".to_string()));
        }

        let mut diagnostics = Vec::new();
        let mut rows = Vec::with_capacity(self.thresholds.len());
        for &threshold in &self.thresholds {
            let cm = ConfusionCounts::tally(y_true, y_pred, |p| p > threshold);
            let context = format!("threshold {}", threshold);
            let mut record = |result: Result<f64>| match result {
                Ok(v) => v,
                Err(e) => {
                    warn!(threshold, error = %e, "Ratio undefined, recording NaN");
                    diagnostics.push(e.to_string());
                    f64::NAN
                }
            };

            let sensitivity = record(ratio(cm.tp as f64, cm.positives() as f64, &context, "sensitivity"));
            let specificity = record(ratio(cm.tn as f64, cm.negatives() as f64, &context, "specificity"));
            let likelihood_ratio_neg = record(ratio(
                1.0 - sensitivity,
                specificity,
                &context,
                "likelihood_ratio_neg",
            ));
            let likelihood_ratio_pos = record(ratio(
                sensitivity,
                1.0 - specificity,
                &context,
                "likelihood_ratio_pos",
            ));

            rows.push(ThresholdRow {
                threshold,
                sensitivity,
                specificity,
                likelihood_ratio_neg,
                likelihood_ratio_pos,
                tp: cm.tp,
                fp: cm.fp,
                tn: cm.tn,
                fn_: cm.fn_,
                total_negative: cm.negatives(),
                total_positive: cm.positives(),
            });
        }

        Ok(ThresholdTable { rows, diagnostics })
    }
}

fn ratio(numerator: f64, denominator: f64, context: &str, quantity: &str) -> Result<f64> {
    if denominator == 0.0 || numerator.is_nan() || denominator.is_nan() {
        return Err(EvalError::DivisionUndefined {
            context: context.to_string(),
            quantity: quantity.to_string(),
        });
    }
    Ok(numerator / denominator)
}
