//! Discrimination and calibration metrics for binary outcomes

use crate::error::{EvalError, Result};
use ndarray::Array1;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::warn;

/// A scalar metric the evaluator can report
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricKind {
    /// Fraction correct after rounding probabilities
    Accuracy,
    /// Area under the ROC curve
    RocAuc,
    /// Step-interpolated area under the precision-recall curve
    AveragePrecision,
    /// Mean squared error against the outcome
    Brier,
}

impl MetricKind {
    pub const ALL: [MetricKind; 4] = [
        MetricKind::Accuracy,
        MetricKind::RocAuc,
        MetricKind::AveragePrecision,
        MetricKind::Brier,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            MetricKind::Accuracy => "accuracy",
            MetricKind::RocAuc => "ROC AUC",
            MetricKind::AveragePrecision => "avg precision",
            MetricKind::Brier => "Brier",
        }
    }

    /// Brier is a loss; the rest improve upward
    pub fn higher_is_better(&self) -> bool {
        !matches!(self, MetricKind::Brier)
    }

    /// Compute this metric
    pub fn compute(&self, y_true: &Array1<f64>, y_pred: &Array1<f64>) -> Result<f64> {
        match self {
            MetricKind::Accuracy => accuracy(y_true, y_pred),
            MetricKind::RocAuc => roc_auc(y_true, y_pred),
            MetricKind::AveragePrecision => average_precision(y_true, y_pred),
            MetricKind::Brier => brier_score(y_true, y_pred),
        }
    }
}

impl fmt::Display for MetricKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Reject empty, mismatched, non-binary or NaN inputs
pub(crate) fn check_binary_inputs(y_true: &Array1<f64>, y_pred: &Array1<f64>) -> Result<()> {
    if y_true.is_empty() || y_pred.is_empty() {
        return Err(EvalError::InvalidInput("Empty input".to_string()));
    }
    if y_true.len() != y_pred.len() {
        return Err(EvalError::InvalidInput(format!(
            "Labels and predictions must have same length ({} != {})",
            y_true.len(),
            y_pred.len()
        )));
    }
    if let Some(bad) = y_true.iter().find(|&&y| y != 0.0 && y != 1.0) {
        return Err(EvalError::InvalidInput(format!(
            "Labels must be 0 or 1, found {}",
            bad
        )));
    }
    if y_pred.iter().any(|p| p.is_nan()) {
        return Err(EvalError::InvalidInput("Predictions contain NaN".to_string()));
    }
    Ok(())
}

/// Accuracy after rounding predictions to the nearest integer
///
/// Rounding is half-to-even, so a prediction of exactly 0.5 counts as 0.
pub fn accuracy(y_true: &Array1<f64>, y_pred: &Array1<f64>) -> Result<f64> {
    check_binary_inputs(y_true, y_pred)?;

    let correct = y_true
        .iter()
        .zip(y_pred.iter())
        .filter(|(&y, &p)| p.round_ties_even() == y)
        .count();

    Ok(correct as f64 / y_true.len() as f64)
}

/// Brier score with the positive class labelled 1
///
/// Brier = (1/n) * sum_i (p_i - y_i)^2
pub fn brier_score(y_true: &Array1<f64>, y_pred: &Array1<f64>) -> Result<f64> {
    check_binary_inputs(y_true, y_pred)?;

    let n = y_true.len() as f64;
    let score: f64 = y_pred
        .iter()
        .zip(y_true.iter())
        .map(|(&p, &y)| (p - y).powi(2))
        .sum();

    Ok(score / n)
}

/// Cumulative (fp, tp) counts at each distinct score, highest score first
///
/// This is the walk shared by the ROC and precision-recall computations.
pub(crate) fn threshold_walk(y_true: &Array1<f64>, y_pred: &Array1<f64>) -> Vec<(f64, usize, usize)> {
    let mut indices: Vec<usize> = (0..y_pred.len()).collect();
    indices.sort_by(|&a, &b| {
        y_pred[b]
            .partial_cmp(&y_pred[a])
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let mut steps = Vec::new();
    let mut tp = 0usize;
    let mut fp = 0usize;
    let mut i = 0;
    while i < indices.len() {
        let current = y_pred[indices[i]];
        while i < indices.len() && y_pred[indices[i]] == current {
            if y_true[indices[i]] == 1.0 {
                tp += 1;
            } else {
                fp += 1;
            }
            i += 1;
        }
        steps.push((current, fp, tp));
    }
    steps
}

pub(crate) fn class_counts(y_true: &Array1<f64>) -> (usize, usize) {
    let positives = y_true.iter().filter(|&&y| y == 1.0).count();
    (y_true.len() - positives, positives)
}

/// Area under the ROC curve
///
/// Tied scores form a single step, integrated with the trapezoidal rule.
pub fn roc_auc(y_true: &Array1<f64>, y_pred: &Array1<f64>) -> Result<f64> {
    check_binary_inputs(y_true, y_pred)?;

    let (negatives, positives) = class_counts(y_true);
    if positives == 0 || negatives == 0 {
        return Err(EvalError::DegenerateSubgroup {
            context: format!(
                "ROC AUC needs both outcome classes ({} positive, {} negative)",
                positives, negatives
            ),
        });
    }

    let p = positives as f64;
    let n = negatives as f64;
    let mut auc = 0.0;
    let (mut prev_fpr, mut prev_tpr) = (0.0, 0.0);
    for (_, fp, tp) in threshold_walk(y_true, y_pred) {
        let fpr = fp as f64 / n;
        let tpr = tp as f64 / p;
        auc += (fpr - prev_fpr) * (tpr + prev_tpr) / 2.0;
        prev_fpr = fpr;
        prev_tpr = tpr;
    }

    Ok(auc)
}

/// Average precision: sum_n (R_n - R_{n-1}) * P_n over distinct thresholds
pub fn average_precision(y_true: &Array1<f64>, y_pred: &Array1<f64>) -> Result<f64> {
    check_binary_inputs(y_true, y_pred)?;

    let (_, positives) = class_counts(y_true);
    if positives == 0 {
        return Err(EvalError::DegenerateSubgroup {
            context: "average precision needs at least one positive outcome".to_string(),
        });
    }

    let p = positives as f64;
    let mut ap = 0.0;
    let mut prev_recall = 0.0;
    for (_, fp, tp) in threshold_walk(y_true, y_pred) {
        let recall = tp as f64 / p;
        let precision = tp as f64 / (tp + fp) as f64;
        ap += (recall - prev_recall) * precision;
        prev_recall = recall;
    }

    Ok(ap)
}

/// One metric value in a report
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricValue {
    pub metric: MetricKind,
    /// NaN when the metric is undefined for this input
    pub value: f64,
}

/// Metrics for one prediction column
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricReport {
    pub values: Vec<MetricValue>,
    pub n_samples: usize,
    /// Non-fatal degeneracies encountered while computing
    pub diagnostics: Vec<String>,
}

impl MetricReport {
    pub fn get(&self, metric: MetricKind) -> Option<f64> {
        self.values.iter().find(|v| v.metric == metric).map(|v| v.value)
    }
}

/// Original-vs-calibrated values for one metric
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricComparison {
    pub metric: MetricKind,
    pub original: f64,
    pub calibrated: f64,
}

impl MetricComparison {
    /// Whether the calibrated value is at least as good, in the metric's orientation
    pub fn improved_or_equal(&self) -> bool {
        if self.metric.higher_is_better() {
            self.calibrated >= self.original
        } else {
            self.calibrated <= self.original
        }
    }
}

/// Side-by-side metrics before and after calibration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ComparisonReport {
    pub rows: Vec<MetricComparison>,
    pub n_samples: usize,
    pub diagnostics: Vec<String>,
}

impl ComparisonReport {
    pub fn get(&self, metric: MetricKind) -> Option<&MetricComparison> {
        self.rows.iter().find(|r| r.metric == metric)
    }
}

impl fmt::Display for ComparisonReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Calibration comparison (n = {})", self.n_samples)?;
        for row in &self.rows {
            writeln!(
                f,
                "{:<15} original/calibrated: {:.4} / {:.4}",
                row.metric.name(),
                row.original,
                row.calibrated
            )?;
        }
        for diagnostic in &self.diagnostics {
            writeln!(f, "  warning: {}", diagnostic)?;
        }
        Ok(())
    }
}

/// Evaluates a configured list of metrics
#[derive(Debug, Clone)]
pub struct MetricEvaluator {
    metrics: Vec<MetricKind>,
}

impl Default for MetricEvaluator {
    fn default() -> Self {
        Self::new(MetricKind::ALL.to_vec())
    }
}

impl MetricEvaluator {
    pub fn new(metrics: Vec<MetricKind>) -> Self {
        Self { metrics }
    }

    /// Compute every configured metric
    ///
    /// Structural problems fail the call; an undefined metric is reported as
    /// NaN with a diagnostic.
    pub fn evaluate(&self, y_true: &Array1<f64>, y_pred: &Array1<f64>) -> Result<MetricReport> {
        check_binary_inputs(y_true, y_pred)?;

        let mut diagnostics = Vec::new();
        let mut values = Vec::with_capacity(self.metrics.len());
        for &metric in &self.metrics {
            let value = match metric.compute(y_true, y_pred) {
                Ok(v) => v,
                Err(e) if !e.is_fatal() => {
                    warn!(metric = %metric, error = %e, "Metric undefined, recording NaN");
                    diagnostics.push(format!("{}: {}", metric, e));
                    f64::NAN
                }
                Err(e) => return Err(e),
            };
            values.push(MetricValue { metric, value });
        }

        Ok(MetricReport {
            values,
            n_samples: y_true.len(),
            diagnostics,
        })
    }

    /// Evaluate original and calibrated predictions on the same outcomes
    pub fn compare(
        &self,
        y_true: &Array1<f64>,
        original: &Array1<f64>,
        calibrated: &Array1<f64>,
    ) -> Result<ComparisonReport> {
        let before = self.evaluate(y_true, original)?;
        let after = self.evaluate(y_true, calibrated)?;

        let rows = before
            .values
            .iter()
            .zip(after.values.iter())
            .map(|(b, a)| MetricComparison {
                metric: b.metric,
                original: b.value,
                calibrated: a.value,
            })
            .collect();

        let mut diagnostics = before.diagnostics;
        diagnostics.extend(after.diagnostics);

        Ok(ComparisonReport {
            rows,
            n_samples: y_true.len(),
            diagnostics,
        })
    }
}
