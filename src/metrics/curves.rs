//! Numeric series for ROC, precision-recall and calibration plots
//!
//! Nothing here renders; the series are handed to whatever draws the figures.

use crate::config::CurveConfig;
use crate::error::{EvalError, Result};
use crate::metrics::classification::{check_binary_inputs, class_counts, threshold_walk};
use ndarray::Array1;
use serde::{Deserialize, Serialize};

/// A point on the ROC curve
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RocPoint {
    pub fpr: f64,
    pub tpr: f64,
    /// Scores >= threshold are called positive; the first point uses +inf
    pub threshold: f64,
}

/// ROC curve with its area
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RocCurve {
    pub points: Vec<RocPoint>,
    pub auc: f64,
}

/// A point on the precision-recall curve
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PrPoint {
    pub precision: f64,
    pub recall: f64,
    pub threshold: f64,
}

/// Precision-recall curve with average precision
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PrCurve {
    pub points: Vec<PrPoint>,
    pub average_precision: f64,
}

/// One non-empty calibration bin
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CalibrationBin {
    pub mean_predicted: f64,
    pub fraction_positive: f64,
    pub count: usize,
}

/// Compute the ROC curve, starting at (0, 0)
pub fn roc_curve(y_true: &Array1<f64>, y_pred: &Array1<f64>) -> Result<RocCurve> {
    check_binary_inputs(y_true, y_pred)?;
    let (negatives, positives) = class_counts(y_true);
    if positives == 0 || negatives == 0 {
        return Err(EvalError::DegenerateSubgroup {
            context: "ROC curve needs both outcome classes".to_string(),
        });
    }

    let mut points = vec![RocPoint {
        fpr: 0.0,
        tpr: 0.0,
        threshold: f64::INFINITY,
    }];
    for (threshold, fp, tp) in threshold_walk(y_true, y_pred) {
        points.push(RocPoint {
            fpr: fp as f64 / negatives as f64,
            tpr: tp as f64 / positives as f64,
            threshold,
        });
    }

    let auc = points
        .windows(2)
        .map(|w| (w[1].fpr - w[0].fpr) * (w[1].tpr + w[0].tpr) / 2.0)
        .sum();

    Ok(RocCurve { points, auc })
}

/// Compute the precision-recall curve in decreasing-threshold order
pub fn precision_recall_curve(y_true: &Array1<f64>, y_pred: &Array1<f64>) -> Result<PrCurve> {
    check_binary_inputs(y_true, y_pred)?;
    let (_, positives) = class_counts(y_true);
    if positives == 0 {
        return Err(EvalError::DegenerateSubgroup {
            context: "precision-recall curve needs a positive outcome".to_string(),
        });
    }

    let mut points = Vec::new();
    let mut average_precision = 0.0;
    let mut prev_recall = 0.0;
    for (threshold, fp, tp) in threshold_walk(y_true, y_pred) {
        let precision = tp as f64 / (tp + fp) as f64;
        let recall = tp as f64 / positives as f64;
        average_precision += (recall - prev_recall) * precision;
        prev_recall = recall;
        points.push(PrPoint {
            precision,
            recall,
            threshold,
        });
    }

    Ok(PrCurve {
        points,
        average_precision,
    })
}

/// Observed event rate against mean prediction over uniform bins on [0, 1]
///
/// Bins are right-closed except the first; empty bins are skipped.
pub fn calibration_curve(
    y_true: &Array1<f64>,
    y_pred: &Array1<f64>,
    n_bins: usize,
) -> Result<Vec<CalibrationBin>> {
    check_binary_inputs(y_true, y_pred)?;
    if n_bins == 0 {
        return Err(EvalError::InvalidInput("n_bins must be positive".to_string()));
    }
    if y_pred.iter().any(|p| !(0.0..=1.0).contains(p)) {
        return Err(EvalError::InvalidInput(
            "Calibration curve needs probabilities in [0, 1]".to_string(),
        ));
    }

    let inner_edges: Vec<f64> = (1..n_bins).map(|i| i as f64 / n_bins as f64).collect();
    let mut sums = vec![0.0; n_bins];
    let mut positives = vec![0.0; n_bins];
    let mut counts = vec![0usize; n_bins];

    for (&p, &y) in y_pred.iter().zip(y_true.iter()) {
        let bin = inner_edges.partition_point(|&e| e < p);
        sums[bin] += p;
        positives[bin] += y;
        counts[bin] += 1;
    }

    Ok((0..n_bins)
        .filter(|&i| counts[i] > 0)
        .map(|i| CalibrationBin {
            mean_predicted: sums[i] / counts[i] as f64,
            fraction_positive: positives[i] / counts[i] as f64,
            count: counts[i],
        })
        .collect())
}

/// Counts of predictions in equal-width bins over [0, 1]
///
/// Bins are left-closed, the last one also includes 1.0; values outside
/// [0, 1] are not counted.
pub fn prediction_histogram(y_pred: &Array1<f64>, n_bins: usize) -> Vec<usize> {
    let mut counts = vec![0usize; n_bins];
    if n_bins == 0 {
        return counts;
    }
    for &p in y_pred.iter() {
        if !(0.0..=1.0).contains(&p) {
            continue;
        }
        let bin = ((p * n_bins as f64) as usize).min(n_bins - 1);
        counts[bin] += 1;
    }
    counts
}

/// ROC point whose threshold is closest to each target
pub fn operating_points(roc: &RocCurve, targets: &[f64]) -> Vec<RocPoint> {
    targets
        .iter()
        .filter_map(|&target| {
            roc.points
                .iter()
                .filter(|p| p.threshold.is_finite())
                .min_by(|a, b| {
                    (a.threshold - target)
                        .abs()
                        .partial_cmp(&(b.threshold - target).abs())
                        .unwrap_or(std::cmp::Ordering::Equal)
                })
                .copied()
        })
        .collect()
}

/// Everything a renderer needs for one prediction column
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlotSeries {
    pub label: String,
    pub roc: RocCurve,
    pub operating_points: Vec<RocPoint>,
    pub precision_recall: PrCurve,
    pub calibration: Vec<CalibrationBin>,
    pub histogram: Vec<usize>,
    pub brier: f64,
}

impl PlotSeries {
    pub fn compute(
        label: impl Into<String>,
        y_true: &Array1<f64>,
        y_pred: &Array1<f64>,
        config: &CurveConfig,
    ) -> Result<Self> {
        let roc = roc_curve(y_true, y_pred)?;
        let operating_points = operating_points(&roc, &config.operating_points);
        Ok(Self {
            label: label.into(),
            operating_points,
            precision_recall: precision_recall_curve(y_true, y_pred)?,
            calibration: calibration_curve(y_true, y_pred, config.calibration_bins)?,
            histogram: prediction_histogram(y_pred, config.histogram_bins),
            brier: crate::metrics::brier_score(y_true, y_pred)?,
            roc,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::{average_precision, roc_auc};
    use ndarray::array;

    #[test]
    fn test_roc_curve_matches_auc() {
        let y = array![0.0, 0.0, 1.0, 1.0, 0.0, 1.0];
        let p = array![0.1, 0.4, 0.35, 0.8, 0.35, 0.7];
        let roc = roc_curve(&y, &p).unwrap();
        assert!((roc.auc - roc_auc(&y, &p).unwrap()).abs() < 1e-12);
        assert_eq!(roc.points.first().unwrap().fpr, 0.0);
        let last = roc.points.last().unwrap();
        assert_eq!((last.fpr, last.tpr), (1.0, 1.0));
    }

    #[test]
    fn test_pr_curve_matches_average_precision() {
        let y = array![0.0, 0.0, 1.0, 1.0, 0.0, 1.0];
        let p = array![0.1, 0.4, 0.35, 0.8, 0.35, 0.7];
        let pr = precision_recall_curve(&y, &p).unwrap();
        assert!((pr.average_precision - average_precision(&y, &p).unwrap()).abs() < 1e-12);
    }

    #[test]
    fn test_calibration_curve_skips_empty_bins() {
        let y = array![0.0, 0.0, 1.0, 1.0];
        let p = array![0.05, 0.1, 0.85, 0.95];
        let bins = calibration_curve(&y, &p, 10).unwrap();
        // 0.05 and 0.1 share the first bin (right-closed); 0.85 and 0.95 sit apart
        assert_eq!(bins.len(), 3);
        assert_eq!(bins[0].count, 2);
        assert!((bins[0].mean_predicted - 0.075).abs() < 1e-12);
        assert_eq!(bins[0].fraction_positive, 0.0);
        assert_eq!(bins[2].fraction_positive, 1.0);
    }

    #[test]
    fn test_histogram_includes_one() {
        let counts = prediction_histogram(&array![0.0, 0.1, 0.55, 1.0, 1.2], 10);
        assert_eq!(counts.iter().sum::<usize>(), 4);
        assert_eq!(counts[0], 1);
        assert_eq!(counts[1], 1);
        assert_eq!(counts[9], 1);
    }

    #[test]
    fn test_operating_points_nearest_threshold() {
        let y = array![0.0, 0.0, 1.0, 1.0];
        let p = array![0.1, 0.25, 0.45, 0.9];
        let roc = roc_curve(&y, &p).unwrap();
        let points = operating_points(&roc, &[0.2, 0.5]);
        assert_eq!(points[0].threshold, 0.25);
        assert_eq!(points[1].threshold, 0.45);
    }
}
