//! Split-disciplined isotonic recalibration of model scores

use crate::calibration::{Calibrator, IsotonicRegression};
use crate::config::{CalibrationSplitConfig, EvaluationConfig};
use crate::error::{EvalError, Result};
use crate::metrics::{brier_score, ComparisonReport, MetricEvaluator};
use crate::persistence::ArtifactStore;
use crate::records::{ColumnSelection, ScoredRecord};
use ndarray::Array1;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::{debug, info, warn};

/// Result of a calibration run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CalibrationOutcome {
    /// Calibration-test rows with `p_calibrated` attached, in input order
    pub test_rows: Vec<ScoredRecord>,
    /// Fitted mapping, reusable on new raw scores
    pub mapping: IsotonicRegression,
    /// Metrics on the test rows, raw score vs calibrated
    pub comparison: ComparisonReport,
    pub train_size: usize,
    /// Brier score of the raw scores on the training rows
    pub train_brier_before: f64,
    /// Brier score of the fitted mapping on the training rows
    pub train_brier_after: f64,
}

impl CalibrationOutcome {
    /// Test rows whose calibrated probability is defined
    ///
    /// Under [`OutOfBounds::Nan`](crate::config::OutOfBounds) rows scored
    /// outside the training range carry NaN and are left out of evaluation.
    pub fn scored_rows(&self) -> Vec<ScoredRecord> {
        self.test_rows
            .iter()
            .filter(|r| r.p_calibrated.is_some_and(|p| !p.is_nan()))
            .cloned()
            .collect()
    }

    /// Write the fitted mapping and the augmented test rows
    pub fn persist<S: ArtifactStore>(&self, store: &S, model_name: &str) -> Result<Vec<PathBuf>> {
        Ok(vec![
            store.store_json(&format!("model_calibrated_{}", model_name), &self.mapping)?,
            store.store_json(&format!("y_calibrated_{}", model_name), &self.test_rows)?,
        ])
    }
}

/// Fits an isotonic mapping on the calibration-training subsets and
/// evaluates it on the calibration-test subset
#[derive(Debug, Clone)]
pub struct IsotonicCalibrator {
    split: CalibrationSplitConfig,
    evaluator: MetricEvaluator,
}

impl Default for IsotonicCalibrator {
    fn default() -> Self {
        Self::new(CalibrationSplitConfig::default(), MetricEvaluator::default())
    }
}

impl IsotonicCalibrator {
    pub fn new(split: CalibrationSplitConfig, evaluator: MetricEvaluator) -> Self {
        Self { split, evaluator }
    }

    pub fn from_config(config: &EvaluationConfig) -> Self {
        Self::new(
            config.calibration.clone(),
            MetricEvaluator::new(config.metrics.clone()),
        )
    }

    /// Partition records into (training, test) rows
    ///
    /// The two splits are disjoint by construction: a row is selected by its
    /// single `subset` tag and the configuration forbids overlap.
    pub fn select_splits<'a>(
        &self,
        records: &'a [ScoredRecord],
    ) -> Result<(Vec<&'a ScoredRecord>, Vec<&'a ScoredRecord>)> {
        if self.split.train_subsets.contains(&self.split.test_subset) {
            return Err(EvalError::InvalidInput(format!(
                "Calibration test subset {} overlaps the training subsets {:?}",
                self.split.test_subset, self.split.train_subsets
            )));
        }

        let train: Vec<&ScoredRecord> = records
            .iter()
            .filter(|r| self.split.train_subsets.contains(&r.subset))
            .collect();
        let test: Vec<&ScoredRecord> = records
            .iter()
            .filter(|r| r.subset == self.split.test_subset)
            .collect();

        if train.is_empty() {
            return Err(EvalError::InsufficientData {
                split: format!("calibration-train (subsets {:?})", self.split.train_subsets),
            });
        }
        if test.is_empty() {
            return Err(EvalError::InsufficientData {
                split: format!("calibration-test (subset {})", self.split.test_subset),
            });
        }

        Ok((train, test))
    }

    /// Fit, apply and report
    pub fn run(&self, records: &[ScoredRecord]) -> Result<CalibrationOutcome> {
        let (train, test) = self.select_splits(records)?;
        for record in train.iter().chain(test.iter()) {
            record.validate()?;
        }
        info!(
            train_rows = train.len(),
            test_rows = test.len(),
            "Calibration splits selected"
        );

        let train_scores: Array1<f64> = train.iter().map(|r| r.score).collect();
        let train_labels: Array1<f64> = train.iter().map(|r| r.y as f64).collect();

        let mut mapping = IsotonicRegression::new().with_out_of_bounds(self.split.out_of_bounds);
        let train_fitted = mapping.fit_calibrate(&train_scores, &train_labels)?;
        let train_brier_before = brier_score(&train_labels, &train_scores)?;
        let train_brier_after = brier_score(&train_labels, &train_fitted)?;
        debug!(
            knots = mapping.knots().map(|(x, _)| x.len()).unwrap_or(0),
            train_brier_before,
            train_brier_after,
            "Isotonic mapping fitted"
        );

        let test_rows: Vec<ScoredRecord> = test
            .into_iter()
            .map(|r| {
                let mut row = r.clone();
                row.p_calibrated = Some(mapping.transform_one(r.score)?);
                Ok(row)
            })
            .collect::<Result<Vec<_>>>()?;

        let mut outcome = CalibrationOutcome {
            test_rows,
            mapping,
            comparison: ComparisonReport::default(),
            train_size: train.len(),
            train_brier_before,
            train_brier_after,
        };

        let scored = outcome.scored_rows();
        let excluded = outcome.test_rows.len() - scored.len();
        if scored.is_empty() {
            return Err(EvalError::InsufficientData {
                split: format!(
                    "calibration-test (subset {}) inside the training score range",
                    self.split.test_subset
                ),
            });
        }

        let (y, raw) = ColumnSelection::raw().extract(&scored)?;
        let (_, calibrated) = ColumnSelection::calibrated().extract(&scored)?;
        outcome.comparison = self.evaluator.compare(&y, &raw, &calibrated)?;
        if excluded > 0 {
            warn!(excluded, "Test rows outside the training range left out of evaluation");
            outcome.comparison.diagnostics.push(format!(
                "{} calibration-test rows scored outside the training range",
                excluded
            ));
        }
        info!(
            test_rows = scored.len(),
            "Calibration evaluated\n{}",
            outcome.comparison
        );

        Ok(outcome)
    }
}
