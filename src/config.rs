//! Evaluation configuration
//!
//! Every constant the analyzers depend on lives here and is passed in
//! explicitly, so two runs with different settings never share state.

use crate::binning::BinEdges;
use crate::error::{EvalError, Result};
use crate::fairness::DemographicFeature;
use crate::metrics::MetricKind;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Policy for inputs outside the calibration training range
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutOfBounds {
    /// Map to the nearest boundary value
    Clip,
    /// Return NaN
    Nan,
}

/// Which `subset` tags feed calibration fitting and evaluation
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CalibrationSplitConfig {
    /// Subsets used to fit the mapping
    pub train_subsets: Vec<i32>,
    /// Subset the mapping is evaluated on
    pub test_subset: i32,
    /// Out-of-range policy at inference time
    pub out_of_bounds: OutOfBounds,
}

impl Default for CalibrationSplitConfig {
    fn default() -> Self {
        Self {
            train_subsets: vec![7, 8],
            test_subset: 9,
            out_of_bounds: OutOfBounds::Clip,
        }
    }
}

/// Subgroup fairness settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FairnessConfig {
    /// Age bucket edges; bucket `i` is labelled `i + 1`
    pub age_edges: Vec<f64>,
    /// Decision threshold for the confusion counts
    pub decision_threshold: f64,
    /// Category code standing in for a missing value
    pub missing_sentinel: u32,
    /// Features analysed, in output order
    pub features: Vec<DemographicFeature>,
}

impl Default for FairnessConfig {
    fn default() -> Self {
        Self {
            age_edges: vec![17.0, 25.0, 35.0, 45.0, 55.0, 65.0, 75.0, 85.0, 90.0],
            decision_threshold: 0.5,
            missing_sentinel: 100,
            features: DemographicFeature::ALL.to_vec(),
        }
    }
}

impl FairnessConfig {
    /// Age buckets labelled 1..=n
    pub fn age_bins(&self) -> Result<BinEdges<u32>> {
        let labels = (1..self.age_edges.len() as u32).collect();
        BinEdges::new(self.age_edges.clone(), labels)
    }
}

/// Risk stratification settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RiskConfig {
    /// Records with `subset` strictly above this value are held out
    pub held_out_above: i32,
    /// Probability bucket edges
    pub edges: Vec<f64>,
    /// One label per bucket
    pub labels: Vec<String>,
}

impl Default for RiskConfig {
    fn default() -> Self {
        Self {
            held_out_above: 6,
            edges: vec![-0.1, 0.09, 0.19, 0.29, 0.39, 0.49, 0.59, 0.69, 0.79, 0.89, 0.99],
            labels: [
                "0-0.09", "0.1-0.19", "0.2-0.29", "0.3-0.39", "0.4-0.49",
                "0.5-0.59", "0.6-0.69", "0.7-0.79", "0.8-0.89", "0.9-0.99",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
        }
    }
}

impl RiskConfig {
    pub fn bins(&self) -> Result<BinEdges<String>> {
        BinEdges::new(self.edges.clone(), self.labels.clone())
    }
}

/// Settings for the numeric series handed to a renderer
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CurveConfig {
    /// Uniform bins for the calibration curve
    pub calibration_bins: usize,
    /// Bins for the prediction histogram
    pub histogram_bins: usize,
    /// Thresholds marked on the ROC curve
    pub operating_points: Vec<f64>,
}

impl Default for CurveConfig {
    fn default() -> Self {
        Self {
            calibration_bins: 10,
            histogram_bins: 10,
            operating_points: vec![0.2, 0.5],
        }
    }
}

/// Top-level configuration for an audit run
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EvaluationConfig {
    /// Metrics reported by the evaluator, in report order
    pub metrics: Vec<MetricKind>,
    /// Thresholds for the confusion analysis, in output order
    pub thresholds: Vec<f64>,
    pub calibration: CalibrationSplitConfig,
    pub fairness: FairnessConfig,
    pub risk: RiskConfig,
    pub curves: CurveConfig,
}

impl Default for EvaluationConfig {
    fn default() -> Self {
        Self {
            metrics: MetricKind::ALL.to_vec(),
            thresholds: vec![0.1, 0.5],
            calibration: CalibrationSplitConfig::default(),
            fairness: FairnessConfig::default(),
            risk: RiskConfig::default(),
            curves: CurveConfig::default(),
        }
    }
}

impl EvaluationConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the reported metrics
    pub fn with_metrics(mut self, metrics: Vec<MetricKind>) -> Self {
        self.metrics = metrics;
        self
    }

    /// Set the confusion-analysis thresholds
    pub fn with_thresholds(mut self, thresholds: Vec<f64>) -> Self {
        self.thresholds = thresholds;
        self
    }

    /// Set the calibration split
    pub fn with_calibration(mut self, calibration: CalibrationSplitConfig) -> Self {
        self.calibration = calibration;
        self
    }

    pub fn with_fairness(mut self, fairness: FairnessConfig) -> Self {
        self.fairness = fairness;
        self
    }

    pub fn with_risk(mut self, risk: RiskConfig) -> Self {
        self.risk = risk;
        self
    }

    /// Load a configuration from a JSON file; absent fields keep their defaults.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path.as_ref())?;
        let config: Self = serde_json::from_str(&text)
            .map_err(|e| EvalError::ConfigError(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Check internal consistency
    pub fn validate(&self) -> Result<()> {
        if self.metrics.is_empty() {
            return Err(EvalError::ConfigError("No metrics configured".to_string()));
        }
        if self.thresholds.iter().any(|t| !(0.0..=1.0).contains(t)) {
            return Err(EvalError::ConfigError(format!(
                "Thresholds must lie in [0, 1]: {:?}",
                self.thresholds
            )));
        }
        if self.calibration.train_subsets.is_empty() {
            return Err(EvalError::ConfigError(
                "Calibration needs at least one training subset".to_string(),
            ));
        }
        if self.calibration.train_subsets.contains(&self.calibration.test_subset) {
            return Err(EvalError::ConfigError(format!(
                "Calibration test subset {} overlaps the training subsets {:?}",
                self.calibration.test_subset, self.calibration.train_subsets
            )));
        }
        if !(0.0..=1.0).contains(&self.fairness.decision_threshold) {
            return Err(EvalError::ConfigError(format!(
                "Fairness decision threshold out of range: {}",
                self.fairness.decision_threshold
            )));
        }
        self.fairness.age_bins()?;
        self.risk.bins()?;
        if self.curves.calibration_bins == 0 || self.curves.histogram_bins == 0 {
            return Err(EvalError::ConfigError("Curve bin counts must be positive".to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        let config = EvaluationConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.thresholds, vec![0.1, 0.5]);
        assert_eq!(config.fairness.age_bins().unwrap().n_bins(), 8);
        assert_eq!(config.risk.bins().unwrap().n_bins(), 10);
    }

    #[test]
    fn test_overlapping_split_rejected() {
        let config = EvaluationConfig::new().with_calibration(CalibrationSplitConfig {
            train_subsets: vec![7, 9],
            test_subset: 9,
            out_of_bounds: OutOfBounds::Clip,
        });
        assert!(matches!(config.validate(), Err(EvalError::ConfigError(_))));
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let config: EvaluationConfig =
            serde_json::from_str(r#"{"thresholds": [0.2, 0.3, 0.4]}"#).unwrap();
        assert_eq!(config.thresholds, vec![0.2, 0.3, 0.4]);
        assert_eq!(config.calibration.test_subset, 9);
        assert_eq!(config.metrics.len(), 4);
    }

    #[test]
    fn test_bad_threshold_rejected() {
        let config = EvaluationConfig::new().with_thresholds(vec![1.5]);
        assert!(config.validate().is_err());
    }
}
