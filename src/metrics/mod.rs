//! Evaluation metrics
//!
//! - Scalar discrimination/calibration metrics (accuracy, ROC AUC, average
//!   precision, Brier score) and the configurable [`MetricEvaluator`]
//! - Confusion-derived rates at fixed thresholds
//! - Plot series (ROC, precision-recall, calibration curve, histogram)

mod classification;
mod curves;
mod threshold;

pub(crate) use classification::check_binary_inputs;
pub use classification::{
    accuracy, average_precision, brier_score, roc_auc, ComparisonReport, MetricComparison,
    MetricEvaluator, MetricKind, MetricReport, MetricValue,
};
pub use curves::{
    calibration_curve, operating_points, precision_recall_curve, prediction_histogram, roc_curve,
    CalibrationBin, PlotSeries, PrCurve, PrPoint, RocCurve, RocPoint,
};
pub use threshold::{ConfusionCounts, ThresholdAnalyzer, ThresholdRow, ThresholdTable};
