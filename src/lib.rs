//! Mortality-model evaluation
//!
//! Batch post-processing of a trained mortality-risk classifier's
//! probabilities: isotonic recalibration on a held-out split, before/after
//! discrimination and calibration metrics, and stratified audit tables.
//!
//! # Modules
//!
//! ## Core analyzers
//! - [`metrics`] - Scalar metrics, threshold confusion rates, plot series
//! - [`calibration`] - Isotonic regression and the split-disciplined calibrator
//! - [`fairness`] - Per-subgroup AUC and confusion counts
//! - [`risk`] - Held-out event rates by predicted-risk bucket
//!
//! ## Data and configuration
//! - [`records`] - Scored records, caller-named columns, polars conversion
//! - [`binning`] - Sorted-boundary bucketing
//! - [`config`] - Evaluation settings
//!
//! ## Orchestration
//! - [`pipeline`] - End-to-end audit run
//! - [`persistence`] - Artifact storage
//! - [`synthetic`] - Seeded synthetic cohorts
//! - [`cli`] - Command-line interface

// Core error handling
pub mod error;

// Data and configuration
pub mod binning;
pub mod config;
pub mod records;

// Core analyzers
pub mod calibration;
pub mod fairness;
pub mod metrics;
pub mod risk;

// Orchestration
pub mod cli;
pub mod persistence;
pub mod pipeline;
pub mod synthetic;

pub use error::{EvalError, Result};

/// Re-export commonly used types
pub mod prelude {
    // Error handling
    pub use crate::error::{EvalError, Result};

    // Data and configuration
    pub use crate::binning::BinEdges;
    pub use crate::config::{
        CalibrationSplitConfig, CurveConfig, EvaluationConfig, FairnessConfig, OutOfBounds,
        RiskConfig,
    };
    pub use crate::records::{ColumnMapping, ColumnSelection, ScoredRecord};

    // Metrics
    pub use crate::metrics::{
        ComparisonReport, MetricEvaluator, MetricKind, MetricReport, PlotSeries, ThresholdAnalyzer,
        ThresholdTable,
    };

    // Calibration
    pub use crate::calibration::{CalibrationOutcome, Calibrator, IsotonicCalibrator, IsotonicRegression};

    // Stratified tables
    pub use crate::fairness::{DemographicFeature, FairnessAnalyzer, FairnessTable};
    pub use crate::risk::{RiskAnalyzer, RiskTable};

    // Orchestration
    pub use crate::persistence::{ArtifactStore, JsonArtifactStore};
    pub use crate::pipeline::{AuditPipeline, AuditReport};
    pub use crate::synthetic::CohortGenerator;
}
