//! End-to-end audit run
//!
//! Calibrates, then tabulates threshold rates, subgroup fairness and risk
//! buckets, and gathers the plot series for raw and calibrated predictions.

use crate::calibration::{CalibrationOutcome, IsotonicCalibrator};
use crate::config::EvaluationConfig;
use crate::error::Result;
use crate::fairness::{FairnessAnalyzer, FairnessTable};
use crate::metrics::{PlotSeries, ThresholdAnalyzer, ThresholdTable};
use crate::persistence::ArtifactStore;
use crate::records::{validate_all, ColumnSelection, ScoredRecord};
use crate::risk::{RiskAnalyzer, RiskTable};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Instant;
use tracing::{info, warn};

/// Everything one audit run produced
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditReport {
    pub model_name: String,
    pub generated_at: DateTime<Utc>,
    pub config: EvaluationConfig,
    pub calibration: CalibrationOutcome,
    /// Threshold rates of the calibrated test predictions
    pub thresholds: ThresholdTable,
    /// Subgroup breakdown of the calibrated test predictions
    pub fairness: FairnessTable,
    /// Raw-score risk buckets over the held-out records
    pub risk: RiskTable,
    /// Raw and calibrated series, when the test split holds both classes
    pub plots: Vec<PlotSeries>,
    pub diagnostics: Vec<String>,
    pub elapsed_secs: f64,
}

impl AuditReport {
    /// Non-fatal findings gathered from every step
    pub fn all_diagnostics(&self) -> Vec<&str> {
        self.calibration
            .comparison
            .diagnostics
            .iter()
            .chain(&self.thresholds.diagnostics)
            .chain(&self.fairness.diagnostics)
            .chain(&self.risk.diagnostics)
            .chain(&self.diagnostics)
            .map(String::as_str)
            .collect()
    }

    /// Write the calibration artifacts, each table and the full report
    pub fn persist<S: ArtifactStore>(&self, store: &S) -> Result<Vec<PathBuf>> {
        let name = &self.model_name;
        let mut paths = self.calibration.persist(store, name)?;
        paths.push(store.store_json(&format!("thresholds_{}", name), &self.thresholds)?);
        paths.push(store.store_json(&format!("fairness_{}", name), &self.fairness)?);
        paths.push(store.store_json(&format!("risk_{}", name), &self.risk)?);
        paths.push(store.store_json(&format!("plot_series_{}", name), &self.plots)?);
        paths.push(store.store_json(&format!("audit_report_{}", name), self)?);
        info!(artifacts = paths.len(), model = %name, "Audit artifacts persisted");
        Ok(paths)
    }
}

/// Runs every analyzer under one configuration
#[derive(Debug, Clone, Default)]
pub struct AuditPipeline {
    config: EvaluationConfig,
}

impl AuditPipeline {
    /// Create a pipeline, rejecting an inconsistent configuration
    pub fn new(config: EvaluationConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn run(&self, records: &[ScoredRecord], model_name: &str) -> Result<AuditReport> {
        let start = Instant::now();
        validate_all(records)?;
        info!(records = records.len(), model = %model_name, "Starting audit");

        let calibration = IsotonicCalibrator::from_config(&self.config).run(records)?;

        let scored = calibration.scored_rows();
        let calibrated = ColumnSelection::calibrated();
        let (y_test, p_cal) = calibrated.extract(&scored)?;
        let (_, p_raw) = ColumnSelection::raw().extract(&scored)?;

        let thresholds = ThresholdAnalyzer::new(self.config.thresholds.clone()).analyze(&y_test, &p_cal)?;
        info!("Threshold rates (calibrated)\n{}", thresholds);

        let fairness = FairnessAnalyzer::new(self.config.fairness.clone())?
            .analyze(&scored, &calibrated)?;
        info!(rows = fairness.rows.len(), "Fairness breakdown complete");

        let risk = RiskAnalyzer::new(&self.config.risk)?.analyze(records, &ColumnSelection::raw())?;

        let mut plots = Vec::with_capacity(2);
        let mut diagnostics = Vec::new();
        for (label, p) in [("original", &p_raw), ("calibrated", &p_cal)] {
            match PlotSeries::compute(label, &y_test, p, &self.config.curves) {
                Ok(series) => plots.push(series),
                Err(e) if !e.is_fatal() => {
                    warn!(series = label, error = %e, "Plot series skipped");
                    diagnostics.push(format!("{} plot series: {}", label, e));
                }
                Err(e) => return Err(e),
            }
        }

        let elapsed_secs = start.elapsed().as_secs_f64();
        info!(elapsed_secs, "Audit complete");

        Ok(AuditReport {
            model_name: model_name.to_string(),
            generated_at: Utc::now(),
            config: self.config.clone(),
            calibration,
            thresholds,
            fairness,
            risk,
            plots,
            diagnostics,
            elapsed_secs,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::EvalError;
    use crate::synthetic::CohortGenerator;

    #[test]
    fn test_run_populates_every_table() {
        let records = CohortGenerator::new()
            .with_seed(11)
            .with_development_rows(20)
            .generate();
        let report = AuditPipeline::default().run(&records, "demo").unwrap();

        assert_eq!(report.calibration.test_rows.len(), 40);
        assert_eq!(report.thresholds.rows.len(), 2);
        assert!(!report.fairness.rows.is_empty());
        assert_eq!(report.risk.total_count() + report.risk.unbucketed, 100);
        assert_eq!(report.plots.len(), 2);
        assert_eq!(report.plots[1].label, "calibrated");
    }

    #[test]
    fn test_invalid_config_rejected() {
        let config = EvaluationConfig::default().with_thresholds(vec![1.5]);
        assert!(matches!(AuditPipeline::new(config), Err(EvalError::ConfigError(_))));
    }

    #[test]
    fn test_invalid_record_aborts() {
        let mut records = CohortGenerator::new().with_seed(2).generate();
        records[0].y = 3;
        let err = AuditPipeline::default().run(&records, "demo").unwrap_err();
        assert!(matches!(err, EvalError::InvalidInput(_)));
    }
}
