//! Subgroup fairness analysis
//!
//! Breaks predictive performance down by each demographic feature: for every
//! value a feature takes, the subgroup's size, ROC AUC and confusion counts at
//! a fixed decision threshold.
//!
//! Missing race, dialysis modality and ethnicity are replaced by a sentinel
//! category so that missingness shows up as its own row. Ages are bucketed
//! into right-closed bands; ages on or below the lowest edge or above the
//! highest edge fall in no band and are left out of the age rows only.

use crate::binning::BinEdges;
use crate::config::FairnessConfig;
use crate::error::{EvalError, Result};
use crate::metrics::{check_binary_inputs, roc_auc, ConfusionCounts};
use crate::records::{ColumnSelection, ScoredRecord};
use ndarray::Array1;
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use tracing::{info, warn};

/// Demographic dimensions of the fairness breakdown
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum DemographicFeature {
    #[serde(rename = "agegroup")]
    AgeGroup,
    #[serde(rename = "sex")]
    Sex,
    #[serde(rename = "dialtyp")]
    DialysisModality,
    #[serde(rename = "race")]
    Race,
    #[serde(rename = "hispanic")]
    Ethnicity,
}

impl DemographicFeature {
    pub const ALL: [DemographicFeature; 5] = [
        DemographicFeature::AgeGroup,
        DemographicFeature::Sex,
        DemographicFeature::DialysisModality,
        DemographicFeature::Race,
        DemographicFeature::Ethnicity,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            DemographicFeature::AgeGroup => "agegroup",
            DemographicFeature::Sex => "sex",
            DemographicFeature::DialysisModality => "dialtyp",
            DemographicFeature::Race => "race",
            DemographicFeature::Ethnicity => "hispanic",
        }
    }

    /// Whether a missing value becomes the sentinel category
    pub fn fills_missing(&self) -> bool {
        matches!(
            self,
            DemographicFeature::DialysisModality
                | DemographicFeature::Race
                | DemographicFeature::Ethnicity
        )
    }
}

impl fmt::Display for DemographicFeature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Performance of one (feature, value) subgroup
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FairnessRow {
    pub feature: DemographicFeature,
    pub value: u32,
    pub count: usize,
    /// NaN when the subgroup holds a single outcome class
    pub auc: f64,
    pub tn: usize,
    pub fp: usize,
    pub fn_: usize,
    pub tp: usize,
}

/// One row per (feature, value), features in configured order, values ascending
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FairnessTable {
    pub rows: Vec<FairnessRow>,
    pub diagnostics: Vec<String>,
}

impl FairnessTable {
    pub fn rows_for(&self, feature: DemographicFeature) -> impl Iterator<Item = &FairnessRow> {
        self.rows.iter().filter(move |r| r.feature == feature)
    }

    pub fn row(&self, feature: DemographicFeature, value: u32) -> Option<&FairnessRow> {
        self.rows
            .iter()
            .find(|r| r.feature == feature && r.value == value)
    }

    /// Lowest and highest defined AUC across a feature's subgroups
    pub fn auc_spread(&self, feature: DemographicFeature) -> Option<(f64, f64)> {
        self.rows_for(feature)
            .map(|r| r.auc)
            .filter(|a| !a.is_nan())
            .fold(None, |acc, a| match acc {
                None => Some((a, a)),
                Some((lo, hi)) => Some((lo.min(a), hi.max(a))),
            })
    }

    /// Columns: Feature, Value, Count, AUC, TN, FP, FN, TP
    pub fn to_dataframe(&self) -> Result<DataFrame> {
        let count = |f: fn(&FairnessRow) -> usize| {
            self.rows.iter().map(|r| f(r) as u64).collect::<Vec<u64>>()
        };
        let df = df!(
            "Feature" => self.rows.iter().map(|r| r.feature.name().to_string()).collect::<Vec<String>>(),
            "Value" => self.rows.iter().map(|r| r.value).collect::<Vec<u32>>(),
            "Count" => count(|r| r.count),
            "AUC" => self.rows.iter().map(|r| r.auc).collect::<Vec<f64>>(),
            "TN" => count(|r| r.tn),
            "FP" => count(|r| r.fp),
            "FN" => count(|r| r.fn_),
            "TP" => count(|r| r.tp)
        )?;
        Ok(df)
    }
}

impl fmt::Display for FairnessTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "{:<10} {:>6} {:>7} {:>7} {:>6} {:>6} {:>6} {:>6}",
            "Feature", "Value", "Count", "AUC", "TN", "FP", "FN", "TP"
        )?;
        for r in &self.rows {
            writeln!(
                f,
                "{:<10} {:>6} {:>7} {:>7.4} {:>6} {:>6} {:>6} {:>6}",
                r.feature.name(),
                r.value,
                r.count,
                r.auc,
                r.tn,
                r.fp,
                r.fn_,
                r.tp
            )?;
        }
        Ok(())
    }
}

/// Main fairness analyzer
#[derive(Debug, Clone)]
pub struct FairnessAnalyzer {
    config: FairnessConfig,
    age_bins: BinEdges<u32>,
}

impl FairnessAnalyzer {
    /// Create a new fairness analyzer
    pub fn new(config: FairnessConfig) -> Result<Self> {
        let age_bins = config.age_bins()?;
        Ok(Self { config, age_bins })
    }

    /// Category of `record` for `feature`, if it belongs to one
    pub fn feature_value(&self, feature: DemographicFeature, record: &ScoredRecord) -> Option<u32> {
        let sentinel = self.config.missing_sentinel;
        match feature {
            DemographicFeature::AgeGroup => record
                .age
                .and_then(|age| self.age_bins.label_for(age).copied()),
            DemographicFeature::Sex => record.sex,
            DemographicFeature::DialysisModality => {
                Some(record.dialysis_modality.unwrap_or(sentinel))
            }
            DemographicFeature::Race => Some(record.race.unwrap_or(sentinel)),
            DemographicFeature::Ethnicity => Some(record.ethnicity.unwrap_or(sentinel)),
        }
    }

    /// Evaluate every configured feature over `records`
    ///
    /// `columns` names the outcome and probability columns to score.
    pub fn analyze(&self, records: &[ScoredRecord], columns: &ColumnSelection) -> Result<FairnessTable> {
        if records.is_empty() {
            return Err(EvalError::InvalidInput("Empty input".to_string()));
        }
        let (y, p) = columns.extract(records)?;
        if let Some(bad) = y.iter().find(|&&v| v != 0.0 && v != 1.0) {
            return Err(EvalError::InvalidInput(format!(
                "Outcome column '{}' must be 0 or 1, found {}",
                columns.outcome, bad
            )));
        }
        check_binary_inputs(&y, &p)?;

        let mut rows = Vec::new();
        let mut diagnostics = Vec::new();

        for &feature in &self.config.features {
            let mut groups: BTreeMap<u32, Vec<usize>> = BTreeMap::new();
            for (i, record) in records.iter().enumerate() {
                if let Some(value) = self.feature_value(feature, record) {
                    groups.entry(value).or_default().push(i);
                }
            }

            let excluded = records.len() - groups.values().map(Vec::len).sum::<usize>();
            if excluded > 0 {
                info!(feature = %feature, excluded, "Records outside every category for feature");
            }

            for (value, members) in groups {
                let (row, diagnostic) = self.subgroup_row(feature, value, &members, &y, &p)?;
                if let Some(d) = diagnostic {
                    diagnostics.push(d);
                }
                rows.push(row);
            }
        }

        Ok(FairnessTable { rows, diagnostics })
    }

    fn subgroup_row(
        &self,
        feature: DemographicFeature,
        value: u32,
        members: &[usize],
        y: &Array1<f64>,
        p: &Array1<f64>,
    ) -> Result<(FairnessRow, Option<String>)> {
        let y_sub: Array1<f64> = members.iter().map(|&i| y[i]).collect();
        let p_sub: Array1<f64> = members.iter().map(|&i| p[i]).collect();

        let (auc, diagnostic) = match roc_auc(&y_sub, &p_sub) {
            Ok(auc) => (auc, None),
            Err(EvalError::DegenerateSubgroup { .. }) => {
                let e = EvalError::DegenerateSubgroup {
                    context: format!("{}={} has a single outcome class", feature, value),
                };
                warn!(feature = %feature, value, error = %e, "Subgroup AUC undefined, recording NaN");
                (f64::NAN, Some(e.to_string()))
            }
            Err(e) => return Err(e),
        };

        let threshold = self.config.decision_threshold;
        let cm = ConfusionCounts::tally(&y_sub, &p_sub, |prob| prob >= threshold);

        let row = FairnessRow {
            feature,
            value,
            count: members.len(),
            auc,
            tn: cm.tn,
            fp: cm.fp,
            fn_: cm.fn_,
            tp: cm.tp,
        };
        Ok((row, diagnostic))
    }
}
