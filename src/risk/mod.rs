//! Risk stratification
//!
//! Buckets the held-out population by predicted probability into fixed
//! decile-like bands and reports the observed event rate per band.

use crate::binning::BinEdges;
use crate::config::RiskConfig;
use crate::error::{EvalError, Result};
use crate::records::{ColumnSelection, ScoredRecord};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use tracing::{debug, info, warn};

/// One populated risk bucket
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskRow {
    pub category: String,
    pub count: usize,
    /// Positive outcomes (died within 90 days)
    pub count_died: usize,
    pub count_survived: usize,
    /// `count_died / count`, as a fraction
    pub percent_died: f64,
}

/// Populated buckets in label order
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskTable {
    pub rows: Vec<RiskRow>,
    /// Held-out records whose probability fell in no bucket
    pub unbucketed: usize,
    pub diagnostics: Vec<String>,
}

impl RiskTable {
    /// Records placed in some bucket
    pub fn total_count(&self) -> usize {
        self.rows.iter().map(|r| r.count).sum()
    }

    pub fn row(&self, category: &str) -> Option<&RiskRow> {
        self.rows.iter().find(|r| r.category == category)
    }

    /// Columns: Risk Category, Count, Count Died in 90, Count Survived, Percent Died in 90
    pub fn to_dataframe(&self) -> Result<DataFrame> {
        let df = df!(
            "Risk Category" => self.rows.iter().map(|r| r.category.clone()).collect::<Vec<String>>(),
            "Count" => self.rows.iter().map(|r| r.count as u64).collect::<Vec<u64>>(),
            "Count Died in 90" => self.rows.iter().map(|r| r.count_died as u64).collect::<Vec<u64>>(),
            "Count Survived" => self.rows.iter().map(|r| r.count_survived as u64).collect::<Vec<u64>>(),
            "Percent Died in 90" => self.rows.iter().map(|r| r.percent_died).collect::<Vec<f64>>()
        )?;
        Ok(df)
    }
}

impl fmt::Display for RiskTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "{:<14} {:>7} {:>8} {:>9} {:>9}",
            "Risk Category", "Count", "Died", "Survived", "Rate"
        )?;
        for r in &self.rows {
            writeln!(
                f,
                "{:<14} {:>7} {:>8} {:>9} {:>9.4}",
                r.category, r.count, r.count_died, r.count_survived, r.percent_died
            )?;
        }
        if self.unbucketed > 0 {
            writeln!(f, "({} records outside every bucket)", self.unbucketed)?;
        }
        Ok(())
    }
}

/// Held-out risk stratifier
#[derive(Debug, Clone)]
pub struct RiskAnalyzer {
    held_out_above: i32,
    bins: BinEdges<String>,
}

impl RiskAnalyzer {
    pub fn new(config: &RiskConfig) -> Result<Self> {
        Ok(Self {
            held_out_above: config.held_out_above,
            bins: config.bins()?,
        })
    }

    /// Held-out records, ordered by id
    ///
    /// Integer ids sort numerically and ahead of any other id.
    pub fn held_out<'a>(&self, records: &'a [ScoredRecord]) -> Vec<&'a ScoredRecord> {
        let mut held: Vec<&ScoredRecord> = records
            .iter()
            .filter(|r| r.subset > self.held_out_above)
            .collect();
        held.sort_by(|a, b| compare_ids(&a.id, &b.id));
        held
    }

    /// Stratify the held-out records by the probability column in `columns`
    pub fn analyze(&self, records: &[ScoredRecord], columns: &ColumnSelection) -> Result<RiskTable> {
        let held = self.held_out(records);
        if held.is_empty() {
            return Err(EvalError::InsufficientData {
                split: format!("held-out (subset > {})", self.held_out_above),
            });
        }

        // (count, died) per bucket
        let mut tallies = vec![(0usize, 0usize); self.bins.n_bins()];
        let mut unbucketed = 0;
        for record in &held {
            let outcome = record.value(&columns.outcome)?;
            if outcome != 0.0 && outcome != 1.0 {
                return Err(EvalError::InvalidInput(format!(
                    "record {}: outcome column '{}' must be 0 or 1, got {}",
                    record.id, columns.outcome, outcome
                )));
            }
            let probability = record.value(&columns.probability)?;
            match self.bins.assign(probability) {
                Some(bucket) => {
                    tallies[bucket].0 += 1;
                    if outcome == 1.0 {
                        tallies[bucket].1 += 1;
                    }
                }
                None => {
                    debug!(record = %record.id, probability, "Probability outside every risk bucket");
                    unbucketed += 1;
                }
            }
        }

        let mut diagnostics = Vec::new();
        if unbucketed > 0 {
            warn!(unbucketed, "Held-out records fell outside every risk bucket");
            diagnostics.push(format!(
                "{} held-out records fell outside every risk bucket",
                unbucketed
            ));
        }

        let rows: Vec<RiskRow> = self
            .bins
            .labels()
            .iter()
            .zip(tallies)
            .filter(|(_, (count, _))| *count > 0)
            .map(|(label, (count, died))| RiskRow {
                category: label.clone(),
                count,
                count_died: died,
                count_survived: count - died,
                percent_died: died as f64 / count as f64,
            })
            .collect();

        info!(
            held_out = held.len(),
            buckets = rows.len(),
            omitted = self.bins.n_bins() - rows.len(),
            "Risk stratification complete"
        );

        Ok(RiskTable {
            rows,
            unbucketed,
            diagnostics,
        })
    }
}

fn compare_ids(a: &str, b: &str) -> Ordering {
    match (a.parse::<i64>(), b.parse::<i64>()) {
        (Ok(x), Ok(y)) => x.cmp(&y).then_with(|| a.cmp(b)),
        (Ok(_), Err(_)) => Ordering::Less,
        (Err(_), Ok(_)) => Ordering::Greater,
        (Err(_), Err(_)) => a.cmp(b),
    }
}
