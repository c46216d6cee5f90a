//! Scored records and column access
//!
//! A [`ScoredRecord`] is one patient-evaluation row: the model's raw score,
//! the observed outcome, the partition tag and the demographic attributes the
//! fairness analysis needs. Analyzers address the outcome and probability by
//! caller-supplied column names through [`ScoredRecord::value`].

use crate::error::{EvalError, Result};
use ndarray::Array1;
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub const COL_Y: &str = "y";
pub const COL_SCORE: &str = "score";
pub const COL_P_CALIBRATED: &str = "p_calibrated";
pub const COL_AGE: &str = "age";

/// One scored patient-evaluation instance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredRecord {
    pub id: String,
    /// Partition tag; 7 and 8 fit calibration, 9 evaluates it, >6 is held out
    pub subset: i32,
    /// Observed binary outcome
    pub y: u8,
    /// Raw model probability
    pub score: f64,
    /// Recalibrated probability, attached by the calibrator
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub p_calibrated: Option<f64>,
    pub age: Option<f64>,
    pub sex: Option<u32>,
    pub dialysis_modality: Option<u32>,
    pub race: Option<u32>,
    pub ethnicity: Option<u32>,
    /// Additional numeric columns, addressable by name
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub extra: BTreeMap<String, f64>,
}

impl ScoredRecord {
    /// Create a record without demographics
    pub fn new(id: impl Into<String>, subset: i32, y: u8, score: f64) -> Self {
        Self {
            id: id.into(),
            subset,
            y,
            score,
            p_calibrated: None,
            age: None,
            sex: None,
            dialysis_modality: None,
            race: None,
            ethnicity: None,
            extra: BTreeMap::new(),
        }
    }

    /// Set the demographic attributes
    pub fn with_demographics(
        mut self,
        age: Option<f64>,
        sex: Option<u32>,
        dialysis_modality: Option<u32>,
        race: Option<u32>,
        ethnicity: Option<u32>,
    ) -> Self {
        self.age = age;
        self.sex = sex;
        self.dialysis_modality = dialysis_modality;
        self.race = race;
        self.ethnicity = ethnicity;
        self
    }

    /// Attach an extra numeric column
    pub fn with_extra(mut self, name: impl Into<String>, value: f64) -> Self {
        self.extra.insert(name.into(), value);
        self
    }

    /// Numeric value of a named column
    pub fn value(&self, column: &str) -> Result<f64> {
        match column {
            COL_Y => Ok(self.y as f64),
            COL_SCORE => Ok(self.score),
            COL_P_CALIBRATED => self
                .p_calibrated
                .ok_or_else(|| EvalError::ColumnNotFound(format!("{} (record {})", column, self.id))),
            COL_AGE => self
                .age
                .ok_or_else(|| EvalError::ColumnNotFound(format!("{} (record {})", column, self.id))),
            other => self
                .extra
                .get(other)
                .copied()
                .ok_or_else(|| EvalError::ColumnNotFound(format!("{} (record {})", other, self.id))),
        }
    }

    /// Structural checks: binary outcome and a probability-valued score
    pub fn validate(&self) -> Result<()> {
        if self.y > 1 {
            return Err(EvalError::InvalidInput(format!(
                "record {}: outcome must be 0 or 1, got {}",
                self.id, self.y
            )));
        }
        if !(0.0..=1.0).contains(&self.score) {
            return Err(EvalError::InvalidInput(format!(
                "record {}: score {} outside [0, 1]",
                self.id, self.score
            )));
        }
        Ok(())
    }
}

/// Caller-chosen names for the outcome and probability columns
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnSelection {
    pub outcome: String,
    pub probability: String,
}

impl ColumnSelection {
    pub fn new(outcome: impl Into<String>, probability: impl Into<String>) -> Self {
        Self {
            outcome: outcome.into(),
            probability: probability.into(),
        }
    }

    /// Outcome against the raw model score
    pub fn raw() -> Self {
        Self::new(COL_Y, COL_SCORE)
    }

    /// Outcome against the recalibrated probability
    pub fn calibrated() -> Self {
        Self::new(COL_Y, COL_P_CALIBRATED)
    }

    /// Extract parallel outcome/probability arrays from `records`
    pub fn extract(&self, records: &[ScoredRecord]) -> Result<(Array1<f64>, Array1<f64>)> {
        let y = records
            .iter()
            .map(|r| r.value(&self.outcome))
            .collect::<Result<Vec<f64>>>()?;
        let p = records
            .iter()
            .map(|r| r.value(&self.probability))
            .collect::<Result<Vec<f64>>>()?;
        Ok((Array1::from_vec(y), Array1::from_vec(p)))
    }
}

impl Default for ColumnSelection {
    fn default() -> Self {
        Self::raw()
    }
}

/// Validate every record
pub fn validate_all(records: &[ScoredRecord]) -> Result<()> {
    records.iter().try_for_each(ScoredRecord::validate)
}

/// Source column names in a cohort table
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ColumnMapping {
    pub id: String,
    pub subset: String,
    pub y: String,
    pub score: String,
    pub age: String,
    pub sex: String,
    pub dialysis_modality: String,
    pub race: String,
    pub ethnicity: String,
    /// Additional numeric columns copied into `extra`
    pub extra: Vec<String>,
}

impl Default for ColumnMapping {
    fn default() -> Self {
        Self {
            id: "usrds_id".to_string(),
            subset: "subset".to_string(),
            y: "y".to_string(),
            score: "score".to_string(),
            age: "inc_age".to_string(),
            sex: "sex".to_string(),
            dialysis_modality: "dialtyp".to_string(),
            race: "race".to_string(),
            ethnicity: "hispanic".to_string(),
            extra: Vec::new(),
        }
    }
}

fn f64_column(df: &DataFrame, name: &str) -> Result<Vec<Option<f64>>> {
    let column = df
        .column(name)
        .map_err(|_| EvalError::ColumnNotFound(name.to_string()))?;
    let cast = column.cast(&DataType::Float64)?;
    let values = cast
        .f64()?
        .into_iter()
        .map(|v| v.filter(|x| !x.is_nan()))
        .collect();
    Ok(values)
}

fn required(values: Vec<Option<f64>>, name: &str) -> Result<Vec<f64>> {
    values
        .into_iter()
        .enumerate()
        .map(|(row, v)| {
            v.ok_or_else(|| {
                EvalError::InvalidInput(format!("column '{}' is null at row {}", name, row))
            })
        })
        .collect()
}

fn category(value: Option<f64>) -> Option<u32> {
    value.filter(|v| *v >= 0.0).map(|v| v.round() as u32)
}

/// Build records from a cohort table
pub fn from_dataframe(df: &DataFrame, mapping: &ColumnMapping) -> Result<Vec<ScoredRecord>> {
    let ids: Vec<String> = {
        let column = df
            .column(&mapping.id)
            .map_err(|_| EvalError::ColumnNotFound(mapping.id.clone()))?;
        let cast = column.cast(&DataType::String)?;
        let ids = cast
            .str()?
            .into_iter()
            .enumerate()
            .map(|(row, v)| v.map(str::to_string).unwrap_or_else(|| format!("row-{}", row)))
            .collect();
        ids
    };

    let subset = required(f64_column(df, &mapping.subset)?, &mapping.subset)?;
    let y = required(f64_column(df, &mapping.y)?, &mapping.y)?;
    let score = required(f64_column(df, &mapping.score)?, &mapping.score)?;
    let age = f64_column(df, &mapping.age)?;
    let sex = f64_column(df, &mapping.sex)?;
    let modality = f64_column(df, &mapping.dialysis_modality)?;
    let race = f64_column(df, &mapping.race)?;
    let ethnicity = f64_column(df, &mapping.ethnicity)?;
    let extra = mapping
        .extra
        .iter()
        .map(|name| Ok((name.clone(), f64_column(df, name)?)))
        .collect::<Result<Vec<_>>>()?;

    let mut records = Vec::with_capacity(df.height());
    for i in 0..df.height() {
        if y[i] != 0.0 && y[i] != 1.0 {
            return Err(EvalError::InvalidInput(format!(
                "column '{}' must be binary, got {} at row {}",
                mapping.y, y[i], i
            )));
        }
        let mut record = ScoredRecord::new(ids[i].clone(), subset[i] as i32, y[i] as u8, score[i])
            .with_demographics(
                age[i],
                category(sex[i]),
                category(modality[i]),
                category(race[i]),
                category(ethnicity[i]),
            );
        for (name, values) in &extra {
            if let Some(v) = values[i] {
                record.extra.insert(name.clone(), v);
            }
        }
        record.validate()?;
        records.push(record);
    }

    Ok(records)
}

/// Export records, including `p_calibrated`, as a table
pub fn to_dataframe(records: &[ScoredRecord]) -> Result<DataFrame> {
    let df = df!(
        "id" => records.iter().map(|r| r.id.clone()).collect::<Vec<String>>(),
        "subset" => records.iter().map(|r| r.subset).collect::<Vec<i32>>(),
        COL_Y => records.iter().map(|r| r.y as u32).collect::<Vec<u32>>(),
        COL_SCORE => records.iter().map(|r| r.score).collect::<Vec<f64>>(),
        COL_P_CALIBRATED => records.iter().map(|r| r.p_calibrated).collect::<Vec<Option<f64>>>(),
        COL_AGE => records.iter().map(|r| r.age).collect::<Vec<Option<f64>>>(),
        "sex" => records.iter().map(|r| r.sex).collect::<Vec<Option<u32>>>(),
        "dialysis_modality" => records.iter().map(|r| r.dialysis_modality).collect::<Vec<Option<u32>>>(),
        "race" => records.iter().map(|r| r.race).collect::<Vec<Option<u32>>>(),
        "ethnicity" => records.iter().map(|r| r.ethnicity).collect::<Vec<Option<u32>>>()
    )?;
    Ok(df)
}
