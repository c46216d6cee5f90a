//! Command-line interface
//!
//! Loads a scored cohort, runs the audit and writes the artifacts.

use clap::{Parser, Subcommand};
use colored::*;
use polars::prelude::*;
use std::path::{Path, PathBuf};
use std::time::Instant;

use crate::config::EvaluationConfig;
use crate::persistence::JsonArtifactStore;
use crate::pipeline::{AuditPipeline, AuditReport};
use crate::records::{self, ColumnMapping};
use crate::synthetic::CohortGenerator;

// ─── Styling helpers ───────────────────────────────────────────────────────────

fn dim(s: &str) -> ColoredString   { s.truecolor(100, 100, 100) }
fn accent(s: &str) -> ColoredString { s.truecolor(120, 170, 255) }
fn muted(s: &str) -> ColoredString  { s.truecolor(140, 140, 140) }
fn ok(s: &str) -> ColoredString     { s.truecolor(100, 210, 120) }

fn step_run(msg: &str) {
    print!("  {} {}... ", accent("›"), msg);
}

fn step_done(detail: &str) {
    println!("{} {}", ok("done"), dim(detail));
}

fn section(title: &str) {
    println!();
    println!("  {}", title.white().bold());
    println!("  {}", dim(&"─".repeat(56)));
}

fn indented(block: &str) {
    for line in block.lines() {
        println!("  {}", line);
    }
}

// ─── CLI definition ────────────────────────────────────────────────────────────

#[derive(Parser)]
#[command(name = "mortality-eval")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Calibration and fairness audit for mortality-risk scores")]
#[command(long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Audit a scored cohort
    Run {
        /// Cohort CSV (usrds_id, subset, y, score, demographics)
        #[arg(short, long)]
        data: PathBuf,

        /// Directory for the JSON artifacts
        #[arg(short, long)]
        output: PathBuf,

        /// Name used in artifact file names
        #[arg(short, long, default_value = "model")]
        model_name: String,

        /// JSON configuration overriding the defaults
        #[arg(short, long)]
        config: Option<PathBuf>,
    },

    /// Audit a synthetic cohort
    Demo {
        /// Directory for the JSON artifacts
        #[arg(short, long)]
        output: PathBuf,

        /// Random seed
        #[arg(long, default_value = "42")]
        seed: u64,
    },
}

// ─── Data loading ──────────────────────────────────────────────────────────────

pub fn load_data(path: &Path) -> anyhow::Result<DataFrame> {
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");

    let df = match ext {
        "csv" => CsvReadOptions::default()
            .with_infer_schema_length(Some(1000))
            .with_has_header(true)
            .try_into_reader_with_file_path(Some(path.to_path_buf()))?
            .finish()?,
        _ => anyhow::bail!("Unsupported file format: {}", ext),
    };

    Ok(df)
}

// ─── Commands ──────────────────────────────────────────────────────────────────

pub fn cmd_run(
    data_path: &Path,
    output: &Path,
    model_name: &str,
    config_path: Option<&Path>,
) -> anyhow::Result<()> {
    section("Audit");

    let config = match config_path {
        Some(path) => EvaluationConfig::from_json_file(path)?,
        None => EvaluationConfig::default(),
    };

    step_run("Loading data");
    let start = Instant::now();
    let df = load_data(data_path)?;
    let cohort = records::from_dataframe(&df, &ColumnMapping::default())?;
    step_done(&format!("{} rows in {:?}", cohort.len(), start.elapsed()));

    audit(&cohort, config, output, model_name)
}

pub fn cmd_demo(output: &Path, seed: u64) -> anyhow::Result<()> {
    section("Demo");

    step_run("Generating synthetic cohort");
    let cohort = CohortGenerator::new()
        .with_seed(seed)
        .with_sizes(600, 400)
        .with_development_rows(200)
        .with_noise(0.6)
        .generate();
    step_done(&format!("{} rows, seed {}", cohort.len(), seed));

    audit(&cohort, EvaluationConfig::default(), output, "demo")
}

fn audit(
    cohort: &[records::ScoredRecord],
    config: EvaluationConfig,
    output: &Path,
    model_name: &str,
) -> anyhow::Result<()> {
    step_run("Calibrating and stratifying");
    let report = AuditPipeline::new(config)?.run(cohort, model_name)?;
    step_done(&format!("{:.3}s", report.elapsed_secs));

    step_run(&format!("Saving → {}", output.display()));
    let store = JsonArtifactStore::new(output);
    let paths = report.persist(&store)?;

    let mut test_rows = records::to_dataframe(&report.calibration.test_rows)?;
    let csv_path = store.base_dir().join(format!("y_calibrated_{}.csv", model_name));
    let mut file = std::fs::File::create(&csv_path)?;
    CsvWriter::new(&mut file).finish(&mut test_rows)?;
    step_done(&format!("{} files", paths.len() + 1));

    print_summary(&report);
    Ok(())
}

fn print_summary(report: &AuditReport) {
    let calibration = &report.calibration;

    section("Calibration (original/calibrated)");
    println!(
        "  {:<16} {}",
        muted("Train rows"),
        calibration.train_size.to_string().white()
    );
    println!(
        "  {:<16} {}",
        muted("Test rows"),
        calibration.test_rows.len().to_string().white()
    );
    println!(
        "  {:<16} {}",
        muted("Train Brier"),
        format!(
            "{:.4} → {:.4}",
            calibration.train_brier_before, calibration.train_brier_after
        )
        .white()
        .bold()
    );
    indented(&calibration.comparison.to_string());

    section("Threshold rates (calibrated)");
    indented(&report.thresholds.to_string());

    section("Subgroup fairness (calibrated)");
    indented(&report.fairness.to_string());

    section("Risk categories (held-out, raw score)");
    indented(&report.risk.to_string());

    let diagnostics = report.all_diagnostics();
    if !diagnostics.is_empty() {
        section("Diagnostics");
        for d in diagnostics {
            println!("  {} {}", "!".yellow(), d.yellow());
        }
    }
    println!();
}
