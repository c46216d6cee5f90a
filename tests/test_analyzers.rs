//! Integration tests for the metric, threshold, fairness and risk analyzers

use mortality_eval::binning::BinEdges;
use mortality_eval::config::{FairnessConfig, RiskConfig};
use mortality_eval::fairness::{DemographicFeature, FairnessAnalyzer};
use mortality_eval::metrics::{
    accuracy, average_precision, brier_score, roc_auc, MetricEvaluator, MetricKind,
    ThresholdAnalyzer,
};
use mortality_eval::records::{ColumnSelection, ScoredRecord};
use mortality_eval::risk::RiskAnalyzer;
use mortality_eval::synthetic::CohortGenerator;
use mortality_eval::EvalError;
use ndarray::{array, Array1};

fn arrays(records: &[ScoredRecord]) -> (Array1<f64>, Array1<f64>) {
    ColumnSelection::raw().extract(records).unwrap()
}

// ============================================================================
// Metric Evaluator
// ============================================================================

#[test]
fn test_metrics_within_unit_interval() {
    for seed in 0..20 {
        let records = CohortGenerator::new().with_seed(seed).with_noise(0.8).generate();
        let (y, p) = arrays(&records);
        for metric in MetricKind::ALL {
            let value = metric.compute(&y, &p).unwrap();
            assert!((0.0..=1.0).contains(&value), "{} = {} (seed {})", metric, value, seed);
        }
    }
}

#[test]
fn test_known_metric_values() {
    let y = array![0.0, 0.0, 1.0, 1.0];
    let p = array![0.1, 0.4, 0.35, 0.8];
    assert!((roc_auc(&y, &p).unwrap() - 0.75).abs() < 1e-12);
    assert!((average_precision(&y, &p).unwrap() - 0.833_333_333_333_333_4).abs() < 1e-9);
    assert!((accuracy(&y, &p).unwrap() - 0.75).abs() < 1e-12);
    let brier = (0.01 + 0.16 + 0.4225 + 0.04) / 4.0;
    assert!((brier_score(&y, &p).unwrap() - brier).abs() < 1e-12);
}

#[test]
fn test_accuracy_rounds_half_down_to_even() {
    let y = array![0.0, 1.0];
    let p = array![0.5, 0.5];
    assert_eq!(accuracy(&y, &p).unwrap(), 0.5);
}

#[test]
fn test_evaluator_reports_configured_metrics_in_order() {
    let evaluator = MetricEvaluator::new(vec![MetricKind::Brier, MetricKind::RocAuc]);
    let y = array![0.0, 1.0, 1.0];
    let p = array![0.2, 0.7, 0.9];
    let report = evaluator.evaluate(&y, &p).unwrap();
    let kinds: Vec<MetricKind> = report.values.iter().map(|v| v.metric).collect();
    assert_eq!(kinds, vec![MetricKind::Brier, MetricKind::RocAuc]);
    assert!(report.get(MetricKind::Accuracy).is_none());
}

#[test]
fn test_evaluator_single_class_is_nan_not_error() {
    let y = array![1.0, 1.0, 1.0];
    let p = array![0.2, 0.7, 0.9];
    let report = MetricEvaluator::default().evaluate(&y, &p).unwrap();
    assert!(report.get(MetricKind::RocAuc).unwrap().is_nan());
    assert!(!report.get(MetricKind::AveragePrecision).unwrap().is_nan());
    assert_eq!(report.diagnostics.len(), 1);
}

#[test]
fn test_mismatched_lengths_are_fatal() {
    let y = array![0.0, 1.0];
    let p = array![0.2];
    let err = MetricEvaluator::default().evaluate(&y, &p).unwrap_err();
    assert!(matches!(err, EvalError::InvalidInput(_)));
}

// ============================================================================
// Threshold Confusion Analyzer
// ============================================================================

#[test]
fn test_threshold_reference_case() {
    let y = array![1.0, 1.0, 0.0, 0.0];
    let p = array![0.9, 0.4, 0.2, 0.6];
    let table = ThresholdAnalyzer::new(vec![0.5]).analyze(&y, &p).unwrap();
    let row = table.row(0.5).unwrap();
    assert_eq!((row.tp, row.fn_, row.fp, row.tn), (1, 1, 1, 1));
    assert_eq!(row.sensitivity, 0.5);
    assert_eq!(row.specificity, 0.5);
    assert_eq!(row.likelihood_ratio_pos, 1.0);
    assert_eq!(row.likelihood_ratio_neg, 1.0);
    assert_eq!((row.total_negative, row.total_positive), (2, 2));
}

#[test]
fn test_threshold_rows_follow_given_order() {
    let y = array![1.0, 0.0, 1.0, 0.0];
    let p = array![0.9, 0.3, 0.15, 0.05];
    let table = ThresholdAnalyzer::new(vec![0.5, 0.1]).analyze(&y, &p).unwrap();
    let thresholds: Vec<f64> = table.rows.iter().map(|r| r.threshold).collect();
    assert_eq!(thresholds, vec![0.5, 0.1]);
}

#[test]
fn test_perfect_specificity_leaves_positive_ratio_undefined() {
    let y = array![1.0, 1.0, 0.0, 0.0];
    let p = array![0.9, 0.4, 0.2, 0.3];
    let table = ThresholdAnalyzer::new(vec![0.5]).analyze(&y, &p).unwrap();
    let row = table.row(0.5).unwrap();
    assert_eq!(row.specificity, 1.0);
    assert!(row.likelihood_ratio_pos.is_nan());
    assert_eq!(row.likelihood_ratio_neg, 0.5);
    assert_eq!(table.diagnostics.len(), 1);
}

// ============================================================================
// Binning
// ============================================================================

#[test]
fn test_bins_are_right_closed() {
    let bins = BinEdges::new(vec![0.0, 1.0, 2.0], vec!["low", "high"]).unwrap();
    assert_eq!(bins.label_for(0.0), None);
    assert_eq!(bins.label_for(1.0), Some(&"low"));
    assert_eq!(bins.label_for(1.5), Some(&"high"));
    assert_eq!(bins.label_for(2.0), Some(&"high"));
    assert_eq!(bins.label_for(2.0001), None);
    assert_eq!(bins.label_for(f64::NAN), None);
}

// ============================================================================
// Subgroup Fairness Analyzer
// ============================================================================

#[test]
fn test_single_class_subgroup_row_is_kept() {
    let mut records = CohortGenerator::new().with_seed(9).generate();
    // race 7 only ever appears with a negative outcome
    records.push(
        ScoredRecord::new("lone-1", 9, 0, 0.2).with_demographics(Some(40.0), Some(1), Some(1), Some(7), Some(1)),
    );
    records.push(
        ScoredRecord::new("lone-2", 9, 0, 0.6).with_demographics(Some(40.0), Some(2), Some(1), Some(7), Some(1)),
    );

    let table = FairnessAnalyzer::new(FairnessConfig::default())
        .unwrap()
        .analyze(&records, &ColumnSelection::raw())
        .unwrap();
    let row = table.row(DemographicFeature::Race, 7).unwrap();
    assert_eq!(row.count, 2);
    assert!(row.auc.is_nan());
    assert_eq!((row.tn, row.fp), (1, 1));
}

#[test]
fn test_fairness_counts_partition_each_feature() {
    let records = CohortGenerator::new().with_seed(21).with_sizes(300, 200).generate();
    let table = FairnessAnalyzer::new(FairnessConfig::default())
        .unwrap()
        .analyze(&records, &ColumnSelection::raw())
        .unwrap();

    for feature in [DemographicFeature::Race, DemographicFeature::Ethnicity, DemographicFeature::Sex] {
        let total: usize = table.rows_for(feature).map(|r| r.count).sum();
        assert_eq!(total, records.len(), "{}", feature);
        for row in table.rows_for(feature) {
            assert_eq!(row.tn + row.fp + row.fn_ + row.tp, row.count);
        }
    }

    let values: Vec<u32> = table.rows_for(DemographicFeature::AgeGroup).map(|r| r.value).collect();
    let mut sorted = values.clone();
    sorted.sort_unstable();
    assert_eq!(values, sorted);
}

#[test]
fn test_auc_spread_ignores_nan_rows() {
    let records = CohortGenerator::new().with_seed(4).with_sizes(300, 200).with_noise(0.7).generate();
    let table = FairnessAnalyzer::new(FairnessConfig::default())
        .unwrap()
        .analyze(&records, &ColumnSelection::raw())
        .unwrap();
    let (lo, hi) = table.auc_spread(DemographicFeature::Sex).unwrap();
    assert!(lo <= hi);
    assert!((0.0..=1.0).contains(&lo) && (0.0..=1.0).contains(&hi));
}

// ============================================================================
// Risk Stratification Analyzer
// ============================================================================

#[test]
fn test_risk_counts_sum_to_held_out() {
    let records: Vec<ScoredRecord> = CohortGenerator::new()
        .with_seed(13)
        .with_development_rows(40)
        .with_noise(0.7)
        .generate()
        .into_iter()
        .map(|mut r| {
            // keep every score inside the bucketed range
            r.score = r.score.min(0.99);
            r
        })
        .collect();
    let held_out = records.iter().filter(|r| r.subset > 6).count();

    let table = RiskAnalyzer::new(&RiskConfig::default())
        .unwrap()
        .analyze(&records, &ColumnSelection::raw())
        .unwrap();
    assert_eq!(table.total_count(), held_out);
    assert_eq!(table.unbucketed, 0);
    for row in &table.rows {
        assert!(row.count > 0);
        assert_eq!(row.count_died + row.count_survived, row.count);
    }
}

#[test]
fn test_risk_boundary_value() {
    let records = vec![
        ScoredRecord::new("1", 9, 1, 0.09),
        ScoredRecord::new("2", 9, 0, 0.19),
        ScoredRecord::new("3", 8, 0, 0.190_000_1),
    ];
    let table = RiskAnalyzer::new(&RiskConfig::default())
        .unwrap()
        .analyze(&records, &ColumnSelection::raw())
        .unwrap();
    assert_eq!(table.row("0-0.09").unwrap().count, 1);
    assert_eq!(table.row("0.1-0.19").unwrap().count, 1);
    assert_eq!(table.row("0.2-0.29").unwrap().count, 1);
}

#[test]
fn test_risk_on_calibrated_column() {
    let records: Vec<ScoredRecord> = (0..10)
        .map(|i| {
            let mut r = ScoredRecord::new(format!("{:02}", i), 9, (i % 2) as u8, 0.5);
            r.p_calibrated = Some(i as f64 / 10.0);
            r
        })
        .collect();
    let table = RiskAnalyzer::new(&RiskConfig::default())
        .unwrap()
        .analyze(&records, &ColumnSelection::calibrated())
        .unwrap();
    assert_eq!(table.rows.len(), 10);
    assert_eq!(table.total_count(), 10);
}
