use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use mortality_eval::calibration::{Calibrator, IsotonicRegression};
use mortality_eval::config::FairnessConfig;
use mortality_eval::fairness::FairnessAnalyzer;
use mortality_eval::metrics::{average_precision, roc_auc};
use mortality_eval::pipeline::AuditPipeline;
use mortality_eval::records::{ColumnSelection, ScoredRecord};
use mortality_eval::synthetic::CohortGenerator;
use ndarray::Array1;

fn cohort(n_test: usize) -> Vec<ScoredRecord> {
    CohortGenerator::new()
        .with_seed(42)
        .with_sizes(n_test * 3 / 2, n_test)
        .with_noise(0.7)
        .generate()
}

fn bench_metrics(c: &mut Criterion) {
    let mut group = c.benchmark_group("metrics");

    for n_rows in [1000, 10000, 50000].iter() {
        let records = cohort(*n_rows);
        let (y, p) = ColumnSelection::raw().extract(&records).unwrap();

        group.bench_with_input(BenchmarkId::new("roc_auc", n_rows), &(&y, &p), |b, (y, p)| {
            b.iter(|| roc_auc(black_box(y), black_box(p)).unwrap());
        });
        group.bench_with_input(BenchmarkId::new("average_precision", n_rows), &(&y, &p), |b, (y, p)| {
            b.iter(|| average_precision(black_box(y), black_box(p)).unwrap());
        });
    }

    group.finish();
}

fn bench_isotonic(c: &mut Criterion) {
    let mut group = c.benchmark_group("isotonic");

    for n_rows in [1000, 10000, 50000].iter() {
        let records = cohort(*n_rows);
        let scores: Array1<f64> = records.iter().map(|r| r.score).collect();
        let labels: Array1<f64> = records.iter().map(|r| r.y as f64).collect();

        group.bench_with_input(BenchmarkId::new("fit", n_rows), &(&scores, &labels), |b, (x, y)| {
            b.iter(|| {
                let mut iso = IsotonicRegression::new();
                iso.fit(black_box(x), black_box(y)).unwrap();
                iso
            });
        });
    }

    group.finish();
}

fn bench_audit(c: &mut Criterion) {
    let mut group = c.benchmark_group("audit");
    group.sample_size(10);

    for n_rows in [1000, 10000].iter() {
        let records = cohort(*n_rows);

        group.bench_with_input(BenchmarkId::new("fairness", n_rows), &records, |b, records| {
            let analyzer = FairnessAnalyzer::new(FairnessConfig::default()).unwrap();
            b.iter(|| analyzer.analyze(black_box(records), &ColumnSelection::raw()).unwrap());
        });
        group.bench_with_input(BenchmarkId::new("pipeline", n_rows), &records, |b, records| {
            let pipeline = AuditPipeline::default();
            b.iter(|| pipeline.run(black_box(records), "bench").unwrap());
        });
    }

    group.finish();
}

criterion_group!(benches, bench_metrics, bench_isotonic, bench_audit);
criterion_main!(benches);
