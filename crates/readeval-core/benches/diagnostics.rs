use criterion::{black_box, criterion_group, criterion_main, Criterion};

use readeval_core::batch::BatchCoordinator;
use readeval_core::markup::MarkupDecoder;
use readeval_core::model::{Category, EvaluationResult};
use readeval_core::statistics::{error_histogram, UtteranceStats};

fn bench_derivation(c: &mut Criterion) {
    let mut group = c.benchmark_group("derivation");

    let xml = include_str!("../tests/fixtures/partial_reading.xml");
    let utterance = match MarkupDecoder::new(Category::ReadSyllable).decode(xml) {
        Ok(u) => u,
        Err(e) => panic!("fixture must decode: {e}"),
    };
    let result = EvaluationResult::completed(xml.to_string(), utterance.clone());
    let characters: Vec<String> = ["我", "是", "不", "在", "我"]
        .iter()
        .map(|s| s.to_string())
        .collect();
    let coordinator = BatchCoordinator::new();

    group.bench_function("utterance_stats", |b| {
        b.iter(|| UtteranceStats::compute(black_box(&utterance)))
    });

    group.bench_function("error_histogram", |b| {
        b.iter(|| error_histogram(black_box(&utterance)))
    });

    group.bench_function("batch_map", |b| {
        b.iter(|| coordinator.map(black_box(&result), black_box(&characters)))
    });

    group.finish();
}

criterion_group!(benches, bench_derivation);
criterion_main!(benches);
