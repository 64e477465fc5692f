use criterion::{black_box, criterion_group, criterion_main, Criterion};

use mockprep_core::model::ScoreSet;
use mockprep_core::scoring::{averages, ScoreWeights};

fn make_scores(n: usize) -> Vec<ScoreSet> {
    (0..n)
        .map(|i| {
            let base = (i % 100) as f64;
            ScoreSet::new(base, 100.0 - base, 50.0, (base * 1.7) % 100.0, 33.3)
        })
        .collect()
}

fn bench_averages(c: &mut Criterion) {
    let mut group = c.benchmark_group("averages");
    let weights = ScoreWeights::DEFAULT;

    for n in [1usize, 10, 100, 1000] {
        let scores = make_scores(n);
        group.bench_function(format!("n={n}"), |b| {
            b.iter(|| averages(black_box(&scores), black_box(&weights)))
        });
    }

    group.finish();
}

fn bench_weights(c: &mut Criterion) {
    let mut group = c.benchmark_group("weights");
    let set = ScoreSet::new(90.0, 80.0, 70.0, 60.0, 50.0);

    group.bench_function("apply", |b| {
        b.iter(|| ScoreWeights::DEFAULT.apply(black_box(&set)))
    });

    group.bench_function("validate", |b| {
        b.iter(|| black_box(ScoreWeights::DEFAULT).validate())
    });

    group.finish();
}

criterion_group!(benches, bench_averages, bench_weights);
criterion_main!(benches);
