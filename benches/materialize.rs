use criterion::{black_box, criterion_group, criterion_main, Criterion};
use emulator_client::protocol::{HistoricalRun, RunType, VariableBinding};
use emulator_client::runtime::variables::input_name;
use emulator_client::runtime::{RunConfiguration, VariableSet};

fn bench_materialize_sparse(c: &mut Criterion) {
    let mut set = VariableSet::new();
    for i in (1..=2000).step_by(7) {
        let name = set.add(Some(&input_name(i))).unwrap();
        set.set_value(&name, i as i64).unwrap();
    }

    c.bench_function("materialize_sparse_2000", |b| {
        b.iter(|| black_box(set.materialize()))
    });
}

fn bench_materialize_dense(c: &mut Criterion) {
    let set = VariableSet::with_required((1..=1000).map(input_name));

    c.bench_function("materialize_dense_1000", |b| {
        b.iter(|| black_box(set.materialize()))
    });
}

fn bench_config_from_history(c: &mut Criterion) {
    let run = HistoricalRun {
        index: 1,
        program_name: "bench".into(),
        run_type: RunType::Program,
        expansion_level: 2,
        architecture: "III".into(),
        input: vec![],
        result: 0,
        cycles_count: 0,
        recorded_input: (1..=500)
            .map(|i| VariableBinding::new(input_name(i), i as i64))
            .chain(std::iter::once(VariableBinding::new("y", 0)))
            .collect(),
    };

    c.bench_function("config_from_history_500", |b| {
        b.iter(|| {
            let config = RunConfiguration::from_historical_run(black_box(&run)).unwrap();
            black_box(config.input());
        })
    });
}

criterion_group!(
    benches,
    bench_materialize_sparse,
    bench_materialize_dense,
    bench_config_from_history
);
criterion_main!(benches);
