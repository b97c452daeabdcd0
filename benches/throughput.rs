use criterion::{black_box, criterion_group, criterion_main, Criterion};
use push_pipeline::{drive, Get, GroupByN, Map, SharedList, Stats, Sum, Value};

fn source(n: i64) -> impl Iterator<Item = Value> {
    (0..n).map(|i| Value::tuple([Value::from(i), Value::tuple(["b".into(), Value::from(i)])]))
}

fn benchmark_getter_split(c: &mut Criterion) {
    c.bench_function("getter_split_100k_items", |b| {
        b.iter(|| {
            let (ids, lens) = (SharedList::new(), SharedList::new());
            drive(
                source(black_box(100_000)),
                (
                    Get::new(0, ids.clone()),
                    Get::new(1, Map::new(|x| Ok(Value::from(x.components()?.len())), lens.clone())),
                ),
            )
            .expect("Drive failed");
            (ids, lens)
        });
    });
}

fn benchmark_for_loop(c: &mut Criterion) {
    c.bench_function("for_loop_100k_items", |b| {
        b.iter(|| {
            let (mut ids, mut lens) = (Vec::new(), Vec::new());
            for item in source(black_box(100_000)) {
                let parts = item.components().expect("Tuple item");
                ids.push(parts[0].clone());
                lens.push(Value::from(parts[1].components().expect("Tuple item").len()));
            }
            (ids, lens)
        });
    });
}

fn benchmark_aggregates(c: &mut Criterion) {
    c.bench_function("batched_aggregates_100k_items", |b| {
        b.iter(|| {
            drive(
                (0..black_box(100_000i64)).map(Value::from),
                (
                    Sum::new(),
                    Stats::new(),
                    GroupByN::new(64, SharedList::new()).expect("Valid size"),
                ),
            )
            .expect("Drive failed")
        });
    });
}

criterion_group!(
    benches,
    benchmark_getter_split,
    benchmark_for_loop,
    benchmark_aggregates
);
criterion_main!(benches);
