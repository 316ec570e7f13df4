use criterion::criterion_group;
use criterion::criterion_main;
use criterion::Criterion;

use lts::compute_simulation;
use lts::random_lts;
use utilities::BinaryRelation;

pub fn criterion_benchmark_simulation(c: &mut Criterion) {
    let lts = random_lts(500, 4, 4);
    let partition = vec![(0..lts.num_of_states()).collect::<Vec<_>>()];
    let relation = BinaryRelation::new_universal(1);

    c.bench_function("compute_simulation random 500", |bencher| {
        bencher.iter(|| compute_simulation(&lts, &partition, &relation, lts.num_of_states()));
    });
}

criterion_group!(benches, criterion_benchmark_simulation);
criterion_main!(benches);
