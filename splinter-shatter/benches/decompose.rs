#[macro_use]
extern crate criterion;

use criterion::{black_box, Criterion};

extern crate splinter_model as model;
extern crate splinter_shatter as shatter;

use shatter::{decompose::wedge, FractureSpec};

fn criterion_benchmark(c: &mut Criterion) {
    let cube = model::unit_cube();
    let five_by_one = FractureSpec::new(5, 1);
    let two_by_three = FractureSpec::new(2, 3);
    c.bench_function("Wedge 5x1", |b| b.iter(|| wedge::decompose(black_box(&five_by_one), &cube, None)));
    c.bench_function("Wedge 2x3", |b| b.iter(|| wedge::decompose(black_box(&two_by_three), &cube, None)));
}

criterion_group!(benches, criterion_benchmark);
criterion_main!(benches);
