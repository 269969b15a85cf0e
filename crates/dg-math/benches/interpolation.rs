use criterion::{criterion_group, criterion_main, Criterion};
use dg_math::{AxisLookup, NdArray};
use std::hint::black_box;

fn table(shape: &[usize]) -> NdArray<f64> {
    NdArray::from_fn(shape, |i| i.iter().enumerate().map(|(d, &k)| (d + 1) as f64 * k as f64).sum())
        .unwrap()
}

fn bench_interpolate(c: &mut Criterion) {
    let a3 = table(&[20, 20, 20]);
    let x3 = [7.3, 11.8, 2.1];
    c.bench_function("interpolate1_3d", |b| {
        b.iter(|| a3.interpolate1(black_box(&x3)).unwrap())
    });
    c.bench_function("interpolate3_3d", |b| {
        b.iter(|| a3.interpolate3(black_box(&x3)).unwrap())
    });

    let a6 = table(&[6, 6, 6, 6, 6, 6]);
    let x6 = [1.5, 2.5, 3.5, 0.5, 4.2, 2.2];
    c.bench_function("interpolate1_6d", |b| {
        b.iter(|| a6.interpolate1(black_box(&x6)).unwrap())
    });
}

fn bench_calculus(c: &mut Criterion) {
    let a = table(&[40, 40, 10]);
    c.bench_function("cdf_array_40x40x10", |b| {
        b.iter(|| black_box(&a).cdf_array::<f64>(1.0).unwrap())
    });
    c.bench_function("derivative_40x40x10", |b| {
        b.iter(|| black_box(&a).derivative::<f64>(1.0).unwrap())
    });
}

fn bench_axis(c: &mut Criterion) {
    let bp: Vec<f64> = (0..200).map(|i| (i as f64).powf(1.3)).collect();
    let axis = AxisLookup::new(bp).unwrap();
    c.bench_function("axis_get_interval", |b| {
        b.iter(|| axis.get_interval(black_box(512.25)).unwrap())
    });
}

criterion_group!(benches, bench_interpolate, bench_calculus, bench_axis);
criterion_main!(benches);
