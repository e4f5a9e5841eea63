use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use parsvm::kernel::{dot, PolynomialKernel, RBFKernel};
use parsvm::{Kernel, KernelType, Model, Parameter, Problem, SparseVector, SvmType};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

fn random_vector(rng: &mut StdRng, dim: usize, density: f64) -> SparseVector {
    let pairs = (1..=dim)
        .filter(|_| rng.gen_bool(density))
        .map(|i| (i, rng.gen_range(-1.0..1.0)))
        .collect::<Vec<_>>();
    SparseVector::from(pairs)
}

fn random_problem(n: usize, dim: usize) -> Problem {
    let mut rng = StdRng::seed_from_u64(42);
    let examples = (0..n)
        .map(|k| {
            let y = if k % 2 == 0 { 1.0 } else { -1.0 };
            let mut v = random_vector(&mut rng, dim, 0.5);
            v.values.iter_mut().for_each(|x| *x += 0.5 * y);
            (y, v)
        })
        .collect();
    Problem::from_vectors(examples)
}

fn bench_kernels(c: &mut Criterion) {
    let mut rng = StdRng::seed_from_u64(7);
    let mut group = c.benchmark_group("kernel");

    for &dim in &[16usize, 256, 4096] {
        let x = random_vector(&mut rng, dim, 0.3);
        let y = random_vector(&mut rng, dim, 0.3);
        let rbf = RBFKernel::new(1.0 / dim as f64);
        let poly = PolynomialKernel::new(3, 1.0 / dim as f64, 1.0);

        group.bench_with_input(BenchmarkId::new("dot", dim), &dim, |b, _| {
            b.iter(|| dot(black_box(x.view()), black_box(y.view())))
        });
        group.bench_with_input(BenchmarkId::new("rbf", dim), &dim, |b, _| {
            b.iter(|| rbf.compute(black_box(x.view()), black_box(y.view())))
        });
        group.bench_with_input(BenchmarkId::new("polynomial", dim), &dim, |b, _| {
            b.iter(|| poly.compute(black_box(x.view()), black_box(y.view())))
        });
    }

    group.finish();
}

fn bench_training(c: &mut Criterion) {
    let problem = random_problem(400, 32);
    let mut group = c.benchmark_group("train_c_svc");
    group.sample_size(10);

    for &workers in &[1usize, 4] {
        let param = Parameter::new(SvmType::CSvc, KernelType::Rbf)
            .with_gamma(1.0 / 32.0)
            .with_workers(workers);
        group.bench_with_input(BenchmarkId::new("workers", workers), &workers, |b, _| {
            b.iter(|| Model::train(black_box(&problem), &param))
        });
    }

    group.finish();
}

criterion_group!(benches, bench_kernels, bench_training);
criterion_main!(benches);
