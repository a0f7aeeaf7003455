// Copyright (c) 2026, Chad Hogan
// All rights reserved.
//
// This source code is licensed under the BSD-3-Clause license found in the
// LICENSE file in the root directory of this source tree.

use std::hint::black_box;

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};

use fast_marching::{FastMarchingSolver, Grid, Node, TargetReachedMode, UpwindGradientSolver};

fn point_source_2d(n: usize) -> FastMarchingSolver<2> {
    let c = (n / 2) as i64;
    FastMarchingSolver::new()
        .with_output_size([n, n])
        .unwrap()
        .with_alive_points(&[Node::new([c, c], 0.0)])
}

fn point_source_3d(n: usize) -> FastMarchingSolver<3> {
    let c = (n / 2) as i64;
    FastMarchingSolver::new()
        .with_output_size([n, n, n])
        .unwrap()
        .with_alive_points(&[Node::new([c, c, c], 0.0)])
}

/// Homogeneous 2D grids of increasing size.
fn bench_marching_2d(c: &mut Criterion) {
    let mut group = c.benchmark_group("marching_2d");
    for &n in &[128usize, 256, 512] {
        let solver = point_source_2d(n);
        group.bench_with_input(BenchmarkId::from_parameter(n), &solver, |b, solver| {
            b.iter(|| black_box(solver.solve().unwrap()));
        });
    }
    group.finish();
}

/// Homogeneous 64^3 grid.
fn bench_marching_3d(c: &mut Criterion) {
    let solver = point_source_3d(64);
    c.bench_function("marching_3d_64", |b| {
        b.iter(|| black_box(solver.solve().unwrap()));
    });
}

/// Layered speed field, so the slowness precompute reads a real grid.
fn bench_speed_grid_2d(c: &mut Criterion) {
    let n = 256;
    let speed: Vec<f64> = (0..n * n)
        .map(|flat| 1.0 + 0.01 * (flat % n) as f64)
        .collect();
    let c0 = (n / 2) as i64;
    let solver = FastMarchingSolver::new()
        .with_speed(Grid::new([n, n], speed).unwrap())
        .with_alive_points(&[Node::new([c0, c0], 0.0)]);
    c.bench_function("speed_grid_256", |b| {
        b.iter(|| black_box(solver.solve().unwrap()));
    });
}

/// Gradient generation and a target that stops the front halfway.
fn bench_upwind_2d(c: &mut Criterion) {
    let n = 256;
    let with_gradient =
        UpwindGradientSolver::new(point_source_2d(n)).with_generate_gradient(true);
    c.bench_function("upwind_gradient_256", |b| {
        b.iter(|| black_box(with_gradient.solve().unwrap()));
    });

    let targeted = UpwindGradientSolver::new(point_source_2d(n))
        .with_target_points(&[Node::new([(n / 2) as i64, (3 * n / 4) as i64], 0.0)])
        .with_target_reached_mode(TargetReachedMode::OneTarget);
    c.bench_function("one_target_256", |b| {
        b.iter(|| black_box(targeted.solve().unwrap()));
    });
}

criterion_group!(
    benches,
    bench_marching_2d,
    bench_marching_3d,
    bench_speed_grid_2d,
    bench_upwind_2d
);
criterion_main!(benches);
