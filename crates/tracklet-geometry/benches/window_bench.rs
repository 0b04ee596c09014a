//! Benchmarks for sector window admission.
//!
//! Measures performance of:
//! - Window construction for a full partition
//! - Admission of a hit stream against every sector
//! - Local angle computation

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use std::f64::consts::PI;
use tracklet_geometry::{SectorWindow, DEFAULT_SECTOR_COUNT, TWO_PI};

const OVERLAP: f64 = 0.05;

fn half_window(count: u32) -> f64 {
    PI / count as f64 + OVERLAP
}

/// Evenly spread azimuths covering several turns, so every branch is exercised.
fn hit_angles(n: usize) -> Vec<f64> {
    (0..n)
        .map(|i| -2.0 * TWO_PI + 4.0 * TWO_PI * i as f64 / n as f64)
        .collect()
}

fn bench_partition(c: &mut Criterion) {
    let mut group = c.benchmark_group("partition");

    for &count in &[9u32, 24, 72] {
        group.throughput(Throughput::Elements(count as u64));
        group.bench_with_input(BenchmarkId::from_parameter(count), &count, |b, &n| {
            b.iter(|| SectorWindow::partition(black_box(n), half_window(n)))
        });
    }
    group.finish();
}

fn bench_admission(c: &mut Criterion) {
    let mut group = c.benchmark_group("admission");
    let windows = SectorWindow::partition(DEFAULT_SECTOR_COUNT, half_window(DEFAULT_SECTOR_COUNT))
        .expect("default partition is valid");

    for &n in &[1_000usize, 10_000, 100_000] {
        let angles = hit_angles(n);
        group.throughput(Throughput::Elements((n * windows.len()) as u64));
        group.bench_with_input(BenchmarkId::from_parameter(n), &angles, |b, angles| {
            b.iter(|| {
                let mut admitted = 0usize;
                for &phi in angles {
                    for w in &windows {
                        if w.admits(black_box(phi)) {
                            admitted += 1;
                        }
                    }
                }
                admitted
            })
        });
    }
    group.finish();
}

fn bench_localize(c: &mut Criterion) {
    let window = SectorWindow::new(4, DEFAULT_SECTOR_COUNT, half_window(DEFAULT_SECTOR_COUNT))
        .expect("sector 4 is valid");
    let angles = hit_angles(10_000);

    c.bench_function("localize_10k", |b| {
        b.iter(|| angles.iter().map(|&phi| window.localize(black_box(phi))).sum::<f64>())
    });
}

criterion_group!(benches, bench_partition, bench_admission, bench_localize);
criterion_main!(benches);
